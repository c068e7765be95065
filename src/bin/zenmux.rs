//! WebP container inspection and editing from the command line.
//!
//! A thin shell over the library: every subcommand loads, mutates, and
//! reassembles, with errors reported rather than propagated as panics.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use zenmux::{AnimOptions, BlendMethod, DisposeMethod, FramePlacement, LoopCount, WebPImage};

#[derive(Parser)]
#[command(name = "zenmux", version, about = "WebP container mux/demux tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract metadata or a single frame to a file.
    Get {
        #[command(subcommand)]
        target: GetTarget,
    },
    /// Set the loop count or a metadata blob.
    Set {
        #[command(subcommand)]
        target: SetTarget,
    },
    /// Remove a metadata blob.
    Strip {
        /// What to remove.
        #[arg(value_enum)]
        kind: MetaKind,
        /// Input WebP file.
        input: PathBuf,
        /// Output WebP file.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Set the duration of selected frames.
    Duration {
        /// `duration[,start[,end]]` in milliseconds; an `end` of 0 means
        /// "last frame". May be repeated.
        #[arg(short = 'd', long = "duration", required = true)]
        specs: Vec<DurationSpec>,
        /// Input WebP file.
        input: PathBuf,
        /// Output WebP file.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Build a new animation from standalone frames.
    Frame {
        /// Frame setting `file[+duration[+x+y[+m[+b]]]]` where `m` is the
        /// dispose method (0: none, 1: background), `-b` disables and a
        /// trailing `+b` enables blending. May be repeated.
        #[arg(short = 'f', long = "frame", required = true)]
        frames: Vec<FrameSpec>,
        /// Number of times to repeat the animation (0 = infinite).
        #[arg(long = "loop", default_value_t = 0)]
        loop_count: u32,
        /// Background color of the animation canvas as `R,G,B,A`.
        #[arg(long, default_value = "255,255,255,255")]
        bg: BgColor,
        /// Output WebP file.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print a human-readable summary of a WebP file.
    Info {
        /// Input WebP file.
        input: PathBuf,
    },
}

#[derive(Subcommand)]
enum GetTarget {
    /// Extract the ICC profile.
    Iccp {
        /// Input WebP file.
        input: PathBuf,
        /// Output file for the raw profile bytes.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Extract the EXIF metadata.
    Exif {
        /// Input WebP file.
        input: PathBuf,
        /// Output file for the raw metadata bytes.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Extract the XMP metadata.
    Xmp {
        /// Input WebP file.
        input: PathBuf,
        /// Output file for the raw metadata bytes.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Extract frame INDEX (0-based) as a standalone WebP.
    Frame {
        /// Frame index.
        index: usize,
        /// Input WebP file.
        input: PathBuf,
        /// Output WebP file.
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum SetTarget {
    /// Set the animation loop count (0 = infinite, max 65535).
    Loop {
        /// The loop count.
        count: u32,
        /// Input WebP file.
        input: PathBuf,
        /// Output WebP file.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Set the ICC profile from a file.
    Iccp {
        /// File containing the raw profile bytes.
        file: PathBuf,
        /// Input WebP file.
        input: PathBuf,
        /// Output WebP file.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Set the EXIF metadata from a file.
    Exif {
        /// File containing the raw metadata bytes.
        file: PathBuf,
        /// Input WebP file.
        input: PathBuf,
        /// Output WebP file.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Set the XMP metadata from a file.
    Xmp {
        /// File containing the raw metadata bytes.
        file: PathBuf,
        /// Input WebP file.
        input: PathBuf,
        /// Output WebP file.
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MetaKind {
    /// ICC profile (`icc` is accepted for backwards support).
    #[value(alias = "icc")]
    Iccp,
    /// EXIF metadata.
    Exif,
    /// XMP metadata.
    Xmp,
}

/// Parsed `duration[,start[,end]]` option.
#[derive(Clone, Debug)]
struct DurationSpec {
    duration_ms: u32,
    start: usize,
    end: usize,
}

impl FromStr for DurationSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        fn field(v: &str, what: &str) -> Result<i64> {
            v.trim()
                .parse::<i64>()
                .with_context(|| format!("{what} must be a number, got {v:?}"))
        }
        let parts: Vec<&str> = s.split(',').collect();
        let (duration, start, end) = match *parts.as_slice() {
            [d] => (field(d, "duration")?, 0, 0),
            [d, frame] => {
                let frame = field(frame, "frame index")?;
                (field(d, "duration")?, frame, frame)
            }
            [d, start, end] => (
                field(d, "duration")?,
                field(start, "start frame")?,
                field(end, "end frame")?,
            ),
            _ => bail!("expected duration[,start[,end]], got {s:?}"),
        };
        if start < 0 || end < 0 {
            bail!("frame index cannot be negative");
        }
        Ok(Self {
            duration_ms: u32::try_from(duration).context("duration out of range")?,
            start: start as usize,
            end: end as usize,
        })
    }
}

/// Parsed `file[+duration[+x+y[+m[+b]]]]` frame option, in the upstream
/// webpmux shorthand.
#[derive(Clone, Debug)]
struct FrameSpec {
    path: PathBuf,
    placement: FramePlacement,
}

impl FromStr for FrameSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        fn field(v: &str, what: &str) -> Result<u32> {
            v.parse::<u32>()
                .with_context(|| format!("{what} must be a non-negative number, got {v:?}"))
        }
        let mut parts = s.split('+');
        let path = match parts.next() {
            Some(p) if !p.is_empty() => PathBuf::from(p),
            _ => bail!("frame setting is missing the file path"),
        };
        let mut placement = FramePlacement::default();
        if let Some(d) = parts.next() {
            placement.duration_ms = field(d, "duration")?;
        }
        if let Some(x) = parts.next() {
            placement.x = field(x, "x offset")?;
        }
        if let Some(y) = parts.next() {
            placement.y = field(y, "y offset")?;
        }
        if let Some(m) = parts.next() {
            let (dispose, rest) = match m.split_once('-') {
                Some((d, rest)) => (d, Some(rest)),
                None => (m, None),
            };
            placement.dispose = match dispose {
                "1" => DisposeMethod::Background,
                "0" => DisposeMethod::None,
                _ => bail!("dispose method must be 0 or 1, got {m:?}"),
            };
            if let Some(rest) = rest {
                if rest != "b" {
                    bail!("unrecognized frame flag {rest:?}");
                }
                placement.blend = BlendMethod::Overwrite;
            }
        }
        if let Some(b) = parts.next() {
            if b != "b" {
                bail!("unrecognized frame flag {b:?}");
            }
            placement.blend = BlendMethod::AlphaBlend;
        }
        if parts.next().is_some() {
            bail!("too many fields in frame setting {s:?}");
        }
        Ok(Self { path, placement })
    }
}

/// Background color in `R,G,B,A` order.
#[derive(Clone, Copy, Debug)]
struct BgColor([u8; 4]);

impl FromStr for BgColor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let channels: Vec<&str> = s.split(',').collect();
        let &[r, g, b, a] = channels.as_slice() else {
            bail!("expected R,G,B,A, got {s:?}");
        };
        let chan = |v: &str, what: &str| -> Result<u8> {
            v.trim()
                .parse::<u8>()
                .with_context(|| format!("{what} must be in 0..=255, got {v:?}"))
        };
        Ok(Self([
            chan(r, "red")?,
            chan(g, "green")?,
            chan(b, "blue")?,
            chan(a, "alpha")?,
        ]))
    }
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive("info".parse().expect("invalid filter"))
                .from_env_lossy(),
        )
        .try_init();

    match Cli::parse().command {
        Command::Get { target } => get(target),
        Command::Set { target } => set(target),
        Command::Strip {
            kind,
            input,
            output,
        } => strip(kind, &input, &output),
        Command::Duration {
            specs,
            input,
            output,
        } => duration(&specs, &input, &output),
        Command::Frame {
            frames,
            loop_count,
            bg,
            output,
        } => frame(&frames, loop_count, bg, &output),
        Command::Info { input } => info(&input),
    }
}

fn load(path: &Path) -> Result<WebPImage> {
    WebPImage::load(path).with_context(|| format!("error opening {}", path.display()))
}

/// Write a possibly-animated image, routing animations through the mux path.
fn write_image(image: &WebPImage, path: &Path) -> Result<()> {
    let bytes = if image.is_animated() {
        image.mux_anim(&AnimOptions::default())?
    } else {
        image.serialize()?
    };
    fs::write(path, bytes).with_context(|| format!("error writing {}", path.display()))
}

fn write_blob(blob: Option<&[u8]>, what: &str, path: &Path) -> Result<()> {
    let Some(blob) = blob else {
        bail!("no {what} present");
    };
    fs::write(path, blob).with_context(|| format!("error writing {}", path.display()))
}

fn get(target: GetTarget) -> Result<()> {
    match target {
        GetTarget::Iccp { input, output } => {
            write_blob(load(&input)?.iccp(), "ICC profile", &output)
        }
        GetTarget::Exif { input, output } => {
            write_blob(load(&input)?.exif(), "EXIF metadata", &output)
        }
        GetTarget::Xmp { input, output } => write_blob(load(&input)?.xmp(), "XMP metadata", &output),
        GetTarget::Frame {
            index,
            input,
            output,
        } => {
            let bytes = load(&input)?.demux_frame(index)?;
            fs::write(&output, bytes).with_context(|| format!("error writing {}", output.display()))
        }
    }
}

fn set(target: SetTarget) -> Result<()> {
    match target {
        SetTarget::Loop {
            count,
            input,
            output,
        } => {
            let mut image = load(&input)?;
            image.set_loop_count(count)?;
            write_image(&image, &output)
        }
        SetTarget::Iccp {
            file,
            input,
            output,
        } => {
            let blob = fs::read(&file)
                .with_context(|| format!("could not open/read {}", file.display()))?;
            let mut image = load(&input)?;
            image.set_iccp(Some(blob));
            write_image(&image, &output)
        }
        SetTarget::Exif {
            file,
            input,
            output,
        } => {
            let blob = fs::read(&file)
                .with_context(|| format!("could not open/read {}", file.display()))?;
            let mut image = load(&input)?;
            image.set_exif(Some(blob));
            write_image(&image, &output)
        }
        SetTarget::Xmp {
            file,
            input,
            output,
        } => {
            let blob = fs::read(&file)
                .with_context(|| format!("could not open/read {}", file.display()))?;
            let mut image = load(&input)?;
            image.set_xmp(Some(blob));
            write_image(&image, &output)
        }
    }
}

fn strip(kind: MetaKind, input: &Path, output: &Path) -> Result<()> {
    let mut image = load(input)?;
    match kind {
        MetaKind::Iccp => image.set_iccp(None),
        MetaKind::Exif => image.set_exif(None),
        MetaKind::Xmp => image.set_xmp(None),
    }
    write_image(&image, output)
}

fn duration(specs: &[DurationSpec], input: &Path, output: &Path) -> Result<()> {
    let mut image = load(input)?;
    for spec in specs {
        image.set_frame_durations(spec.duration_ms, spec.start, spec.end)?;
    }
    write_image(&image, output)
}

fn frame(specs: &[FrameSpec], loop_count: u32, bg: BgColor, output: &Path) -> Result<()> {
    let mut image = WebPImage::new_animation(bg.0, LoopCount::Forever);
    image.set_loop_count(loop_count)?;
    let Some(animation) = image.animation_mut() else {
        bail!("internal: new animation is not animated");
    };
    for spec in specs {
        let source = load(&spec.path)?;
        animation.push_image(&source, spec.placement)?;
    }
    let bytes = image.mux_anim(&AnimOptions::default())?;
    fs::write(output, bytes).with_context(|| format!("error writing {}", output.display()))
}

fn info(input: &Path) -> Result<()> {
    let image = load(input)?;
    println!("Canvas size: {} x {}", image.width(), image.height());

    let mut features = Vec::new();
    if image.is_animated() {
        features.push("animation");
    }
    if image.has_alpha() {
        features.push(if image.is_animated() {
            "alpha"
        } else {
            "transparency"
        });
    }
    if features.is_empty() {
        println!("No features present.");
    } else {
        println!("Features present: {}", features.join(" "));
    }

    if let Some(anim) = image.animation() {
        let [r, g, b, a] = anim.background_color;
        println!(
            "Background color : 0x{a:02X}{r:02X}{g:02X}{b:02X}  Loop Count : {}",
            anim.loop_count.as_wire()
        );
        println!("Number of frames: {}", anim.frames.len());
        println!(
            "No.: width height alpha x_offset y_offset duration   dispose blend image_size  compression"
        );
        for (i, f) in anim.frames.iter().enumerate() {
            println!(
                "{:3}: {:5} {:5}   {:>3} {:8} {:8} {:8} {:>10} {:>5} {:10} {:>11}",
                i + 1,
                f.width,
                f.height,
                if f.payload.has_alpha() { "yes" } else { "no" },
                f.x,
                f.y,
                f.duration_ms,
                match f.dispose {
                    DisposeMethod::Background => "background",
                    DisposeMethod::None => "none",
                },
                match f.blend {
                    BlendMethod::AlphaBlend => "yes",
                    BlendMethod::Overwrite => "no",
                },
                f.payload.bitstream().data().len(),
                if f.payload.is_lossless() {
                    "lossless"
                } else {
                    "lossy"
                },
            );
        }
    }
    Ok(())
}
