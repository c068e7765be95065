//! Container assembly: the single-image writer and the animation muxer.
//!
//! Both paths recompute every derived field from the live model (VP8X flag
//! bits from field presence, sizes from the chunks actually emitted) rather
//! than trusting anything remembered from parse time.

use alloc::vec::Vec;

use crate::error::MuxError;
use crate::model::{
    Animation, BlendMethod, Bitstream, DisposeMethod, ExtendedContent, ExtendedImage, Frame,
    LoopCount, Payload, WebPImage,
};
use crate::riff::{
    ANIM_PAYLOAD_LEN, ANMF_HEADER_LEN, FLAG_ALPHA, FLAG_ANIM, FLAG_EXIF, FLAG_ICCP, FLAG_XMP,
    TAG_ALPH, TAG_ANIM, TAG_ANMF, TAG_EXIF, TAG_ICCP, TAG_VP8, TAG_VP8L, TAG_VP8X, TAG_XMP,
    VP8X_PAYLOAD_LEN, VecWriter, chunk_size, write_chunk,
};

/// Inclusive upper bound for canvas dimensions (the VP8X field stores
/// width−1 in 24 bits).
const MAX_DIMENSION: u32 = 1 << 24;
/// Exclusive upper bound for raw 24-bit frame fields.
const MAX_U24: u32 = 1 << 24;

/// Overrides for the animation mux path.
///
/// Every `None` falls back to the model: the stored canvas (or, when the
/// canvas is undetermined, the maximum frame extent), background color, and
/// loop count.
#[derive(Debug, Clone, Default)]
pub struct AnimOptions {
    /// Canvas width override.
    pub width: Option<u32>,
    /// Canvas height override.
    pub height: Option<u32>,
    /// Background color override, in R,G,B,A order.
    pub background_color: Option<[u8; 4]>,
    /// Loop count override (0 = infinite, max 65535).
    pub loop_count: Option<u32>,
}

impl WebPImage {
    /// Serialize through the single-image path.
    ///
    /// Animated images are rejected with [`MuxError::Unsupported`]; they go
    /// through [`mux_anim`](Self::mux_anim) instead.
    pub fn serialize(&self) -> Result<Vec<u8>, MuxError> {
        match self {
            WebPImage::Lossy(vp8) => simple_container(&TAG_VP8, vp8),
            WebPImage::Lossless(vp8l) => simple_container(&TAG_VP8L, vp8l),
            WebPImage::Extended(ext) => match &ext.content {
                ExtendedContent::Animation(_) => Err(MuxError::Unsupported(
                    "saving an animation through the single-image writer is not supported; \
                     use mux_anim",
                )),
                ExtendedContent::Still(payload) => extended_still(ext, payload.as_ref()),
            },
        }
    }

    /// Assemble the animation into a complete container.
    ///
    /// Non-animated images are rejected with [`MuxError::Unsupported`].
    pub fn mux_anim(&self, options: &AnimOptions) -> Result<Vec<u8>, MuxError> {
        if let WebPImage::Extended(ext) = self
            && let ExtendedContent::Animation(anim) = &ext.content
        {
            return assemble_animation(ext, anim, options);
        }
        Err(MuxError::Unsupported("image is not an animation"))
    }

    /// Serialize and write to a file through the single-image path.
    ///
    /// The file handle is scoped to the write and released on every path.
    #[cfg(feature = "std")]
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), MuxError> {
        let bytes = self.serialize()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

/// Canvas dimension contract: both sides in `1..=2^24`, product within
/// 32 bits.
pub(crate) fn validate_canvas(width: u32, height: u32) -> Result<(), MuxError> {
    if width == 0
        || height == 0
        || width > MAX_DIMENSION
        || height > MAX_DIMENSION
        || u64::from(width) * u64::from(height) > u64::from(u32::MAX)
    {
        return Err(MuxError::InvalidDimensions { width, height });
    }
    Ok(())
}

/// VP8X flag bits, always derived from live model state.
#[derive(Clone, Copy)]
pub(crate) struct Vp8xFlags {
    pub(crate) iccp: bool,
    pub(crate) alpha: bool,
    pub(crate) exif: bool,
    pub(crate) xmp: bool,
    pub(crate) anim: bool,
}

impl Vp8xFlags {
    fn byte(self) -> u8 {
        let mut b = 0u8;
        if self.iccp {
            b |= FLAG_ICCP;
        }
        if self.alpha {
            b |= FLAG_ALPHA;
        }
        if self.exif {
            b |= FLAG_EXIF;
        }
        if self.xmp {
            b |= FLAG_XMP;
        }
        if self.anim {
            b |= FLAG_ANIM;
        }
        b
    }
}

/// Append a VP8X chunk for the given flags and canvas.
pub(crate) fn write_vp8x(out: &mut Vec<u8>, flags: Vp8xFlags, width: u32, height: u32) {
    let mut payload = Vec::with_capacity(VP8X_PAYLOAD_LEN);
    payload.push(flags.byte());
    payload.write_all(&[0; 3]); // reserved
    payload.write_u24_le(width - 1);
    payload.write_u24_le(height - 1);
    write_chunk(out, &TAG_VP8X, &payload);
}

/// On-disk footprint of a payload's chunks (ALPH + VP8, or VP8L).
pub(crate) fn payload_chunks_len(payload: &Payload) -> u32 {
    let mut n = 0u32;
    if let Payload::Lossy {
        alpha: Some(alpha), ..
    } = payload
    {
        n += chunk_size(alpha.len());
    }
    n + chunk_size(payload.bitstream().data().len())
}

/// Append a payload's chunks (ALPH + VP8, or VP8L).
pub(crate) fn write_payload_chunks(out: &mut Vec<u8>, payload: &Payload) {
    match payload {
        Payload::Lossy { vp8, alpha } => {
            if let Some(alpha) = alpha {
                write_chunk(out, &TAG_ALPH, alpha);
            }
            write_chunk(out, &TAG_VP8, vp8.data());
        }
        Payload::Lossless(vp8l) => write_chunk(out, &TAG_VP8L, vp8l.data()),
    }
}

/// Append the optional metadata chunks in their canonical order.
pub(crate) fn write_metadata_chunks(
    out: &mut Vec<u8>,
    iccp: Option<&[u8]>,
    exif: Option<&[u8]>,
    xmp: Option<&[u8]>,
) {
    if let Some(iccp) = iccp {
        write_chunk(out, &TAG_ICCP, iccp);
    }
    if let Some(exif) = exif {
        write_chunk(out, &TAG_EXIF, exif);
    }
    if let Some(xmp) = xmp {
        write_chunk(out, &TAG_XMP, xmp);
    }
}

fn metadata_chunks_len(iccp: Option<&[u8]>, exif: Option<&[u8]>, xmp: Option<&[u8]>) -> u32 {
    [iccp, exif, xmp]
        .into_iter()
        .flatten()
        .map(|blob| chunk_size(blob.len()))
        .sum()
}

/// A bare VP8 / VP8L chunk in a 12-byte RIFF shell.
fn simple_container(tag: &[u8; 4], bitstream: &Bitstream) -> Result<Vec<u8>, MuxError> {
    validate_canvas(bitstream.width(), bitstream.height())?;
    let total = 4 + chunk_size(bitstream.data().len());
    let mut out = Vec::with_capacity(total as usize + 8);
    out.write_all(b"RIFF");
    out.write_u32_le(total);
    out.write_all(b"WEBP");
    write_chunk(&mut out, tag, bitstream.data());
    Ok(out)
}

/// Extended still image: recomputed VP8X, payload chunks, then metadata.
fn extended_still(ext: &ExtendedImage, payload: Option<&Payload>) -> Result<Vec<u8>, MuxError> {
    validate_canvas(ext.canvas_width, ext.canvas_height)?;

    let iccp = ext.iccp.as_deref();
    let exif = ext.exif.as_deref();
    let xmp = ext.xmp.as_deref();

    let mut total = 4 + chunk_size(VP8X_PAYLOAD_LEN);
    if let Some(payload) = payload {
        total += payload_chunks_len(payload);
    }
    total += metadata_chunks_len(iccp, exif, xmp);

    let mut out = Vec::with_capacity(total as usize + 8);
    out.write_all(b"RIFF");
    out.write_u32_le(total);
    out.write_all(b"WEBP");

    let flags = Vp8xFlags {
        iccp: iccp.is_some(),
        alpha: payload.is_some_and(|p| p.has_alpha()),
        exif: exif.is_some(),
        xmp: xmp.is_some(),
        anim: false,
    };
    write_vp8x(&mut out, flags, ext.canvas_width, ext.canvas_height);
    if let Some(payload) = payload {
        write_payload_chunks(&mut out, payload);
    }
    write_metadata_chunks(&mut out, iccp, exif, xmp);
    Ok(out)
}

fn validate_frame_field(index: usize, field: &'static str, value: u32) -> Result<(), MuxError> {
    if value >= MAX_U24 {
        return Err(MuxError::FrameFieldOutOfRange {
            index,
            field,
            value,
        });
    }
    Ok(())
}

fn anmf_payload_len(frame: &Frame) -> u32 {
    ANMF_HEADER_LEN as u32 + payload_chunks_len(&frame.payload)
}

fn write_anmf(out: &mut Vec<u8>, frame: &Frame) {
    out.write_all(&TAG_ANMF);
    out.write_u32_le(anmf_payload_len(frame));
    out.write_u24_le(frame.x);
    out.write_u24_le(frame.y);
    out.write_u24_le(frame.width - 1);
    out.write_u24_le(frame.height - 1);
    out.write_u24_le(frame.duration_ms);
    let mut flags = 0u8;
    if frame.dispose == DisposeMethod::Background {
        flags |= 0b01;
    }
    // Bit 1 set means "do not blend".
    if frame.blend == BlendMethod::Overwrite {
        flags |= 0b10;
    }
    out.push(flags);
    write_payload_chunks(out, &frame.payload);
}

fn assemble_animation(
    ext: &ExtendedImage,
    anim: &Animation,
    options: &AnimOptions,
) -> Result<Vec<u8>, MuxError> {
    if anim.frames.is_empty() {
        return Err(MuxError::NoFrames);
    }

    let loop_count = match options.loop_count {
        Some(n) if n > u32::from(u16::MAX) => {
            return Err(MuxError::LoopCountOutOfRange { value: n });
        }
        Some(n) => LoopCount::from_wire(n as u16),
        None => anim.loop_count,
    };
    let background = options.background_color.unwrap_or(anim.background_color);

    for (index, frame) in anim.frames.iter().enumerate() {
        validate_frame_field(index, "x offset", frame.x)?;
        validate_frame_field(index, "y offset", frame.y)?;
        validate_frame_field(index, "duration", frame.duration_ms)?;
        if frame.width == 0 || frame.width > MAX_DIMENSION {
            return Err(MuxError::FrameFieldOutOfRange {
                index,
                field: "width",
                value: frame.width,
            });
        }
        if frame.height == 0 || frame.height > MAX_DIMENSION {
            return Err(MuxError::FrameFieldOutOfRange {
                index,
                field: "height",
                value: frame.height,
            });
        }
    }

    // Canvas: explicit option, else the model's, else the frames' extent.
    let model_width = (ext.canvas_width != 0).then_some(ext.canvas_width);
    let model_height = (ext.canvas_height != 0).then_some(ext.canvas_height);
    let max_extent = |f: fn(&Frame) -> u32| anim.frames.iter().map(f).max().unwrap_or(0);
    let width = options
        .width
        .or(model_width)
        .unwrap_or_else(|| max_extent(|f| f.x + f.width));
    let height = options
        .height
        .or(model_height)
        .unwrap_or_else(|| max_extent(|f| f.y + f.height));
    validate_canvas(width, height)?;

    let iccp = ext.iccp.as_deref();
    let exif = ext.exif.as_deref();
    let xmp = ext.xmp.as_deref();

    let mut total = 4 + chunk_size(VP8X_PAYLOAD_LEN) + chunk_size(ANIM_PAYLOAD_LEN);
    for frame in &anim.frames {
        total += chunk_size(anmf_payload_len(frame) as usize);
    }
    total += metadata_chunks_len(iccp, exif, xmp);

    let mut out = Vec::with_capacity(total as usize + 8);
    out.write_all(b"RIFF");
    out.write_u32_le(total);
    out.write_all(b"WEBP");

    let flags = Vp8xFlags {
        iccp: iccp.is_some(),
        alpha: anim.frames.iter().any(|f| f.payload.has_alpha()),
        exif: exif.is_some(),
        xmp: xmp.is_some(),
        anim: true,
    };
    write_vp8x(&mut out, flags, width, height);

    let mut anim_payload = Vec::with_capacity(ANIM_PAYLOAD_LEN);
    // Model order is R,G,B,A; the wire stores B,G,R,A.
    anim_payload.write_all(&[background[2], background[1], background[0], background[3]]);
    anim_payload.write_u16_le(loop_count.as_wire());
    write_chunk(&mut out, &TAG_ANIM, &anim_payload);

    for frame in &anim.frames {
        write_anmf(&mut out, frame);
    }

    write_metadata_chunks(&mut out, iccp, exif, xmp);
    Ok(out)
}
