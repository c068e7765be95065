//! Chunk-level container reader.
//!
//! One sequential pass over the byte source produces a [`WebPImage`]. The
//! scan follows a first-occurrence-wins policy: later duplicates of a chunk
//! the model has already captured are read and discarded, as are chunks with
//! unrecognized tags. This is deliberate policy, not error recovery; real
//! failures (bad magic, truncation, structural contradictions) fail fast.

use alloc::format;
use alloc::vec::Vec;
use tracing::debug;

use crate::error::MuxError;
use crate::model::{
    Animation, Bitstream, BlendMethod, DisposeMethod, ExtendedContent, ExtendedImage, Frame,
    LoopCount, Payload, WebPImage,
};
use crate::riff::{
    ANIM_PAYLOAD_LEN, ANMF_HEADER_LEN, TAG_ALPH, TAG_ANIM, TAG_ANMF, TAG_EXIF, TAG_ICCP,
    TAG_VP8, TAG_VP8L, TAG_VP8X, TAG_XMP, VP8X_PAYLOAD_LEN,
};
use crate::riff::{FLAG_ALPHA, FLAG_ANIM, FLAG_EXIF, FLAG_ICCP, FLAG_XMP};
use crate::slice_reader::SliceReader;

/// Decoded VP8X header fields.
struct Vp8xHeader {
    has_iccp: bool,
    has_alpha: bool,
    has_exif: bool,
    has_xmp: bool,
    has_anim: bool,
    canvas_width: u32,
    canvas_height: u32,
}

/// Raw first-occurrence capture of the top-level chunk scan, reconciled
/// into the typed model by [`finalize`].
#[derive(Default)]
struct TopScan {
    vp8x: Option<Vp8xHeader>,
    anim: Option<Animation>,
    vp8: Option<Bitstream>,
    vp8l: Option<Bitstream>,
    alph: Option<Vec<u8>>,
    iccp: Option<Vec<u8>>,
    exif: Option<Vec<u8>>,
    xmp: Option<Vec<u8>>,
}

impl WebPImage {
    /// Parse a complete WebP container from a byte slice.
    pub fn parse(data: &[u8]) -> Result<Self, MuxError> {
        let mut r = SliceReader::new(data);

        let mut sig = [0u8; 4];
        r.read_exact(&mut sig)
            .map_err(|_| MuxError::InvalidFormat("file too small for RIFF header".into()))?;
        if sig != *b"RIFF" {
            return Err(MuxError::InvalidFormat("bad header (not RIFF)".into()));
        }
        let _declared_size = r
            .read_u32_le()
            .map_err(|_| MuxError::InvalidFormat("file too small for RIFF header".into()))?;
        r.read_exact(&mut sig)
            .map_err(|_| MuxError::InvalidFormat("file too small for RIFF header".into()))?;
        if sig != *b"WEBP" {
            return Err(MuxError::InvalidFormat("bad header (not WEBP)".into()));
        }

        let mut scan = TopScan::default();
        let mut first = true;
        while let Some((tag, size)) = read_chunk_header(&mut r)? {
            match tag {
                TAG_VP8 => {
                    let payload = read_payload(&mut r, &tag, size)?;
                    if first {
                        // The simple lossy format carries nothing after its
                        // single bitstream chunk.
                        return Ok(WebPImage::Lossy(Bitstream::lossy(payload.to_vec())?));
                    }
                    if scan.vp8.is_none() {
                        scan.vp8 = Some(Bitstream::lossy(payload.to_vec())?);
                    } else {
                        debug!("duplicate VP8 chunk skipped");
                    }
                }
                TAG_VP8L => {
                    let payload = read_payload(&mut r, &tag, size)?;
                    if first {
                        return Ok(WebPImage::Lossless(Bitstream::lossless(payload.to_vec())?));
                    }
                    if scan.vp8l.is_none() {
                        scan.vp8l = Some(Bitstream::lossless(payload.to_vec())?);
                    } else {
                        debug!("duplicate VP8L chunk skipped");
                    }
                }
                TAG_VP8X => {
                    let payload = read_payload(&mut r, &tag, size)?;
                    if scan.vp8x.is_none() {
                        scan.vp8x = Some(parse_vp8x(payload)?);
                    } else {
                        debug!("duplicate VP8X chunk skipped");
                    }
                }
                TAG_ANIM => {
                    let payload = read_payload(&mut r, &tag, size)?;
                    if scan.anim.is_none() {
                        scan.anim = Some(parse_anim(payload)?);
                    } else {
                        debug!("duplicate ANIM chunk skipped");
                    }
                }
                TAG_ANMF => {
                    let payload = read_payload(&mut r, &tag, size)?;
                    let anim = scan.anim.as_mut().ok_or_else(|| {
                        MuxError::InvalidFormat("ANMF chunk before ANIM".into())
                    })?;
                    anim.frames.push(parse_anmf(payload)?);
                }
                TAG_ALPH => capture(&mut scan.alph, &mut r, &tag, size)?,
                TAG_ICCP => capture(&mut scan.iccp, &mut r, &tag, size)?,
                TAG_EXIF => capture(&mut scan.exif, &mut r, &tag, size)?,
                TAG_XMP => capture(&mut scan.xmp, &mut r, &tag, size)?,
                _ => {
                    read_payload(&mut r, &tag, size)?;
                    debug!(tag = tag_name(&tag), "unrecognized chunk skipped");
                }
            }
            first = false;
        }

        finalize(scan)
    }

    /// Read and parse a WebP file.
    ///
    /// The file is read in full before parsing; the handle is scoped to the
    /// read and released on every path, including parse failures.
    #[cfg(feature = "std")]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, MuxError> {
        let data = std::fs::read(path)?;
        Self::parse(&data)
    }
}

/// Reconcile the raw scan into the typed model.
fn finalize(scan: TopScan) -> Result<WebPImage, MuxError> {
    let Some(vp8x) = scan.vp8x else {
        return Err(MuxError::InvalidFormat(
            "no recognizable image content".into(),
        ));
    };

    let content = if vp8x.has_anim {
        let anim = scan.anim.ok_or_else(|| {
            MuxError::InvalidFormat("animation flagged but no ANIM chunk".into())
        })?;
        ExtendedContent::Animation(anim)
    } else {
        if scan.anim.is_some() {
            debug!("ANIM chunk present without the Anim flag; discarded");
        }
        let payload = if let Some(vp8) = scan.vp8 {
            Some(Payload::Lossy {
                vp8,
                alpha: scan.alph,
            })
        } else {
            scan.vp8l.map(Payload::Lossless)
        };
        ExtendedContent::Still(payload)
    };

    let ext = ExtendedImage {
        canvas_width: vp8x.canvas_width,
        canvas_height: vp8x.canvas_height,
        // Blobs survive only when the corresponding VP8X flag was set; the
        // flags themselves are re-derived from presence at write time.
        iccp: if vp8x.has_iccp { scan.iccp } else { None },
        exif: if vp8x.has_exif { scan.exif } else { None },
        xmp: if vp8x.has_xmp { scan.xmp } else { None },
        content,
    };
    if ext.has_alpha() != vp8x.has_alpha {
        debug!("declared alpha flag disagrees with payload content");
    }
    Ok(WebPImage::Extended(ext))
}

/// Read the next 8-byte chunk header. A clean end of data, or an all-zero
/// tag, terminates the scan; a partial header is a truncation error.
fn read_chunk_header(r: &mut SliceReader<'_>) -> Result<Option<([u8; 4], usize)>, MuxError> {
    if r.remaining() == 0 {
        return Ok(None);
    }
    if r.remaining() < 8 {
        return Err(MuxError::InvalidFormat("truncated chunk header".into()));
    }
    let mut tag = [0u8; 4];
    r.read_exact(&mut tag)?;
    let size = r.read_u32_le()? as usize;
    if tag == [0; 4] {
        return Ok(None);
    }
    Ok(Some((tag, size)))
}

/// Take a chunk's declared payload and consume its pad byte if the length
/// is odd. A pad missing at the very end of the data is tolerated.
fn read_payload<'a>(
    r: &mut SliceReader<'a>,
    tag: &[u8; 4],
    size: usize,
) -> Result<&'a [u8], MuxError> {
    let payload = r.take_slice(size).map_err(|_| {
        MuxError::InvalidFormat(format!("truncated {} chunk", tag_name(tag)))
    })?;
    if size % 2 == 1 {
        r.skip_at_most(1);
    }
    Ok(payload)
}

/// First-occurrence capture of a raw metadata chunk.
fn capture(
    slot: &mut Option<Vec<u8>>,
    r: &mut SliceReader<'_>,
    tag: &[u8; 4],
    size: usize,
) -> Result<(), MuxError> {
    let payload = read_payload(r, tag, size)?;
    if slot.is_none() {
        *slot = Some(payload.to_vec());
    } else {
        debug!(tag = tag_name(tag), "duplicate chunk skipped");
    }
    Ok(())
}

fn tag_name(tag: &[u8; 4]) -> &str {
    core::str::from_utf8(tag).unwrap_or("????")
}

fn parse_vp8x(payload: &[u8]) -> Result<Vp8xHeader, MuxError> {
    if payload.len() < VP8X_PAYLOAD_LEN {
        return Err(MuxError::InvalidFormat("VP8X chunk too small".into()));
    }
    let mut r = SliceReader::new(payload);
    let flags = r.read_u8()?;
    r.skip_at_most(3); // reserved
    let canvas_width = r.read_u24_le()? + 1;
    let canvas_height = r.read_u24_le()? + 1;
    Ok(Vp8xHeader {
        has_iccp: flags & FLAG_ICCP != 0,
        has_alpha: flags & FLAG_ALPHA != 0,
        has_exif: flags & FLAG_EXIF != 0,
        has_xmp: flags & FLAG_XMP != 0,
        has_anim: flags & FLAG_ANIM != 0,
        canvas_width,
        canvas_height,
    })
}

fn parse_anim(payload: &[u8]) -> Result<Animation, MuxError> {
    if payload.len() < ANIM_PAYLOAD_LEN {
        return Err(MuxError::InvalidFormat("ANIM chunk too small".into()));
    }
    let mut r = SliceReader::new(payload);
    let mut bgra = [0u8; 4];
    r.read_exact(&mut bgra)?;
    // The container stores the background color as B,G,R,A; the model
    // exposes R,G,B,A.
    let background_color = [bgra[2], bgra[1], bgra[0], bgra[3]];
    let loop_count = LoopCount::from_wire(r.read_u16_le()?);
    Ok(Animation {
        background_color,
        loop_count,
        frames: Vec::new(),
    })
}

/// Parse one ANMF payload. The reader is constructed over exactly the
/// chunk's declared bytes, so the nested sub-chunk scan is structurally
/// confined to this frame.
fn parse_anmf(payload: &[u8]) -> Result<Frame, MuxError> {
    if payload.len() < ANMF_HEADER_LEN {
        return Err(MuxError::InvalidFormat("ANMF chunk too small".into()));
    }
    let mut r = SliceReader::new(payload);
    let x = r.read_u24_le()?;
    let y = r.read_u24_le()?;
    let width = r.read_u24_le()? + 1;
    let height = r.read_u24_le()? + 1;
    let duration_ms = r.read_u24_le()?;
    let flags = r.read_u8()?;
    let dispose = if flags & 0b01 != 0 {
        DisposeMethod::Background
    } else {
        DisposeMethod::None
    };
    let blend = if flags & 0b10 != 0 {
        BlendMethod::Overwrite
    } else {
        BlendMethod::AlphaBlend
    };

    let mut vp8: Option<Bitstream> = None;
    let mut vp8l: Option<Bitstream> = None;
    let mut alph: Option<Vec<u8>> = None;
    let mut first_lossless: Option<bool> = None;
    while let Some((tag, size)) = read_chunk_header(&mut r)? {
        match tag {
            TAG_VP8 => {
                let data = read_payload(&mut r, &tag, size)?;
                if vp8.is_none() {
                    vp8 = Some(Bitstream::lossy(data.to_vec())?);
                    first_lossless.get_or_insert(false);
                } else {
                    debug!("duplicate VP8 sub-chunk skipped");
                }
            }
            TAG_VP8L => {
                let data = read_payload(&mut r, &tag, size)?;
                if vp8l.is_none() {
                    vp8l = Some(Bitstream::lossless(data.to_vec())?);
                    first_lossless.get_or_insert(true);
                } else {
                    debug!("duplicate VP8L sub-chunk skipped");
                }
            }
            TAG_ALPH => {
                let data = read_payload(&mut r, &tag, size)?;
                if alph.is_none() {
                    alph = Some(data.to_vec());
                } else {
                    debug!("duplicate ALPH sub-chunk skipped");
                }
            }
            _ => {
                read_payload(&mut r, &tag, size)?;
                debug!(tag = tag_name(&tag), "unrecognized sub-chunk skipped");
            }
        }
    }

    let payload = match (vp8, vp8l, first_lossless) {
        (Some(vp8), _, Some(false)) => Payload::Lossy { vp8, alpha: alph },
        (_, Some(vp8l), Some(true)) => Payload::Lossless(vp8l),
        _ => {
            return Err(MuxError::InvalidFormat(
                "animation frame has no image sub-chunk".into(),
            ));
        }
    };

    Ok(Frame {
        x,
        y,
        width,
        height,
        duration_ms,
        dispose,
        blend,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vp8x_decodes_flags_and_canvas() {
        let mut payload = alloc::vec![0u8; 10];
        payload[0] = FLAG_ICCP | FLAG_ANIM;
        payload[4..7].copy_from_slice(&319u32.to_le_bytes()[..3]);
        payload[7..10].copy_from_slice(&239u32.to_le_bytes()[..3]);
        let h = parse_vp8x(&payload).unwrap();
        assert!(h.has_iccp && h.has_anim);
        assert!(!h.has_alpha && !h.has_exif && !h.has_xmp);
        assert_eq!((h.canvas_width, h.canvas_height), (320, 240));
    }

    #[test]
    fn anim_reorders_background_to_rgba() {
        let payload = [10, 20, 30, 40, 3, 0];
        let anim = parse_anim(&payload).unwrap();
        assert_eq!(anim.background_color, [30, 20, 10, 40]);
        assert_eq!(anim.loop_count.as_wire(), 3);
    }

    #[test]
    fn anmf_sub_chunk_cannot_escape_declared_length() {
        // ANMF header + a VP8L sub-chunk whose declared size overruns the
        // frame payload.
        let mut payload = alloc::vec![0u8; ANMF_HEADER_LEN];
        payload.extend_from_slice(b"VP8L");
        payload.extend_from_slice(&100u32.to_le_bytes());
        payload.extend_from_slice(&[0x2f, 0, 0, 0, 0]);
        assert!(matches!(
            parse_anmf(&payload),
            Err(MuxError::InvalidFormat(_))
        ));
    }
}
