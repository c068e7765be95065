//! Per-frame extraction into standalone containers.
//!
//! Each animation frame can be re-wrapped as a self-contained WebP file. A
//! minimal VP8X header is emitted only when the frame needs signaling
//! (alpha from its own payload, or ICCP/EXIF/XMP inherited from the parent
//! container); otherwise the raw payload chunk is wrapped directly.

use alloc::vec::Vec;

use crate::assemble::{
    Vp8xFlags, payload_chunks_len, validate_canvas, write_metadata_chunks, write_payload_chunks,
    write_vp8x,
};
use crate::error::MuxError;
use crate::model::{ExtendedContent, ExtendedImage, Frame, WebPImage};
use crate::riff::{VP8X_PAYLOAD_LEN, VecWriter, chunk_size};

impl WebPImage {
    /// Extract animation frame `index` as a standalone container.
    ///
    /// Re-parsing the result reproduces the frame's recorded width, height,
    /// and alpha presence.
    pub fn demux_frame(&self, index: usize) -> Result<Vec<u8>, MuxError> {
        let (ext, anim) = self.require_animation()?;
        let total = anim.frames.len();
        let frame = anim
            .frames
            .get(index)
            .ok_or(MuxError::FrameOutOfBounds { index, total })?;
        demux_one(ext, frame)
    }

    /// Extract every animation frame as a standalone container, in order.
    pub fn demux_frames(&self) -> Result<Vec<Vec<u8>>, MuxError> {
        let (ext, anim) = self.require_animation()?;
        anim.frames.iter().map(|frame| demux_one(ext, frame)).collect()
    }

    fn require_animation(&self) -> Result<(&ExtendedImage, &crate::model::Animation), MuxError> {
        if let WebPImage::Extended(ext) = self
            && let ExtendedContent::Animation(anim) = &ext.content
        {
            return Ok((ext, anim));
        }
        Err(MuxError::Unsupported("image is not an animation"))
    }
}

fn demux_one(ext: &ExtendedImage, frame: &Frame) -> Result<Vec<u8>, MuxError> {
    let iccp = ext.iccp.as_deref();
    let exif = ext.exif.as_deref();
    let xmp = ext.xmp.as_deref();

    let has_alpha = frame.payload.has_alpha();
    let needs_vp8x = has_alpha || iccp.is_some() || exif.is_some() || xmp.is_some();

    let mut total = 4 + payload_chunks_len(&frame.payload);
    if needs_vp8x {
        validate_canvas(frame.width, frame.height)?;
        total += chunk_size(VP8X_PAYLOAD_LEN);
        total += [iccp, exif, xmp]
            .into_iter()
            .flatten()
            .map(|blob| chunk_size(blob.len()))
            .sum::<u32>();
    }

    let mut out = Vec::with_capacity(total as usize + 8);
    out.write_all(b"RIFF");
    out.write_u32_le(total);
    out.write_all(b"WEBP");

    if needs_vp8x {
        let flags = Vp8xFlags {
            iccp: iccp.is_some(),
            alpha: has_alpha,
            exif: exif.is_some(),
            xmp: xmp.is_some(),
            anim: false,
        };
        write_vp8x(&mut out, flags, frame.width, frame.height);
    }
    write_payload_chunks(&mut out, &frame.payload);
    if needs_vp8x {
        write_metadata_chunks(&mut out, iccp, exif, xmp);
    }
    Ok(out)
}
