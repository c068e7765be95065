//! The pixel-codec collaborator seam.
//!
//! The container layer never compresses or decompresses pixels itself; a
//! [`PixelCodec`] implementation (typically wrapping a native VP8/VP8L
//! codec) is handed in at the frame-construction boundary. The container
//! code treats the produced payloads as opaque apart from the header fields
//! in [`bitstream`](crate::bitstream).

use alloc::string::ToString;
use alloc::vec::Vec;

use crate::error::MuxError;
use crate::model::{Bitstream, Frame, FramePlacement, Payload};

/// Pixel-encoder configuration passed through to the codec.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Produce a lossless (VP8L) bitstream instead of a lossy (VP8) one.
    pub lossless: bool,
    /// Quality level, 0.0 (smallest) to 100.0 (best).
    pub quality: f32,
    /// Compression effort, 0 (fastest) to 6 (slowest).
    pub effort: u32,
    /// Preserve RGB values in fully transparent pixels.
    pub exact: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            lossless: false,
            quality: 75.0,
            effort: 4,
            exact: false,
        }
    }
}

/// The product of a pixel encode: a raw bitstream and, for lossy output
/// with transparency, a separate alpha plane.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// Raw VP8 or VP8L bitstream bytes (no RIFF framing).
    pub bitstream: Vec<u8>,
    /// Raw ALPH chunk payload, if the encoder produced one.
    pub alpha: Option<Vec<u8>>,
    /// Whether `bitstream` is VP8L.
    pub is_lossless: bool,
}

/// A black-box VP8/VP8L pixel codec.
pub trait PixelCodec {
    /// Codec-specific failure type.
    type Error: core::fmt::Display;

    /// Compress raw RGBA pixels into a VP8 or VP8L bitstream.
    fn encode(
        &self,
        rgba: &[u8],
        width: u32,
        height: u32,
        config: &CodecConfig,
    ) -> Result<EncodedImage, Self::Error>;

    /// Decompress a bitstream of known dimensions back into RGBA pixels.
    fn decode(
        &self,
        bitstream: &[u8],
        lossless: bool,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, Self::Error>;
}

impl Payload {
    /// Compress raw RGBA pixels into a frame payload using the given codec.
    pub fn from_pixels<C: PixelCodec>(
        codec: &C,
        rgba: &[u8],
        width: u32,
        height: u32,
        config: &CodecConfig,
    ) -> Result<Self, MuxError> {
        let encoded = codec
            .encode(rgba, width, height, config)
            .map_err(|e| MuxError::Codec(e.to_string()))?;
        if encoded.is_lossless {
            Ok(Payload::Lossless(Bitstream::lossless(encoded.bitstream)?))
        } else {
            Ok(Payload::Lossy {
                vp8: Bitstream::lossy(encoded.bitstream)?,
                alpha: encoded.alpha,
            })
        }
    }

    /// Decompress this payload back into RGBA pixels using the given codec.
    pub fn to_pixels<C: PixelCodec>(&self, codec: &C) -> Result<Vec<u8>, MuxError> {
        let bs = self.bitstream();
        codec
            .decode(bs.data(), self.is_lossless(), bs.width(), bs.height())
            .map_err(|e| MuxError::Codec(e.to_string()))
    }
}

impl Frame {
    /// Compress raw RGBA pixels into a new animation frame.
    pub fn from_pixels<C: PixelCodec>(
        codec: &C,
        rgba: &[u8],
        width: u32,
        height: u32,
        config: &CodecConfig,
        placement: FramePlacement,
    ) -> Result<Self, MuxError> {
        let payload = Payload::from_pixels(codec, rgba, width, height, config)?;
        Ok(Frame {
            x: placement.x,
            y: placement.y,
            width,
            height,
            duration_ms: placement.duration_ms,
            dispose: placement.dispose,
            blend: placement.blend,
            payload,
        })
    }
}
