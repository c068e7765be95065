//! The in-memory container model.
//!
//! A parsed WebP file becomes a [`WebPImage`]: an explicit tagged union over
//! the three container layouts (simple lossy, simple lossless, extended).
//! All optional features (metadata blobs, an embedded still payload, an
//! animation) live in typed fields; the VP8X flag byte is never stored but
//! derived from live field presence at write time, so mutation can never
//! leave a stale flag behind.

use alloc::vec::Vec;
use core::num::NonZeroU16;

use crate::bitstream::{vp8_dimensions, vp8l_features};
use crate::error::MuxError;

/// How the frame area is disposed after rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposeMethod {
    /// Do not dispose. The frame remains on the canvas.
    None,
    /// Fill the frame rectangle with the background color.
    Background,
}

/// How the frame is blended with the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMethod {
    /// Use alpha blending with the existing canvas content.
    AlphaBlend,
    /// Overwrite the canvas region with the frame data.
    Overwrite,
}

/// Number of times that an animation loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCount {
    /// The animation loops forever (stored as 0 on the wire).
    Forever,
    /// The animation is played the specified number of times.
    Times(NonZeroU16),
}

impl LoopCount {
    /// Interpret the raw 16-bit loop-count field (0 means forever).
    pub fn from_wire(raw: u16) -> Self {
        match NonZeroU16::new(raw) {
            Some(n) => LoopCount::Times(n),
            None => LoopCount::Forever,
        }
    }

    /// The raw 16-bit field written to the ANIM chunk.
    pub fn as_wire(self) -> u16 {
        match self {
            LoopCount::Forever => 0,
            LoopCount::Times(n) => n.get(),
        }
    }
}

impl core::fmt::Display for LoopCount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LoopCount::Forever => f.write_str("infinite"),
            LoopCount::Times(n) => write!(f, "{n}"),
        }
    }
}

/// A raw compressed payload with its header-derived properties.
///
/// The width, height, and alpha bit are extracted from the payload bytes at
/// construction via the [`bitstream`](crate::bitstream) probes and are
/// read-only afterwards; the payload itself is otherwise opaque.
#[derive(Debug, Clone)]
pub struct Bitstream {
    data: Vec<u8>,
    width: u32,
    height: u32,
    has_alpha: bool,
}

impl Bitstream {
    /// Wrap a raw VP8 payload, deriving width and height from its frame tag.
    pub fn lossy(data: Vec<u8>) -> Result<Self, MuxError> {
        let (width, height) = vp8_dimensions(&data)?;
        Ok(Self {
            data,
            width,
            height,
            has_alpha: false,
        })
    }

    /// Wrap a raw VP8L payload, deriving width, height, and the alpha bit
    /// from its header.
    pub fn lossless(data: Vec<u8>) -> Result<Self, MuxError> {
        let f = vp8l_features(&data)?;
        Ok(Self {
            data,
            width: f.width,
            height: f.height,
            has_alpha: f.has_alpha,
        })
    }

    /// The raw payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Width in pixels, as declared by the payload header.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels, as declared by the payload header.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether the payload header declares alpha (always `false` for VP8).
    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }
}

/// The compressed payload of a frame or of an extended still image.
#[derive(Debug, Clone)]
pub enum Payload {
    /// A VP8 bitstream, optionally accompanied by a raw ALPH alpha plane.
    Lossy {
        /// The VP8 bitstream.
        vp8: Bitstream,
        /// Raw ALPH chunk payload, if present.
        alpha: Option<Vec<u8>>,
    },
    /// A VP8L bitstream (alpha, if any, is part of the bitstream itself).
    Lossless(Bitstream),
}

impl Payload {
    /// The underlying bitstream.
    pub fn bitstream(&self) -> &Bitstream {
        match self {
            Payload::Lossy { vp8, .. } => vp8,
            Payload::Lossless(vp8l) => vp8l,
        }
    }

    /// Width in pixels, from the bitstream header.
    pub fn width(&self) -> u32 {
        self.bitstream().width()
    }

    /// Height in pixels, from the bitstream header.
    pub fn height(&self) -> u32 {
        self.bitstream().height()
    }

    /// Whether this payload carries alpha: an attached ALPH plane for lossy
    /// data, or the header bit for lossless data.
    pub fn has_alpha(&self) -> bool {
        match self {
            Payload::Lossy { alpha, .. } => alpha.is_some(),
            Payload::Lossless(vp8l) => vp8l.has_alpha(),
        }
    }

    /// Whether the payload is lossless (VP8L).
    pub fn is_lossless(&self) -> bool {
        matches!(self, Payload::Lossless(_))
    }
}

/// Placement and timing for a frame being added to an animation.
#[derive(Debug, Clone, Copy)]
pub struct FramePlacement {
    /// Horizontal offset, in the raw 24-bit ANMF units.
    pub x: u32,
    /// Vertical offset, in the raw 24-bit ANMF units.
    pub y: u32,
    /// Display duration in milliseconds.
    pub duration_ms: u32,
    /// Dispose method for the frame.
    pub dispose: DisposeMethod,
    /// Blend method for the frame.
    pub blend: BlendMethod,
}

impl Default for FramePlacement {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            duration_ms: 100,
            dispose: DisposeMethod::None,
            blend: BlendMethod::AlphaBlend,
        }
    }
}

/// One animation frame: placement, timing, flags, and its payload.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Horizontal offset, in the raw 24-bit ANMF units.
    pub x: u32,
    /// Vertical offset, in the raw 24-bit ANMF units.
    pub y: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Display duration in milliseconds.
    pub duration_ms: u32,
    /// How the frame area is disposed after rendering.
    pub dispose: DisposeMethod,
    /// How the frame is blended onto the canvas.
    pub blend: BlendMethod,
    /// The frame's compressed payload.
    pub payload: Payload,
}

impl Frame {
    /// Build a frame from a standalone image.
    ///
    /// The source must be a simple image or a non-animated extended image;
    /// an animated source fails with [`MuxError::Unsupported`].
    pub fn from_image(source: &WebPImage, placement: FramePlacement) -> Result<Self, MuxError> {
        let payload = source.still_payload()?;
        Ok(Self {
            x: placement.x,
            y: placement.y,
            width: source.width(),
            height: source.height(),
            duration_ms: placement.duration_ms,
            dispose: placement.dispose,
            blend: placement.blend,
            payload,
        })
    }
}

/// Global animation state: background color, loop count, and the frames.
#[derive(Debug, Clone)]
pub struct Animation {
    /// Background color in R,G,B,A order (the container stores B,G,R,A).
    pub background_color: [u8; 4],
    /// Number of times the animation is played.
    pub loop_count: LoopCount,
    /// The ordered frame sequence.
    pub frames: Vec<Frame>,
}

impl Animation {
    /// Set the duration of every frame in the inclusive index range
    /// `start..=end`.
    ///
    /// An `end` of 0 means "through the last frame". Indices past the end of
    /// the sequence are clipped to the last frame with a warning; an empty
    /// range is a no-op.
    pub fn set_durations(
        &mut self,
        duration_ms: u32,
        start: usize,
        end: usize,
    ) -> Result<(), MuxError> {
        if duration_ms >= 1 << 24 {
            return Err(MuxError::DurationOutOfRange { value: duration_ms });
        }
        let Some(last) = self.frames.len().checked_sub(1) else {
            tracing::warn!("animation has no frames; nothing to edit");
            return Ok(());
        };
        let mut end = if end == 0 { last } else { end };
        if end > last {
            tracing::warn!(end, last, "end frame beyond frame count; clipping");
            end = last;
        }
        let mut start = start;
        if start > last {
            tracing::warn!(start, last, "start frame beyond frame count; clipping");
            start = last;
        }
        if start <= end {
            for frame in &mut self.frames[start..=end] {
                frame.duration_ms = duration_ms;
            }
        }
        Ok(())
    }

    /// Append the content of a standalone image as animation frames.
    ///
    /// A simple or non-animated extended source contributes one frame. An
    /// animated source is flattened: each of its frames is appended directly,
    /// re-stamped with the caller's placement and timing, never nested.
    pub fn push_image(
        &mut self,
        source: &WebPImage,
        placement: FramePlacement,
    ) -> Result<(), MuxError> {
        if let WebPImage::Extended(ext) = source
            && let ExtendedContent::Animation(inner) = &ext.content
        {
            for frame in &inner.frames {
                self.frames.push(Frame {
                    x: placement.x,
                    y: placement.y,
                    width: frame.width,
                    height: frame.height,
                    duration_ms: placement.duration_ms,
                    dispose: placement.dispose,
                    blend: placement.blend,
                    payload: frame.payload.clone(),
                });
            }
            return Ok(());
        }
        self.frames.push(Frame::from_image(source, placement)?);
        Ok(())
    }
}

/// Content of an extended container: either a still payload or an animation.
#[derive(Debug, Clone)]
pub enum ExtendedContent {
    /// A single embedded image payload. `None` for a header-only container
    /// that carries metadata but no image chunk.
    Still(Option<Payload>),
    /// An animation (the VP8X Anim flag on the wire).
    Animation(Animation),
}

/// A VP8X extended container: canvas, optional metadata, and content.
#[derive(Debug, Clone)]
pub struct ExtendedImage {
    /// Canvas width in pixels (1..=2^24). 0 means "not yet determined":
    /// synthetically built animations leave it to the muxer to auto-compute.
    pub canvas_width: u32,
    /// Canvas height in pixels; see `canvas_width` for the 0 convention.
    pub canvas_height: u32,
    /// Raw ICC profile, if present.
    pub iccp: Option<Vec<u8>>,
    /// Raw EXIF metadata, if present.
    pub exif: Option<Vec<u8>>,
    /// Raw XMP metadata, if present.
    pub xmp: Option<Vec<u8>>,
    /// The image content.
    pub content: ExtendedContent,
}

impl ExtendedImage {
    /// Whether any live content carries alpha. This is the value the VP8X
    /// Alpha flag takes at write time.
    pub fn has_alpha(&self) -> bool {
        match &self.content {
            ExtendedContent::Still(payload) => {
                payload.as_ref().is_some_and(Payload::has_alpha)
            }
            ExtendedContent::Animation(anim) => {
                anim.frames.iter().any(|f| f.payload.has_alpha())
            }
        }
    }
}

/// A fully materialized WebP container.
///
/// Produced by [`parse`](WebPImage::parse) in one pass over a byte source,
/// or built synthetically with [`new_animation`](WebPImage::new_animation).
/// Mutators operate in place; attaching metadata to a simple image promotes
/// it to the extended form first (a one-way transition).
#[derive(Debug, Clone)]
pub enum WebPImage {
    /// Simple lossy container: a bare VP8 chunk.
    Lossy(Bitstream),
    /// Simple lossless container: a bare VP8L chunk.
    Lossless(Bitstream),
    /// Extended (VP8X) container.
    Extended(ExtendedImage),
}

impl WebPImage {
    /// Create an empty animation with the given background color (R,G,B,A)
    /// and loop count.
    ///
    /// The canvas is left undetermined; the muxer auto-computes it from the
    /// frames unless set explicitly. Append frames with
    /// [`Animation::push_image`] or by pushing [`Frame`]s directly.
    pub fn new_animation(background_color: [u8; 4], loop_count: LoopCount) -> Self {
        WebPImage::Extended(ExtendedImage {
            canvas_width: 0,
            canvas_height: 0,
            iccp: None,
            exif: None,
            xmp: None,
            content: ExtendedContent::Animation(Animation {
                background_color,
                loop_count,
                frames: Vec::new(),
            }),
        })
    }

    /// Image width in pixels: the canvas width for extended containers, the
    /// bitstream width for simple ones.
    pub fn width(&self) -> u32 {
        match self {
            WebPImage::Lossy(bs) | WebPImage::Lossless(bs) => bs.width(),
            WebPImage::Extended(ext) => ext.canvas_width,
        }
    }

    /// Image height in pixels; see [`width`](Self::width).
    pub fn height(&self) -> u32 {
        match self {
            WebPImage::Lossy(bs) | WebPImage::Lossless(bs) => bs.height(),
            WebPImage::Extended(ext) => ext.canvas_height,
        }
    }

    /// Whether any live content carries alpha.
    pub fn has_alpha(&self) -> bool {
        match self {
            WebPImage::Lossy(_) => false,
            WebPImage::Lossless(bs) => bs.has_alpha(),
            WebPImage::Extended(ext) => ext.has_alpha(),
        }
    }

    /// Whether this is an extended container holding an animation.
    pub fn is_animated(&self) -> bool {
        self.animation().is_some()
    }

    /// The animation state, if this image is animated.
    pub fn animation(&self) -> Option<&Animation> {
        match self {
            WebPImage::Extended(ExtendedImage {
                content: ExtendedContent::Animation(anim),
                ..
            }) => Some(anim),
            _ => None,
        }
    }

    /// Mutable access to the animation state, if this image is animated.
    pub fn animation_mut(&mut self) -> Option<&mut Animation> {
        match self {
            WebPImage::Extended(ExtendedImage {
                content: ExtendedContent::Animation(anim),
                ..
            }) => Some(anim),
            _ => None,
        }
    }

    /// Number of animation frames (0 for non-animated images).
    pub fn frame_count(&self) -> usize {
        self.animation().map_or(0, |anim| anim.frames.len())
    }

    /// The ICC profile, if present.
    pub fn iccp(&self) -> Option<&[u8]> {
        match self {
            WebPImage::Extended(ext) => ext.iccp.as_deref(),
            _ => None,
        }
    }

    /// The EXIF metadata, if present.
    pub fn exif(&self) -> Option<&[u8]> {
        match self {
            WebPImage::Extended(ext) => ext.exif.as_deref(),
            _ => None,
        }
    }

    /// The XMP metadata, if present.
    pub fn xmp(&self) -> Option<&[u8]> {
        match self {
            WebPImage::Extended(ext) => ext.xmp.as_deref(),
            _ => None,
        }
    }

    /// Set or clear the ICC profile, promoting a simple image to the
    /// extended form first.
    pub fn set_iccp(&mut self, iccp: Option<Vec<u8>>) {
        self.promote_to_extended().iccp = iccp;
    }

    /// Set or clear the EXIF metadata, promoting a simple image to the
    /// extended form first.
    pub fn set_exif(&mut self, exif: Option<Vec<u8>>) {
        self.promote_to_extended().exif = exif;
    }

    /// Set or clear the XMP metadata, promoting a simple image to the
    /// extended form first.
    pub fn set_xmp(&mut self, xmp: Option<Vec<u8>>) {
        self.promote_to_extended().xmp = xmp;
    }

    /// Set the animation loop count (0 = infinite, max 65535).
    pub fn set_loop_count(&mut self, count: u32) -> Result<(), MuxError> {
        if count > u32::from(u16::MAX) {
            return Err(MuxError::LoopCountOutOfRange { value: count });
        }
        let anim = self
            .animation_mut()
            .ok_or(MuxError::Unsupported("image is not an animation"))?;
        anim.loop_count = LoopCount::from_wire(count as u16);
        Ok(())
    }

    /// Set the duration of the frames in the inclusive range `start..=end`;
    /// see [`Animation::set_durations`].
    pub fn set_frame_durations(
        &mut self,
        duration_ms: u32,
        start: usize,
        end: usize,
    ) -> Result<(), MuxError> {
        let anim = self
            .animation_mut()
            .ok_or(MuxError::Unsupported("image is not an animation"))?;
        anim.set_durations(duration_ms, start, end)
    }

    /// Replace the payload of frame `index` with the content of a standalone
    /// image.
    ///
    /// The frame's recorded width and height are updated to the
    /// replacement's; its placement, timing, dispose, and blend settings are
    /// left untouched. An animated replacement source fails with
    /// [`MuxError::Unsupported`] and leaves the frame unmodified.
    pub fn replace_frame(&mut self, index: usize, source: &WebPImage) -> Result<(), MuxError> {
        let width = source.width();
        let height = source.height();
        let payload = source.still_payload()?;
        let anim = self
            .animation_mut()
            .ok_or(MuxError::Unsupported("image is not an animation"))?;
        let total = anim.frames.len();
        let frame = anim
            .frames
            .get_mut(index)
            .ok_or(MuxError::FrameOutOfBounds { index, total })?;
        frame.payload = payload;
        frame.width = width;
        frame.height = height;
        Ok(())
    }

    /// One-way transition from a simple image to the extended form.
    ///
    /// The canvas takes the bitstream-derived dimensions, all metadata
    /// starts out absent, and the original payload becomes the embedded
    /// still. A no-op for images that are already extended.
    pub fn promote_to_extended(&mut self) -> &mut ExtendedImage {
        if !matches!(self, WebPImage::Extended(_)) {
            let placeholder = WebPImage::Extended(ExtendedImage {
                canvas_width: 0,
                canvas_height: 0,
                iccp: None,
                exif: None,
                xmp: None,
                content: ExtendedContent::Still(None),
            });
            let (width, height, payload) = match core::mem::replace(self, placeholder) {
                WebPImage::Lossy(vp8) => (
                    vp8.width(),
                    vp8.height(),
                    Payload::Lossy { vp8, alpha: None },
                ),
                WebPImage::Lossless(vp8l) => {
                    (vp8l.width(), vp8l.height(), Payload::Lossless(vp8l))
                }
                WebPImage::Extended(_) => unreachable!("checked above"),
            };
            *self = WebPImage::Extended(ExtendedImage {
                canvas_width: width,
                canvas_height: height,
                iccp: None,
                exif: None,
                xmp: None,
                content: ExtendedContent::Still(Some(payload)),
            });
        }
        match self {
            WebPImage::Extended(ext) => ext,
            _ => unreachable!("promotion always yields an extended image"),
        }
    }

    /// Extract this image's single compressed payload for use as a frame.
    ///
    /// Fails with [`MuxError::Unsupported`] for animated sources and with
    /// [`MuxError::InvalidFormat`] for header-only extended containers.
    pub(crate) fn still_payload(&self) -> Result<Payload, MuxError> {
        match self {
            WebPImage::Lossy(vp8) => Ok(Payload::Lossy {
                vp8: vp8.clone(),
                alpha: None,
            }),
            WebPImage::Lossless(vp8l) => Ok(Payload::Lossless(vp8l.clone())),
            WebPImage::Extended(ext) => match &ext.content {
                ExtendedContent::Still(Some(payload)) => Ok(payload.clone()),
                ExtendedContent::Still(None) => Err(MuxError::InvalidFormat(
                    "image has no bitstream payload".into(),
                )),
                ExtendedContent::Animation(_) => {
                    Err(MuxError::Unsupported("merging animations not supported"))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn lossy_image(width: u16, height: u16) -> WebPImage {
        let mut data = vec![0u8; 10];
        data[3..6].copy_from_slice(&[0x9D, 0x01, 0x2A]);
        data[6..8].copy_from_slice(&(width & 0x3FFF).to_le_bytes());
        data[8..10].copy_from_slice(&(height & 0x3FFF).to_le_bytes());
        WebPImage::Lossy(Bitstream::lossy(data).unwrap())
    }

    #[test]
    fn promotion_copies_bitstream_dimensions() {
        let mut img = lossy_image(100, 50);
        img.set_iccp(Some(vec![1, 2, 3]));
        let WebPImage::Extended(ext) = &img else {
            panic!("expected promotion to extended");
        };
        assert_eq!(ext.canvas_width, 100);
        assert_eq!(ext.canvas_height, 50);
        assert!(matches!(ext.content, ExtendedContent::Still(Some(_))));
        assert_eq!(img.iccp(), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn strip_on_simple_image_promotes_too() {
        let mut img = lossy_image(10, 10);
        img.set_exif(None);
        assert!(matches!(img, WebPImage::Extended(_)));
        assert_eq!(img.exif(), None);
    }

    #[test]
    fn duration_range_end_zero_means_last() {
        let mut img = lossy_image(16, 16);
        let payload = img.still_payload().unwrap();
        let mut anim = WebPImage::new_animation([0; 4], LoopCount::Forever);
        {
            let frames = &mut anim.animation_mut().unwrap().frames;
            for _ in 0..4 {
                frames.push(Frame {
                    x: 0,
                    y: 0,
                    width: 16,
                    height: 16,
                    duration_ms: 10,
                    dispose: DisposeMethod::None,
                    blend: BlendMethod::AlphaBlend,
                    payload: payload.clone(),
                });
            }
        }
        anim.set_frame_durations(250, 1, 0).unwrap();
        let durations: Vec<u32> = anim
            .animation()
            .unwrap()
            .frames
            .iter()
            .map(|f| f.duration_ms)
            .collect();
        assert_eq!(durations, vec![10, 250, 250, 250]);

        // Out-of-range indices clip to the last frame instead of failing.
        anim.set_frame_durations(42, 9, 9).unwrap();
        assert_eq!(anim.animation().unwrap().frames[3].duration_ms, 42);
    }

    #[test]
    fn loop_count_bounds() {
        let mut anim = WebPImage::new_animation([0; 4], LoopCount::Forever);
        assert!(anim.set_loop_count(65535).is_ok());
        assert!(matches!(
            anim.set_loop_count(65536),
            Err(MuxError::LoopCountOutOfRange { value: 65536 })
        ));
        let mut still = lossy_image(8, 8);
        assert!(matches!(
            still.set_loop_count(3),
            Err(MuxError::Unsupported(_))
        ));
    }
}
