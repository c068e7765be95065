//! Chunk-level mux/demux for the WebP RIFF container.
//!
//! This crate parses a WebP file into a structured in-memory model
//! ([`WebPImage`]), lets you mutate it (metadata, loop count, frame timing,
//! frame replacement), and re-serializes it to a byte-exact container. It
//! never compresses or decompresses pixels: VP8/VP8L payloads are carried
//! opaquely, with only their documented header fields decoded (see
//! [`bitstream`]). Plug an actual codec in through the [`codec::PixelCodec`]
//! seam when you need to build frames from raw pixels.
//!
//! # Features
//!
//! - `std` (default): file-based [`WebPImage::load`] / [`WebPImage::save`]
//!   helpers and `std::io::Error` interop.
//! - `cli` (default): the `zenmux` command-line tool.
//!
//! Without `std` the crate is `no_std + alloc`; all core operations take
//! `&[u8]` slices and return `Vec<u8>`.
//!
//! # Reading and editing
//!
//! ```rust,no_run
//! use zenmux::WebPImage;
//!
//! let data: &[u8] = &[]; // your WebP bytes
//! let mut image = WebPImage::parse(data)?;
//! println!("{}x{}, {} frame(s)", image.width(), image.height(), image.frame_count());
//!
//! // Attaching metadata promotes a simple image to the extended form.
//! image.set_iccp(Some(vec![0u8; 10]));
//! let rewritten = image.serialize()?;
//! # let _ = rewritten;
//! # Ok::<(), zenmux::MuxError>(())
//! ```
//!
//! # Building an animation
//!
//! ```rust,no_run
//! use zenmux::{AnimOptions, FramePlacement, LoopCount, WebPImage};
//!
//! let first = WebPImage::load("a.webp")?;
//! let second = WebPImage::load("b.webp")?;
//!
//! let mut anim = WebPImage::new_animation([255, 255, 255, 255], LoopCount::Forever);
//! let animation = anim.animation_mut().expect("new_animation is animated");
//! animation.push_image(&first, FramePlacement::default())?;
//! animation.push_image(&second, FramePlacement::default())?;
//!
//! let webp = anim.mux_anim(&AnimOptions::default())?;
//! # let _ = webp;
//! # Ok::<(), zenmux::MuxError>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

extern crate alloc;

pub mod bitstream;
/// The pixel-codec collaborator seam.
pub mod codec;
/// Standalone metadata convenience functions.
pub mod metadata;

mod assemble;
mod demux;
mod error;
mod model;
mod parse;
mod riff;
mod slice_reader;

pub use assemble::AnimOptions;
pub use error::MuxError;
pub use model::{
    Animation, Bitstream, BlendMethod, DisposeMethod, ExtendedContent, ExtendedImage, Frame,
    FramePlacement, LoopCount, Payload, WebPImage,
};
