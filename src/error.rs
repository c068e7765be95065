//! Error types for container mux/demux operations.

use alloc::string::String;
use thiserror::Error;

/// Errors that can occur while parsing, mutating, or assembling a WebP
/// container.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MuxError {
    /// The data is not a valid WebP container (bad magic, truncated chunk,
    /// or no recognizable image content).
    #[error("invalid WebP format: {0}")]
    InvalidFormat(String),

    /// Canvas dimensions are outside the format's budget: width and height
    /// must be in `1..=2^24` and their product must fit in 32 bits.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// The offending width.
        width: u32,
        /// The offending height.
        height: u32,
    },

    /// The animation loop count exceeds the 16-bit wire field.
    #[error("loop count out of range: {value} (valid: 0..=65535)")]
    LoopCountOutOfRange {
        /// The offending loop count.
        value: u32,
    },

    /// A frame duration exceeds the 24-bit wire field.
    #[error("duration out of range: {value} (valid: 0..=16777215)")]
    DurationOutOfRange {
        /// The offending duration in milliseconds.
        value: u32,
    },

    /// A per-frame field exceeds its wire budget during muxing.
    #[error("frame {index}: {field} out of range ({value})")]
    FrameFieldOutOfRange {
        /// Index of the offending frame.
        index: usize,
        /// Name of the offending field.
        field: &'static str,
        /// The offending value.
        value: u32,
    },

    /// A frame index is out of bounds.
    #[error("frame {index} out of bounds (total: {total})")]
    FrameOutOfBounds {
        /// The requested frame index.
        index: usize,
        /// The total number of frames.
        total: usize,
    },

    /// An animation was assembled without any frames.
    #[error("no frames to mux")]
    NoFrames,

    /// The operation is not supported for this image shape.
    #[error("{0}")]
    Unsupported(&'static str),

    /// The external pixel codec reported a failure.
    #[error("pixel codec error: {0}")]
    Codec(String),

    /// An I/O error from the file-based helpers.
    #[cfg(feature = "std")]
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
