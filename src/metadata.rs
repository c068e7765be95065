//! Standalone metadata convenience functions for WebP data.
//!
//! These functions operate on already-encoded WebP bytes, extracting,
//! embedding, or removing ICC, EXIF, and XMP metadata without touching
//! pixel data. Each helper performs one parse and one reassembly.
//!
//! # Example
//!
//! ```rust,no_run
//! use zenmux::metadata::{self, Metadata};
//!
//! # let webp_data: &[u8] = &[];
//! // Extract
//! let icc = metadata::icc_profile(webp_data)?;
//!
//! // Embed multiple in one pass
//! let icc_bytes = vec![0u8; 10];
//! let meta = Metadata::new().with_icc_profile(&icc_bytes);
//! let with_meta = metadata::embed(webp_data, &meta)?;
//!
//! // Remove
//! let stripped = metadata::remove_icc(webp_data)?;
//! # Ok::<(), zenmux::MuxError>(())
//! ```

use alloc::vec::Vec;

use crate::assemble::AnimOptions;
use crate::error::MuxError;
use crate::model::WebPImage;

/// A bundle of metadata blobs to embed in one pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct Metadata<'a> {
    /// ICC color profile bytes.
    pub icc_profile: Option<&'a [u8]>,
    /// EXIF metadata bytes.
    pub exif: Option<&'a [u8]>,
    /// XMP metadata bytes.
    pub xmp: Option<&'a [u8]>,
}

impl<'a> Metadata<'a> {
    /// An empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an ICC profile.
    #[must_use]
    pub fn with_icc_profile(mut self, icc: &'a [u8]) -> Self {
        self.icc_profile = Some(icc);
        self
    }

    /// Attach EXIF metadata.
    #[must_use]
    pub fn with_exif(mut self, exif: &'a [u8]) -> Self {
        self.exif = Some(exif);
        self
    }

    /// Attach XMP metadata.
    #[must_use]
    pub fn with_xmp(mut self, xmp: &'a [u8]) -> Self {
        self.xmp = Some(xmp);
        self
    }
}

/// Serialize a possibly-animated model back to bytes.
fn reassemble(image: &WebPImage) -> Result<Vec<u8>, MuxError> {
    if image.is_animated() {
        image.mux_anim(&AnimOptions::default())
    } else {
        image.serialize()
    }
}

/// Extract the ICC color profile from WebP data, if present.
pub fn icc_profile(data: &[u8]) -> Result<Option<Vec<u8>>, MuxError> {
    let image = WebPImage::parse(data)?;
    Ok(image.iccp().map(|s| s.to_vec()))
}

/// Extract EXIF metadata from WebP data, if present.
pub fn exif(data: &[u8]) -> Result<Option<Vec<u8>>, MuxError> {
    let image = WebPImage::parse(data)?;
    Ok(image.exif().map(|s| s.to_vec()))
}

/// Extract XMP metadata from WebP data, if present.
pub fn xmp(data: &[u8]) -> Result<Option<Vec<u8>>, MuxError> {
    let image = WebPImage::parse(data)?;
    Ok(image.xmp().map(|s| s.to_vec()))
}

/// Embed metadata (ICC, EXIF, XMP) into WebP data in a single pass.
///
/// More efficient than calling [`embed_icc`], [`embed_exif`], and
/// [`embed_xmp`] separately, since it only parses and reassembles the RIFF
/// container once. A simple input is promoted to the extended form.
pub fn embed(data: &[u8], metadata: &Metadata<'_>) -> Result<Vec<u8>, MuxError> {
    let mut image = WebPImage::parse(data)?;
    if let Some(icc) = metadata.icc_profile {
        image.set_iccp(Some(icc.to_vec()));
    }
    if let Some(exif) = metadata.exif {
        image.set_exif(Some(exif.to_vec()));
    }
    if let Some(xmp) = metadata.xmp {
        image.set_xmp(Some(xmp.to_vec()));
    }
    reassemble(&image)
}

/// Embed an ICC color profile into WebP data.
///
/// For embedding multiple metadata types at once, use [`embed`] instead.
pub fn embed_icc(data: &[u8], icc_profile: &[u8]) -> Result<Vec<u8>, MuxError> {
    let mut image = WebPImage::parse(data)?;
    image.set_iccp(Some(icc_profile.to_vec()));
    reassemble(&image)
}

/// Embed EXIF metadata into WebP data.
pub fn embed_exif(data: &[u8], exif: &[u8]) -> Result<Vec<u8>, MuxError> {
    let mut image = WebPImage::parse(data)?;
    image.set_exif(Some(exif.to_vec()));
    reassemble(&image)
}

/// Embed XMP metadata into WebP data.
pub fn embed_xmp(data: &[u8], xmp: &[u8]) -> Result<Vec<u8>, MuxError> {
    let mut image = WebPImage::parse(data)?;
    image.set_xmp(Some(xmp.to_vec()));
    reassemble(&image)
}

/// Remove the ICC color profile from WebP data.
pub fn remove_icc(data: &[u8]) -> Result<Vec<u8>, MuxError> {
    let mut image = WebPImage::parse(data)?;
    image.set_iccp(None);
    reassemble(&image)
}

/// Remove EXIF metadata from WebP data.
pub fn remove_exif(data: &[u8]) -> Result<Vec<u8>, MuxError> {
    let mut image = WebPImage::parse(data)?;
    image.set_exif(None);
    reassemble(&image)
}

/// Remove XMP metadata from WebP data.
pub fn remove_xmp(data: &[u8]) -> Result<Vec<u8>, MuxError> {
    let mut image = WebPImage::parse(data)?;
    image.set_xmp(None);
    reassemble(&image)
}
