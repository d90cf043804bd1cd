//! Raster backend trait and shared error type.
//!
//! The [`RasterBackend`] trait defines the five operations every pipeline
//! needs: probe, merge, translate, build_vrt and color_correct.
//!
//! The production implementation is
//! [`GdalBackend`](super::gdal_backend::GdalBackend), which runs the GDAL
//! command-line tools for everything except color correction. Color
//! correction runs in-process on decoded pixels.

use super::params::{
    ColorCorrectParams, MergeParams, RasterInfo, TranslateParams, VrtParams,
};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} not found; is GDAL installed and on PATH?")]
    ToolNotFound(String),
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },
    #[error("Unreadable {tool} output: {message}")]
    InvalidOutput { tool: String, message: String },
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for raster backends.
///
/// `Sync` so one backend can be shared by rayon workers.
pub trait RasterBackend: Sync {
    /// Read band count, size and data types.
    fn probe(&self, path: &Path) -> Result<RasterInfo, BackendError>;

    /// Mosaic tiles into one raster.
    fn merge(&self, params: &MergeParams) -> Result<(), BackendError>;

    /// Select bands, rescale, crop and/or compress.
    fn translate(&self, params: &TranslateParams) -> Result<(), BackendError>;

    /// Build a virtual raster over the inputs.
    fn build_vrt(&self, params: &VrtParams) -> Result<(), BackendError>;

    /// Write a color-corrected copy of an 8-bit RGB raster.
    fn color_correct(&self, params: &ColorCorrectParams) -> Result<(), BackendError>;
}
