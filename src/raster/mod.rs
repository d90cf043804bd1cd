//! Raster operations behind a backend seam.
//!
//! | Operation | Production implementation |
//! |---|---|
//! | **Probe** | `gdalinfo -json` |
//! | **Merge** | `gdal_merge.py` |
//! | **Translate** (reband, rescale, crop, compress) | `gdal_translate` |
//! | **Build VRT** | `gdalbuildvrt` |
//! | **Color correct** | in-process, [`crate::color`] |
//!
//! The module is split into:
//! - **Parameters**: data structures describing each operation
//! - **Backend**: [`RasterBackend`] trait + [`GdalBackend`]

pub mod backend;
pub mod gdal_backend;
mod params;

pub use backend::{BackendError, RasterBackend};
pub use gdal_backend::GdalBackend;
pub use params::{
    ColorCorrectParams, Compression, DataType, MergeParams, RasterInfo, ScaleRange,
    TranslateParams, VrtParams,
};
