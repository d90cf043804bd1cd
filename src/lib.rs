//! # Tile Reduce
//!
//! Turns raw satellite imagery downloads into small, viewable RGB GeoTiffs.
//! Provider tiles arrive as overlapping multi-band rasters with provider
//! specific band order and bit depth; this crate mosaics them, keeps three
//! bands in R G B order, rescales to 8 bits, optionally color-corrects, and
//! writes one compressed GeoTiff.
//!
//! # Pipelines
//!
//! ```text
//! visual     tiles → merge → reband 1 2 3 → compress            → <base>-visual.tif
//! analytic   tiles → merge → reband 3 2 1 → rescale → compress  → <base>-analytic.tif
//!                                            └ color-correct → compress → <base>-cc.tif
//! landsat    band files → VRT (-separate) → rescale + compress  → <scene>.tif
//! ```
//!
//! Each stage writes a file the next stage reads. Intermediates are deleted
//! as soon as they have been consumed, so a failed run leaves exactly the
//! files needed to see where it stopped.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Visual and analytic reduction: planning, validation, execution |
//! | [`landsat`] | Per-scene Landsat band stacking, run in parallel |
//! | [`raster`] | Backend seam: operation parameters, GDAL command-line backend |
//! | [`color`] | Histogram expansion, gamma and channel balance on 8-bit RGB |
//! | [`geo`] | Area-of-interest bounds from GeoJSON |
//! | [`naming`] | `<basename>-<suffix>.tif` output naming, Landsat prefixes |
//! | [`config`] | `reduce.toml` loading, merging over stock defaults, validation |
//! | [`types`] | Shared report and progress types |
//! | [`output`] | CLI output formatting |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Design Decisions
//!
//! ## GDAL Tools, Not Bindings
//!
//! Raster work is delegated to the GDAL command-line programs
//! (`gdal_merge.py`, `gdal_translate`, `gdalbuildvrt`, `gdalinfo`). They are
//! what imagery users already have installed, they handle every projection
//! and driver GDAL supports, and a failing stage can be rerun by hand from
//! the command line logged at `debug`. Tool names are configurable.
//!
//! ## Backend Seam
//!
//! Pipelines only ever talk to [`raster::RasterBackend`]. Tests substitute a
//! recording mock, so stage order, arguments and cleanup are checked without
//! GDAL installed.
//!
//! ## In-Process Color Correction
//!
//! Color correction is plain lookup-table math on 8-bit pixels and runs
//! in-process with the `image` crate and rayon. That drops the GeoTiff
//! tags, so the final compress of the corrected variant reassigns the
//! corners and SRS of the 8-bit raster it was made from.

pub mod color;
pub mod config;
pub mod geo;
pub mod landsat;
pub mod logging;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod raster;
pub mod types;
