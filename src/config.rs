//! Tool configuration module.
//!
//! Handles loading, validating, and merging `reduce.toml`. Configuration is
//! layered: stock defaults are overridden by a user file, either
//! `reduce.toml` in the working directory or the path given with `--config`.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [tools]
//! merge = "gdal_merge.py"
//! translate = "gdal_translate"
//! build_vrt = "gdalbuildvrt"
//! info = "gdalinfo"
//!
//! [visual]
//! bands = [1, 2, 3]         # R-G-B band order of visual products
//!
//! [analytic]
//! bands = [3, 2, 1]         # R-G-B band order of analytic (B-G-R-NIR) products
//! # input_max = 65535       # Value rescaled to 255 (omit: from the probed bit depth)
//! color_correct = true      # Also write a color-corrected variant
//!
//! [landsat]
//! bands = [4, 3, 2]         # Landsat 8 natural color
//! white_point = 3500        # 16-bit value rescaled to 255
//! black_point = 1           # Value rescaled to 1 (0 stays the fill value)
//! band_sig = "band"         # Text before the band number: "band" or "_B"
//!
//! [color]
//! percentiles = [1.0, 99.0]
//! color_percentile = 95.0
//! cut_frac = 0.75
//! gamma = 0.75
//!
//! [output]
//! compression = "lzw"       # lzw | deflate | none
//! basename_len = 12         # Characters of the first input name kept in outputs
//! keep_intermediates = false
//! nodata = 0                # Source nodata value for merges
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::raster::Compression;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up in the working directory when `--config` is absent.
pub const CONFIG_FILENAME: &str = "reduce.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `reduce.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReduceConfig {
    /// External GDAL executables.
    pub tools: ToolsConfig,
    /// Visual (already 8-bit RGB) imagery settings.
    pub visual: VisualConfig,
    /// Analytic (16-bit multispectral) imagery settings.
    pub analytic: AnalyticConfig,
    /// Landsat band-file reduction settings.
    pub landsat: LandsatConfig,
    /// Automated color correction parameters.
    pub color: ColorConfig,
    /// Output naming, compression and cleanup.
    pub output: OutputConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl ReduceConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_bands("visual.bands", &self.visual.bands)?;
        validate_bands("analytic.bands", &self.analytic.bands)?;
        validate_bands("landsat.bands", &self.landsat.bands)?;
        if self.landsat.bands.len() != 3 {
            return Err(ConfigError::Validation(
                "landsat.bands must name exactly three bands".into(),
            ));
        }
        if self.analytic.input_max == Some(0) {
            return Err(ConfigError::Validation(
                "analytic.input_max must be non-zero".into(),
            ));
        }
        if self.landsat.black_point >= self.landsat.white_point {
            return Err(ConfigError::Validation(
                "landsat.black_point must be below landsat.white_point".into(),
            ));
        }
        if self.landsat.band_sig.is_empty() {
            return Err(ConfigError::Validation(
                "landsat.band_sig must not be empty".into(),
            ));
        }
        let [low, high] = self.color.percentiles;
        if !(0.0..=100.0).contains(&low) || !(0.0..=100.0).contains(&high) || low >= high {
            return Err(ConfigError::Validation(
                "color.percentiles must be [low, high] with 0 <= low < high <= 100".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.color.color_percentile) {
            return Err(ConfigError::Validation(
                "color.color_percentile must be 0-100".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.color.cut_frac) {
            return Err(ConfigError::Validation(
                "color.cut_frac must be 0-1".into(),
            ));
        }
        if self.color.gamma <= 0.0 {
            return Err(ConfigError::Validation(
                "color.gamma must be positive".into(),
            ));
        }
        if self.output.basename_len == 0 {
            return Err(ConfigError::Validation(
                "output.basename_len must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

fn validate_bands(key: &str, bands: &[u32]) -> Result<(), ConfigError> {
    if bands.is_empty() {
        return Err(ConfigError::Validation(format!("{key} must not be empty")));
    }
    if bands.contains(&0) {
        return Err(ConfigError::Validation(format!(
            "{key} are 1-based; 0 is not a band"
        )));
    }
    Ok(())
}

/// Names (or paths) of the GDAL executables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub merge: String,
    pub translate: String,
    pub build_vrt: String,
    pub info: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            merge: "gdal_merge.py".to_string(),
            translate: "gdal_translate".to_string(),
            build_vrt: "gdalbuildvrt".to_string(),
            info: "gdalinfo".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisualConfig {
    /// 1-based band numbers in R-G-B output order.
    pub bands: Vec<u32>,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            bands: vec![1, 2, 3],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyticConfig {
    /// 1-based band numbers in R-G-B output order. Analytic tiles are B-G-R-NIR.
    pub bands: Vec<u32>,
    /// Input value mapped to 255 by the linear rescale to 8 bits.
    /// When absent, the maximum of the probed bit depth (255 or 65535).
    pub input_max: Option<u32>,
    /// Write a color-corrected variant next to the plain output.
    pub color_correct: bool,
}

impl Default for AnalyticConfig {
    fn default() -> Self {
        Self {
            bands: vec![3, 2, 1],
            input_max: None,
            color_correct: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LandsatConfig {
    /// Band numbers assembled in R-G-B order (4 3 2 for Landsat 8, 3 2 1 for Landsat 5).
    pub bands: Vec<u32>,
    /// 16-bit surface reflectance value rescaled to white.
    pub white_point: u32,
    /// Value rescaled to 1. Output 0 is reserved for fill.
    pub black_point: u32,
    /// Text immediately before the band number in file names.
    pub band_sig: String,
}

impl Default for LandsatConfig {
    fn default() -> Self {
        Self {
            bands: vec![4, 3, 2],
            white_point: 3500,
            black_point: 1,
            band_sig: "band".to_string(),
        }
    }
}

/// Color correction parameters. See [`crate::color::ColorCorrect`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorConfig {
    /// Low/high histogram reference percentiles.
    pub percentiles: [f64; 2],
    /// High reference percentile for per-channel balance.
    pub color_percentile: f64,
    /// Factor by which reference values are stepped back before cutting.
    pub cut_frac: f64,
    /// Gamma exponent (< 1 brightens).
    pub gamma: f64,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            percentiles: [1.0, 99.0],
            color_percentile: 95.0,
            cut_frac: 0.75,
            gamma: 0.75,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub compression: Compression,
    /// Characters of the first input's file stem used as output basename.
    pub basename_len: usize,
    /// Leave intermediate rasters on disk instead of deleting them.
    pub keep_intermediates: bool,
    /// Source nodata value passed to merge and VRT steps.
    pub nodata: Option<i32>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Lzw,
            basename_len: 12,
            keep_intermediates: false,
            nodata: Some(0),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(ReduceConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock defaults do not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<ReduceConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ReduceConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `reduce.toml` from a directory, falling back to stock defaults when absent.
pub fn load_config(dir: &Path) -> Result<ReduceConfig, ConfigError> {
    let path = dir.join(CONFIG_FILENAME);
    if !path.exists() {
        return resolve_config(None);
    }
    load_config_file(&path)
}

/// Load an explicit config file. A missing file is an error.
pub fn load_config_file(path: &Path) -> Result<ReduceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    resolve_config(Some(value))
}

/// Returns a fully-commented stock `reduce.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# tile-reduce configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# External GDAL tools (names on PATH or absolute paths)
# ---------------------------------------------------------------------------
[tools]
merge = "gdal_merge.py"
translate = "gdal_translate"
build_vrt = "gdalbuildvrt"
info = "gdalinfo"

# ---------------------------------------------------------------------------
# Visual imagery: already 8-bit R-G-B(-alpha)
# ---------------------------------------------------------------------------
[visual]
bands = [1, 2, 3]

# ---------------------------------------------------------------------------
# Analytic imagery: 16-bit B-G-R-NIR
# ---------------------------------------------------------------------------
[analytic]
bands = [3, 2, 1]
# Input value mapped to 255 by the linear rescale to 8 bits.
# Omit to use the maximum of the tiles' bit depth (255 for Byte,
# 65535 for UInt16). Other bit depths are rejected unless this is set.
# input_max = 65535
# Also write a color-corrected <name>-cc.tif variant.
color_correct = true

# ---------------------------------------------------------------------------
# Landsat surface reflectance band files (*band?.tif)
# ---------------------------------------------------------------------------
[landsat]
# R-G-B band numbers: 4 3 2 for Landsat 8, 3 2 1 for Landsat 5.
bands = [4, 3, 2]
# 16-bit value rescaled to white.
white_point = 3500
# Value rescaled to 1; output 0 stays the fill value.
black_point = 1
# Text before the band number: "band" for *_sr_band4.tif,
# "_B" for Collection 2 *_SR_B4.TIF. The .tif extension matches any case.
band_sig = "band"

# ---------------------------------------------------------------------------
# Automated color correction
# ---------------------------------------------------------------------------
[color]
# Histogram reference percentiles for black and white points.
percentiles = [1.0, 99.0]
# Reference percentile for per-channel color balance.
color_percentile = 95.0
# Reference values are stepped back by this factor before cutting,
# which avoids clipping scenes with no true blacks or whites.
cut_frac = 0.75
# Gamma exponent (< 1 brightens, > 1 darkens).
gamma = 0.75

# ---------------------------------------------------------------------------
# Outputs
# ---------------------------------------------------------------------------
[output]
# lzw | deflate | none
compression = "lzw"
# Characters of the first input's name used as the output basename.
basename_len = 12
keep_intermediates = false
# Source nodata value for merges and virtual mosaics.
nodata = 0

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers (Landsat scenes, color correction).
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
