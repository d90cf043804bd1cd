//! Output filename conventions.
//!
//! Every pipeline output is named `<basename>-<suffix>.tif`, where the
//! basename is the first 12 characters (by default) of the first input's
//! file stem:
//!
//! ```text
//! 20170601_181140_0e0e_3B_AnalyticMS.tif  →  20170601_181-merged.tif
//!                                            20170601_181-analytic.tif
//!                                            20170601_181-cc.tif
//! ```
//!
//! Landsat band files share a scene prefix before a band signature and a
//! single band character. The signature is `band` for Collection 1 surface
//! reflectance and `_B` for Collection 2:
//!
//! ```text
//! LC08_L1TP_042034_20170616_sr_band4.tif        →  prefix "LC08_L1TP_042034_20170616_sr_"
//! LC09_L2SP_042034_20220616_02_T1_SR_B4.TIF     →  prefix "LC09_L2SP_042034_20220616_02_T1_SR"  (sig "_B")
//! ```

use std::path::{Path, PathBuf};

/// Intermediate: mosaic of all input tiles.
pub const MERGED: &str = "merged";
/// Intermediate: three selected bands.
pub const RGB: &str = "rgb";
/// Intermediate: rescaled to 8 bits.
pub const EIGHT_BIT: &str = "8bit";
/// Intermediate: color-corrected, not yet compressed.
pub const CC_RAW: &str = "cc-raw";
/// Final visual product.
pub const VISUAL: &str = "visual";
/// Final analytic product.
pub const ANALYTIC: &str = "analytic";
/// Final color-corrected product.
pub const COLOR_CORRECTED: &str = "cc";

/// Derive the output basename from the first input path.
///
/// Takes the first `len` characters of the file stem. Returns `None` when
/// the path has no file name (e.g. `/` or `..`).
pub fn output_basename(first_input: &Path, len: usize) -> Option<String> {
    let stem = first_input.file_stem()?.to_string_lossy();
    if stem.is_empty() {
        return None;
    }
    Some(stem.chars().take(len).collect())
}

/// `<dir>/<basename>-<suffix>.tif`
pub fn stage_path(dir: &Path, basename: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{basename}-{suffix}.tif"))
}

/// Output path for standalone color correction: the part of the stem before
/// the first dash, plus `-cc`, keeping the extension and directory.
///
/// `scene-8bit.tif` → `scene-cc.tif`; `photo.png` → `photo-cc.png`.
pub fn color_corrected_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let prefix = stem.split('-').next().unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{prefix}-{}.{}", COLOR_CORRECTED, ext.to_string_lossy()),
        None => format!("{prefix}-{}", COLOR_CORRECTED),
    };
    input.with_file_name(name)
}

/// Split a Landsat band file name (`<prefix><sig><N>.tif`) into its scene
/// prefix and band character. The extension matches in any case; `sig`
/// matches exactly.
pub fn landsat_parts<'a>(filename: &'a str, sig: &str) -> Option<(&'a str, &'a str)> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if !ext.eq_ignore_ascii_case("tif") || sig.is_empty() {
        return None;
    }
    let (last, _) = stem.char_indices().next_back()?;
    let (head, band) = stem.split_at(last);
    Some((head.strip_suffix(sig)?, band))
}

/// Whether a filename looks like a Landsat band file (`*<sig>?.tif`).
pub fn is_landsat_band_file(filename: &str, sig: &str) -> bool {
    landsat_parts(filename, sig).is_some()
}

/// Output stem for a Landsat scene: the prefix without trailing separators.
pub fn scene_name(prefix: &str) -> &str {
    let trimmed = prefix.trim_end_matches(['_', '-', '.']);
    if trimmed.is_empty() { "scene" } else { trimmed }
}
