//! Landsat surface-reflectance scenes to RGB GeoTiffs.
//!
//! Scenes arrive as one GeoTiff per band, named `<prefix><sig><N>.tif`,
//! where the band signature `sig` is `band` by default (`_B` for Collection
//! 2 products) and the extension matches in any case. A directory may hold
//! several scenes; they are told apart by prefix:
//!
//! ```text
//! image_dir/
//! ├── LC08_L1TP_042034_20170616_sr_band2.tif
//! ├── LC08_L1TP_042034_20170616_sr_band3.tif
//! ├── LC08_L1TP_042034_20170616_sr_band4.tif
//! ├── LC08_L1TP_042035_20170616_sr_band3.tif   # incomplete: skipped
//! └── ...
//! ```
//!
//! For each complete scene the three requested bands are stacked into a
//! virtual raster (`gdalbuildvrt -separate`), then translated to an 8-bit,
//! compressed GeoTiff with a linear rescale that maps `black_point` to 1
//! and `white_point` to 255, leaving 0 for fill. The VRT is deleted
//! afterwards. Landsat 8 uses bands 4 3 2 for R G B,
//! Landsat 5 uses 3 2 1.
//!
//! Scenes are independent, so they run in parallel on the rayon pool. One
//! scene failing does not stop the others. Output names drop trailing
//! separators from the prefix; when two prefixes reduce to the same name,
//! the first in sorted order wins and the other is skipped.

use crate::config::ReduceConfig;
use crate::geo::Bounds;
use crate::naming;
use crate::pipeline::remove_intermediate;
use crate::raster::{
    BackendError, DataType, GdalBackend, RasterBackend, ScaleRange, TranslateParams, VrtParams,
};
use crate::types::{ProgressEvent, SceneStatus};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum LandsatError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot read directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("No Landsat band files in {0}")]
    NoBandFiles(PathBuf),
    #[error("Expected three bands (R G B), got {0}")]
    BandCount(usize),
    #[error("Black point {black} must be below white point {white}")]
    Levels { black: u32, white: u32 },
}

/// Which scenes to build and how.
#[derive(Debug, Clone)]
pub struct LandsatRequest {
    /// Directory holding the band files.
    pub dir: PathBuf,
    pub output_dir: PathBuf,
    /// Band numbers in R G B order.
    pub bands: Vec<u32>,
    /// Input value mapped to full brightness.
    pub white_point: u32,
    /// Input value mapped to 1, the darkest non-fill output.
    pub black_point: u32,
    /// Text before the band number in file names.
    pub band_sig: String,
    pub bounds: Option<Bounds>,
}

impl LandsatRequest {
    /// A request with the `[landsat]` defaults from `config`.
    pub fn from_config(dir: PathBuf, output_dir: PathBuf, config: &ReduceConfig) -> Self {
        Self {
            dir,
            output_dir,
            bands: config.landsat.bands.clone(),
            white_point: config.landsat.white_point,
            black_point: config.landsat.black_point,
            band_sig: config.landsat.band_sig.clone(),
            bounds: None,
        }
    }
}

/// The two operations for one scene.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenePlan {
    pub prefix: String,
    pub vrt: VrtParams,
    pub translate: TranslateParams,
}

/// Requested bands with no file for a scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingBands(pub Vec<u32>);

impl fmt::Display for MissingBands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bands: Vec<String> = self.0.iter().map(|b| b.to_string()).collect();
        write!(f, "incomplete R-G-B set, missing band {}", bands.join(", "))
    }
}

/// Outcome for one scene prefix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneResult {
    pub prefix: String,
    #[serde(flatten)]
    pub status: SceneStatus,
}

/// Band files directly inside `dir`, sorted by name.
pub fn discover(dir: &Path, sig: &str) -> Result<Vec<PathBuf>, LandsatError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| naming::is_landsat_band_file(name, sig));
        if matches {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Group band files by scene prefix. Paths that are not band files are dropped.
pub fn partition(files: &[PathBuf], sig: &str) -> BTreeMap<String, Vec<PathBuf>> {
    let mut scenes: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for file in files {
        let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some((prefix, _)) = naming::landsat_parts(name, sig) {
            scenes.entry(prefix.to_string()).or_default().push(file.clone());
        }
    }
    scenes
}

/// Plan the VRT and translate for one scene, picking the requested bands
/// from `files` in R G B order.
pub fn plan_scene(
    prefix: &str,
    files: &[PathBuf],
    request: &LandsatRequest,
    config: &ReduceConfig,
) -> Result<ScenePlan, MissingBands> {
    let mut selected = Vec::with_capacity(request.bands.len());
    let mut missing = Vec::new();
    for &band in &request.bands {
        let wanted = band.to_string();
        let found = files.iter().find(|f| {
            f.file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| naming::landsat_parts(n, &request.band_sig))
                .is_some_and(|(p, b)| p == prefix && b == wanted)
        });
        match found {
            Some(file) => selected.push(file.clone()),
            None => missing.push(band),
        }
    }
    if !missing.is_empty() {
        return Err(MissingBands(missing));
    }

    let name = naming::scene_name(prefix);
    let vrt = request.output_dir.join(format!("{name}.vrt"));
    let output = request.output_dir.join(format!("{name}.tif"));
    Ok(ScenePlan {
        prefix: prefix.to_string(),
        vrt: VrtParams {
            inputs: selected,
            output: vrt.clone(),
            separate: true,
            nodata: config.output.nodata,
        },
        translate: TranslateParams {
            output_type: Some(DataType::Byte),
            scale: Some(ScaleRange {
                src_min: request.black_point,
                src_max: request.white_point,
                dst_min: 1,
                dst_max: 255,
            }),
            rgb: true,
            projwin: request.bounds,
            compression: config.output.compression,
            ..TranslateParams::copy(vrt, output)
        },
    })
}

fn run_scene(
    backend: &impl RasterBackend,
    plan: &ScenePlan,
    keep_intermediates: bool,
) -> Result<PathBuf, BackendError> {
    backend.build_vrt(&plan.vrt)?;
    backend.translate(&plan.translate)?;
    if !keep_intermediates {
        remove_intermediate(&plan.vrt.output)?;
    }
    Ok(plan.translate.output.clone())
}

/// Prefixes whose output name was already claimed by an earlier prefix,
/// mapped to that earlier prefix.
fn name_collisions<'a>(prefixes: impl Iterator<Item = &'a str>) -> HashMap<&'a str, &'a str> {
    let mut claimed: HashMap<&str, &str> = HashMap::new();
    let mut collisions = HashMap::new();
    for prefix in prefixes {
        let name = naming::scene_name(prefix);
        match claimed.get(name) {
            Some(&first) => {
                collisions.insert(prefix, first);
            }
            None => {
                claimed.insert(name, prefix);
            }
        }
    }
    collisions
}

fn scene_status(
    backend: &impl RasterBackend,
    prefix: &str,
    files: &[PathBuf],
    request: &LandsatRequest,
    config: &ReduceConfig,
    keep_intermediates: bool,
) -> SceneStatus {
    match plan_scene(prefix, files, request, config) {
        Err(missing) => {
            warn!("scene {prefix}: {missing}");
            SceneStatus::Skipped {
                reason: missing.to_string(),
            }
        }
        Ok(plan) => match run_scene(backend, &plan, keep_intermediates) {
            Ok(output) => {
                info!("scene {prefix} → {}", output.display());
                SceneStatus::Written { output }
            }
            Err(e) => {
                warn!("scene {prefix} failed: {e}");
                SceneStatus::Failed {
                    error: e.to_string(),
                }
            }
        },
    }
}

/// Reduce every scene in `request.dir` with the configured GDAL tools.
pub fn reduce_scenes(
    request: &LandsatRequest,
    config: &ReduceConfig,
    events: Option<&Sender<ProgressEvent>>,
) -> Result<Vec<SceneResult>, LandsatError> {
    let backend = GdalBackend::new(config.tools.clone());
    reduce_scenes_with_backend(&backend, request, config, events)
}

/// Reduce every scene using a specific backend (allows testing with mock).
///
/// Returns one result per scene prefix, in prefix order. Only discovery
/// problems are errors; a scene that is incomplete or whose tools fail is
/// reported in its [`SceneResult`].
pub fn reduce_scenes_with_backend(
    backend: &impl RasterBackend,
    request: &LandsatRequest,
    config: &ReduceConfig,
    events: Option<&Sender<ProgressEvent>>,
) -> Result<Vec<SceneResult>, LandsatError> {
    if request.bands.len() != 3 {
        return Err(LandsatError::BandCount(request.bands.len()));
    }
    if request.black_point >= request.white_point {
        return Err(LandsatError::Levels {
            black: request.black_point,
            white: request.white_point,
        });
    }
    let files = discover(&request.dir, &request.band_sig)?;
    if files.is_empty() {
        return Err(LandsatError::NoBandFiles(request.dir.clone()));
    }
    std::fs::create_dir_all(&request.output_dir)?;

    let scenes: Vec<(String, Vec<PathBuf>)> =
        partition(&files, &request.band_sig).into_iter().collect();
    let collisions = name_collisions(scenes.iter().map(|(prefix, _)| prefix.as_str()));
    let keep = config.output.keep_intermediates;
    // Sender is Send but not Sync; each worker gets its own clone.
    let events = events.cloned();

    let results = scenes
        .par_iter()
        .map_with(events, |events, (prefix, files)| {
            let status = match collisions.get(prefix.as_str()) {
                Some(first) => {
                    warn!("scene {prefix}: output name already used by {first}");
                    SceneStatus::Skipped {
                        reason: format!("output name collides with scene {first}"),
                    }
                }
                None => scene_status(backend, prefix, files, request, config, keep),
            };
            if let Some(tx) = events {
                tx.send(ProgressEvent::Scene {
                    prefix: prefix.clone(),
                    status: status.clone(),
                })
                .ok();
            }
            SceneResult {
                prefix: prefix.clone(),
                status,
            }
        })
        .collect();
    Ok(results)
}
