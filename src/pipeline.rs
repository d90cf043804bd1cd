//! Visual and analytic tile reduction.
//!
//! Turns a set of overlapping tiles into one compressed 3-band GeoTiff by
//! running a fixed sequence of raster operations. Each stage blocks until it
//! finishes and consumes the previous stage's output.
//!
//! ## Stages
//!
//! ```text
//! visual:    merge → reband 1 2 3 → compress
//! analytic:  merge → reband 3 2 1 → rescale to 8 bit → color-correct → compress (×2)
//! ```
//!
//! ## Output Structure
//!
//! ```text
//! <output-dir>/
//! ├── 20170601_181-merged.tif    # deleted after reband
//! ├── 20170601_181-rgb.tif       # deleted after rescale / compress
//! ├── 20170601_181-8bit.tif      # deleted after the last compress (analytic)
//! ├── 20170601_181-cc-raw.tif    # deleted after compress (analytic)
//! ├── 20170601_181-analytic.tif  # final (or -visual.tif)
//! └── 20170601_181-cc.tif        # final color-corrected variant (analytic)
//! ```
//!
//! Planning ([`plan`]) is pure: it computes every path and parameter from
//! the request, the config and the probed first input without touching the
//! filesystem, so stage order can be tested without GDAL.
//!
//! The analytic rescale maps `[0, max]` onto `[0, 255]`. `max` is
//! `analytic.input_max` when set, otherwise the largest value of the input
//! bit depth (255 for 8-bit, 65535 for 16-bit tiles). Other bit depths need
//! an explicit `input_max`.
//!
//! Color correction decodes and re-encodes pixels, which drops the GeoTiff
//! tags. The final compress of the corrected variant therefore copies the
//! geotransform and SRS back from the 8-bit raster, so that file is only
//! deleted after both compress steps.
//! Execution ([`reduce_with_backend`]) validates the inputs, runs each step
//! through a [`RasterBackend`], and deletes intermediates as soon as the
//! step that consumes them succeeds. If a step fails, the run stops and
//! the files written so far stay on disk.

use crate::color::ColorCorrect;
use crate::config::ReduceConfig;
use crate::geo::Bounds;
use crate::naming;
use crate::raster::{
    BackendError, ColorCorrectParams, DataType, GdalBackend, MergeParams, RasterBackend,
    RasterInfo, ScaleRange, TranslateParams,
};
use crate::types::{Imagery, ProgressEvent, ReduceReport, Stage, StageRecord};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Raster operation failed: {0}")]
    Raster(#[from] BackendError),
    #[error("No input tiles given")]
    NoInputs,
    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),
    #[error("Cannot derive an output name from {0}")]
    NoBasename(PathBuf),
    #[error("Band {band} requested but {path} has {count} bands")]
    BandOutOfRange {
        band: u32,
        count: usize,
        path: PathBuf,
    },
    #[error("Input data types must all match: {0}")]
    MixedDataTypes(String),
    #[error("Cannot rescale {0} input to 8 bits; set analytic.input_max")]
    UnsupportedBitDepth(String),
}

/// What to reduce and where to write it.
#[derive(Debug, Clone)]
pub struct ReduceRequest {
    pub imagery: Imagery,
    pub inputs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    /// Optional crop, applied while selecting bands.
    pub bounds: Option<Bounds>,
}

/// A single raster operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Merge(MergeParams),
    Translate(TranslateParams),
    ColorCorrect(ColorCorrectParams),
}

/// One planned stage: the operation and the intermediates it frees.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub stage: Stage,
    pub operation: Operation,
    /// Deleted once `operation` succeeds.
    pub removes: Vec<PathBuf>,
}

impl Step {
    pub fn output(&self) -> &Path {
        match &self.operation {
            Operation::Merge(p) => &p.output,
            Operation::Translate(p) => &p.output,
            Operation::ColorCorrect(p) => &p.output,
        }
    }
}

/// The full ordered list of steps for one reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub basename: String,
    pub steps: Vec<Step>,
    /// Final artifacts, plain product first.
    pub outputs: Vec<PathBuf>,
}

fn bands_for(imagery: Imagery, config: &ReduceConfig) -> &[u32] {
    match imagery {
        Imagery::Visual => &config.visual.bands,
        Imagery::Analytic => &config.analytic.bands,
    }
}

/// Input value mapped to 255 by the analytic rescale.
fn rescale_max(config: &ReduceConfig, input: &RasterInfo) -> Result<u32, PipelineError> {
    if let Some(max) = config.analytic.input_max {
        return Ok(max);
    }
    match input.data_type().and_then(DataType::bits) {
        Some(8) => Ok(u32::from(u8::MAX)),
        Some(16) => Ok(u32::from(u16::MAX)),
        _ => Err(PipelineError::UnsupportedBitDepth(
            input
                .data_type()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "band-less".to_string()),
        )),
    }
}

/// Compute every step of a reduction without running anything.
///
/// `input` is the probed first tile; it decides the analytic rescale range.
pub fn plan(
    request: &ReduceRequest,
    config: &ReduceConfig,
    input: &RasterInfo,
) -> Result<Plan, PipelineError> {
    let first = request.inputs.first().ok_or(PipelineError::NoInputs)?;
    let basename = naming::output_basename(first, config.output.basename_len)
        .ok_or_else(|| PipelineError::NoBasename(first.clone()))?;
    let dir = &request.output_dir;
    let path = |suffix: &str| naming::stage_path(dir, &basename, suffix);
    let keep = config.output.keep_intermediates;
    let frees = |paths: &[&PathBuf]| -> Vec<PathBuf> {
        if keep {
            Vec::new()
        } else {
            paths.iter().map(|p| (*p).clone()).collect()
        }
    };

    let bands = bands_for(request.imagery, config).to_vec();
    let rgb = bands.len() == 3;
    let merged = path(naming::MERGED);
    let rebanded = path(naming::RGB);
    let mut steps = vec![
        Step {
            stage: Stage::Merge,
            operation: Operation::Merge(MergeParams {
                inputs: request.inputs.clone(),
                output: merged.clone(),
                nodata: config.output.nodata,
            }),
            removes: Vec::new(),
        },
        Step {
            stage: Stage::Reband,
            operation: Operation::Translate(TranslateParams {
                bands,
                rgb,
                projwin: request.bounds,
                ..TranslateParams::copy(merged.clone(), rebanded.clone())
            }),
            removes: frees(&[&merged]),
        },
    ];

    let compress = |source: &PathBuf, output: PathBuf| Step {
        stage: Stage::Compress,
        operation: Operation::Translate(TranslateParams {
            rgb,
            compression: config.output.compression,
            ..TranslateParams::copy(source.clone(), output)
        }),
        removes: frees(&[source]),
    };

    let outputs = match request.imagery {
        Imagery::Visual => {
            let output = path(naming::VISUAL);
            steps.push(compress(&rebanded, output.clone()));
            vec![output]
        }
        Imagery::Analytic => {
            let max = rescale_max(config, input)?;
            let eight_bit = path(naming::EIGHT_BIT);
            steps.push(Step {
                stage: Stage::Rescale,
                operation: Operation::Translate(TranslateParams {
                    output_type: Some(DataType::Byte),
                    scale: Some(ScaleRange::to_byte(max)),
                    rgb,
                    ..TranslateParams::copy(rebanded.clone(), eight_bit.clone())
                }),
                removes: frees(&[&rebanded]),
            });

            let color_correct = config.analytic.color_correct && rgb;
            if config.analytic.color_correct && !rgb {
                warn!("color correction needs exactly three bands; skipping it");
            }
            let cc_raw = path(naming::CC_RAW);
            if color_correct {
                steps.push(Step {
                    stage: Stage::ColorCorrect,
                    operation: Operation::ColorCorrect(ColorCorrectParams {
                        source: eight_bit.clone(),
                        output: cc_raw.clone(),
                        correction: ColorCorrect::from(&config.color),
                        balance: true,
                    }),
                    removes: Vec::new(),
                });
            }

            let analytic = path(naming::ANALYTIC);
            let mut compress_analytic = compress(&eight_bit, analytic.clone());
            if color_correct {
                // Still needed as the georeferencing source below
                compress_analytic.removes.clear();
            }
            steps.push(compress_analytic);
            let mut outputs = vec![analytic];
            if color_correct {
                let corrected = path(naming::COLOR_CORRECTED);
                let mut compress_corrected = compress(&cc_raw, corrected.clone());
                if let Operation::Translate(params) = &mut compress_corrected.operation {
                    params.georef_from = Some(eight_bit.clone());
                }
                compress_corrected.removes = frees(&[&cc_raw, &eight_bit]);
                steps.push(compress_corrected);
                outputs.push(corrected);
            }
            outputs
        }
    };

    Ok(Plan {
        basename,
        steps,
        outputs,
    })
}

/// Check inputs exist, bands are in range, and (analytic) types agree.
///
/// Returns the probe of the first input.
fn validate(
    backend: &impl RasterBackend,
    request: &ReduceRequest,
    config: &ReduceConfig,
) -> Result<RasterInfo, PipelineError> {
    let first = request.inputs.first().ok_or(PipelineError::NoInputs)?;
    if let Some(missing) = request.inputs.iter().find(|p| !p.exists()) {
        return Err(PipelineError::InputNotFound(missing.clone()));
    }

    let info = backend.probe(first)?;
    let count = info.band_count();
    if let Some(&band) = bands_for(request.imagery, config)
        .iter()
        .find(|&&b| b as usize > count)
    {
        return Err(PipelineError::BandOutOfRange {
            band,
            count,
            path: first.clone(),
        });
    }

    if request.imagery == Imagery::Analytic {
        let mut types = vec![(first.clone(), info.data_type().cloned())];
        for input in &request.inputs[1..] {
            types.push((input.clone(), backend.probe(input)?.data_type().cloned()));
        }
        if types.iter().any(|(_, t)| *t != types[0].1) {
            let listing = types
                .iter()
                .map(|(p, t)| {
                    let name = t.as_ref().map(|t| t.to_string());
                    format!("{}: {}", p.display(), name.as_deref().unwrap_or("no bands"))
                })
                .collect::<Vec<_>>()
                .join(", ");
            return Err(PipelineError::MixedDataTypes(listing));
        }
    }
    Ok(info)
}

fn execute(backend: &impl RasterBackend, operation: &Operation) -> Result<(), BackendError> {
    match operation {
        Operation::Merge(params) => backend.merge(params),
        Operation::Translate(params) => backend.translate(params),
        Operation::ColorCorrect(params) => backend.color_correct(params),
    }
}

/// Delete an intermediate. A file that was never written is not an error.
pub(crate) fn remove_intermediate(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("intermediate {} already gone", path.display());
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn send(events: Option<&Sender<ProgressEvent>>, event: ProgressEvent) {
    if let Some(tx) = events {
        // The printer may have hung up; progress is best-effort.
        tx.send(event).ok();
    }
}

/// Reduce tiles with the GDAL tools named in `config.tools`.
pub fn reduce(
    request: &ReduceRequest,
    config: &ReduceConfig,
    events: Option<&Sender<ProgressEvent>>,
) -> Result<ReduceReport, PipelineError> {
    let backend = GdalBackend::new(config.tools.clone());
    reduce_with_backend(&backend, request, config, events)
}

/// Reduce tiles using a specific backend (allows testing with mock).
pub fn reduce_with_backend(
    backend: &impl RasterBackend,
    request: &ReduceRequest,
    config: &ReduceConfig,
    events: Option<&Sender<ProgressEvent>>,
) -> Result<ReduceReport, PipelineError> {
    let first = validate(backend, request, config)?;
    let plan = plan(request, config, &first)?;
    send(
        events,
        ProgressEvent::Validated {
            imagery: request.imagery,
            inputs: request.inputs.len(),
            basename: plan.basename.clone(),
        },
    );
    std::fs::create_dir_all(&request.output_dir)?;

    let total = plan.steps.len();
    let mut stages = Vec::with_capacity(total);
    for (i, step) in plan.steps.iter().enumerate() {
        send(
            events,
            ProgressEvent::StageStarted {
                index: i + 1,
                total,
                stage: step.stage,
                output: step.output().to_path_buf(),
            },
        );
        info!("{} → {}", step.stage, step.output().display());
        execute(backend, &step.operation)?;
        for path in &step.removes {
            remove_intermediate(path)?;
        }
        let record = StageRecord {
            stage: step.stage,
            output: step.output().to_path_buf(),
            removed: step.removes.clone(),
        };
        send(events, ProgressEvent::StageFinished(record.clone()));
        stages.push(record);
    }

    Ok(ReduceReport {
        imagery: request.imagery,
        basename: plan.basename,
        inputs: request.inputs.clone(),
        stages,
        outputs: plan.outputs,
    })
}

/// Color-correct a single image outside any pipeline.
pub fn color_correct_file(
    backend: &impl RasterBackend,
    source: &Path,
    output: &Path,
    config: &ReduceConfig,
    balance: bool,
) -> Result<(), PipelineError> {
    if !source.exists() {
        return Err(PipelineError::InputNotFound(source.to_path_buf()));
    }
    backend.color_correct(&ColorCorrectParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        correction: ColorCorrect::from(&config.color),
        balance,
    })?;
    Ok(())
}
