//! End-to-end runs against a backend that writes real files.
//!
//! `FileBackend` stands in for GDAL: every operation refuses to run unless
//! its sources exist, then writes its output. That makes stage ordering and
//! intermediate cleanup observable on disk without GDAL installed.

use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;
use tile_reduce::config::ReduceConfig;
use tile_reduce::landsat::{self, LandsatRequest};
use tile_reduce::pipeline::{self, PipelineError, ReduceRequest};
use tile_reduce::raster::{
    BackendError, ColorCorrectParams, DataType, GdalBackend, MergeParams, RasterBackend,
    RasterInfo, TranslateParams, VrtParams,
};
use tile_reduce::types::{Imagery, SceneStatus};

#[derive(Default)]
struct FileBackend {
    /// Fail the translate whose output name ends with this suffix.
    fail_output_suffix: Option<&'static str>,
    written: Mutex<Vec<PathBuf>>,
}

impl FileBackend {
    fn failing_on(suffix: &'static str) -> Self {
        Self {
            fail_output_suffix: Some(suffix),
            ..Self::default()
        }
    }

    fn require(&self, path: &Path) -> Result<(), BackendError> {
        if path.exists() {
            Ok(())
        } else {
            Err(BackendError::ProcessingFailed(format!(
                "missing source {}",
                path.display()
            )))
        }
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), BackendError> {
        fs::write(path, contents)?;
        self.written.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

impl RasterBackend for FileBackend {
    fn probe(&self, path: &Path) -> Result<RasterInfo, BackendError> {
        self.require(path)?;
        Ok(RasterInfo {
            width: 64,
            height: 64,
            bands: vec![DataType::UInt16; 4],
            geo_transform: Some([0.0, 1.0, 0.0, 64.0, 0.0, -1.0]),
            srs: Some("EPSG:3857".to_string()),
        })
    }

    fn merge(&self, params: &MergeParams) -> Result<(), BackendError> {
        for input in &params.inputs {
            self.require(input)?;
        }
        self.write(&params.output, &format!("merged {}", params.inputs.len()))
    }

    fn translate(&self, params: &TranslateParams) -> Result<(), BackendError> {
        self.require(&params.source)?;
        if let Some(reference) = &params.georef_from {
            self.require(reference)?;
        }
        let name = params.output.to_string_lossy();
        if let Some(suffix) = self.fail_output_suffix {
            if name.ends_with(suffix) {
                return Err(BackendError::ToolFailed {
                    tool: "gdal_translate".into(),
                    status: "exit status: 1".into(),
                    stderr: "ERROR 1: simulated".into(),
                });
            }
        }
        self.write(&params.output, "translated")
    }

    fn build_vrt(&self, params: &VrtParams) -> Result<(), BackendError> {
        for input in &params.inputs {
            self.require(input)?;
        }
        self.write(&params.output, "<VRTDataset/>")
    }

    fn color_correct(&self, params: &ColorCorrectParams) -> Result<(), BackendError> {
        self.require(&params.source)?;
        self.write(&params.output, "corrected")
    }
}

fn tiles(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|n| {
            let p = dir.join(n);
            fs::write(&p, b"tile").unwrap();
            p
        })
        .collect()
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

const TILES: &[&str] = &[
    "20170601_181140_0e0e_3B_Visual.tif",
    "20170601_181141_0e0e_3B_Visual.tif",
];

#[test]
fn visual_run_leaves_only_inputs_and_product() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let inputs = tiles(src.path(), TILES);

    let report = pipeline::reduce_with_backend(
        &FileBackend::default(),
        &ReduceRequest {
            imagery: Imagery::Visual,
            inputs: inputs.clone(),
            output_dir: out.path().to_path_buf(),
            bounds: None,
        },
        &ReduceConfig::default(),
        None,
    )
    .unwrap();

    assert_eq!(file_names(out.path()), ["20170601_181-visual.tif"]);
    assert!(inputs.iter().all(|p| p.exists()));
    assert_eq!(report.removed().count(), 2);
}

#[test]
fn analytic_run_produces_plain_and_corrected() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let inputs = tiles(src.path(), TILES);
    let backend = FileBackend::default();

    let report = pipeline::reduce_with_backend(
        &backend,
        &ReduceRequest {
            imagery: Imagery::Analytic,
            inputs,
            output_dir: out.path().to_path_buf(),
            bounds: None,
        },
        &ReduceConfig::default(),
        None,
    )
    .unwrap();

    assert_eq!(
        file_names(out.path()),
        ["20170601_181-analytic.tif", "20170601_181-cc.tif"]
    );
    assert_eq!(report.outputs.len(), 2);
    // merged, rgb, 8bit, cc-raw, analytic, cc; the last one needed 8bit
    // on disk as its georeferencing source
    assert_eq!(backend.written.lock().unwrap().len(), 6);
}

#[test]
fn keep_intermediates_leaves_every_stage_file() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let inputs = tiles(src.path(), TILES);
    let mut config = ReduceConfig::default();
    config.output.keep_intermediates = true;

    pipeline::reduce_with_backend(
        &FileBackend::default(),
        &ReduceRequest {
            imagery: Imagery::Analytic,
            inputs,
            output_dir: out.path().to_path_buf(),
            bounds: None,
        },
        &config,
        None,
    )
    .unwrap();

    assert_eq!(
        file_names(out.path()),
        [
            "20170601_181-8bit.tif",
            "20170601_181-analytic.tif",
            "20170601_181-cc-raw.tif",
            "20170601_181-cc.tif",
            "20170601_181-merged.tif",
            "20170601_181-rgb.tif",
        ]
    );
}

#[test]
fn failed_stage_keeps_completed_outputs() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let inputs = tiles(src.path(), TILES);

    let result = pipeline::reduce_with_backend(
        &FileBackend::failing_on("-8bit.tif"),
        &ReduceRequest {
            imagery: Imagery::Analytic,
            inputs,
            output_dir: out.path().to_path_buf(),
            bounds: None,
        },
        &ReduceConfig::default(),
        None,
    );

    let err = result.unwrap_err();
    assert!(matches!(
        &err,
        PipelineError::Raster(BackendError::ToolFailed { tool, .. }) if tool == "gdal_translate"
    ));
    assert!(err.to_string().contains("simulated"));
    // Merge output was consumed by reband; the rebanded file is left behind
    assert_eq!(file_names(out.path()), ["20170601_181-rgb.tif"]);
}

#[test]
fn landsat_scenes_end_as_one_tiff_each() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    for prefix in ["LC08_042034_sr_", "LT05_042034_sr_"] {
        for band in 1..=4 {
            fs::write(dir.path().join(format!("{prefix}band{band}.tif")), b"b").unwrap();
        }
    }

    let results = landsat::reduce_scenes_with_backend(
        &FileBackend::default(),
        &LandsatRequest {
            bands: vec![3, 2, 1],
            ..LandsatRequest::from_config(
                dir.path().to_path_buf(),
                out.clone(),
                &ReduceConfig::default(),
            )
        },
        &ReduceConfig::default(),
        None,
    )
    .unwrap();

    assert_eq!(results.len(), 2);
    assert!(
        results
            .iter()
            .all(|r| matches!(r.status, SceneStatus::Written { .. }))
    );
    assert_eq!(
        file_names(&out),
        ["LC08_042034_sr.tif", "LT05_042034_sr.tif"]
    );
}

#[test]
fn standalone_color_correction_writes_image() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("scene-8bit.png");
    RgbImage::from_fn(40, 40, |x, y| {
        let v = (50 + x + y) as u8;
        Rgb([v, v.saturating_add(20), v / 2 + 30])
    })
    .save(&source)
    .unwrap();
    let output = tile_reduce::naming::color_corrected_path(&source);

    pipeline::color_correct_file(
        &GdalBackend::default(),
        &source,
        &output,
        &ReduceConfig::default(),
        true,
    )
    .unwrap();

    assert_eq!(output.file_name().unwrap(), "scene-cc.png");
    let corrected = image::open(&output).unwrap().to_rgb8();
    assert_eq!(corrected.dimensions(), (40, 40));
    let original = image::open(&source).unwrap().to_rgb8();
    assert_ne!(corrected.as_raw(), original.as_raw());
}
