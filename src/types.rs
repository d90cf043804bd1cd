//! Shared types used by the pipelines and the CLI output.
//!
//! Reports are serialized to JSON with `--report`, so field names are part
//! of the tool's output format.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Imagery product type. Selects band order, rescale and color correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Imagery {
    /// 8-bit R-G-B(-alpha) tiles.
    Visual,
    /// 16-bit B-G-R-NIR tiles.
    Analytic,
}

impl fmt::Display for Imagery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Imagery::Visual => f.write_str("visual"),
            Imagery::Analytic => f.write_str("analytic"),
        }
    }
}

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Merge,
    Reband,
    Rescale,
    ColorCorrect,
    Compress,
    BuildVrt,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Merge => "merge",
            Stage::Reband => "reband",
            Stage::Rescale => "rescale",
            Stage::ColorCorrect => "color-correct",
            Stage::Compress => "compress",
            Stage::BuildVrt => "build-vrt",
        };
        f.write_str(name)
    }
}

/// One completed stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub output: PathBuf,
    /// Intermediates deleted after this stage.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<PathBuf>,
}

/// Result of a visual or analytic reduction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReduceReport {
    pub imagery: Imagery,
    pub basename: String,
    pub inputs: Vec<PathBuf>,
    pub stages: Vec<StageRecord>,
    /// Final artifacts, plain product first.
    pub outputs: Vec<PathBuf>,
}

impl ReduceReport {
    /// Every intermediate removed during the run.
    pub fn removed(&self) -> impl Iterator<Item = &PathBuf> {
        self.stages.iter().flat_map(|s| s.removed.iter())
    }
}

/// Progress events streamed from a running pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Inputs checked; the run is about to start.
    Validated {
        imagery: Imagery,
        inputs: usize,
        basename: String,
    },
    StageStarted {
        index: usize,
        total: usize,
        stage: Stage,
        output: PathBuf,
    },
    StageFinished(StageRecord),
    /// A Landsat scene finished (or was skipped / failed).
    Scene { prefix: String, status: SceneStatus },
}

/// Outcome of one Landsat scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SceneStatus {
    Written { output: PathBuf },
    Skipped { reason: String },
    Failed { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_display_names() {
        assert_eq!(Stage::ColorCorrect.to_string(), "color-correct");
        assert_eq!(Stage::Merge.to_string(), "merge");
    }

    #[test]
    fn report_serializes_without_empty_removed() {
        let report = ReduceReport {
            imagery: Imagery::Visual,
            basename: "tile".into(),
            inputs: vec!["tile.tif".into()],
            stages: vec![StageRecord {
                stage: Stage::Merge,
                output: "tile-merged.tif".into(),
                removed: vec![],
            }],
            outputs: vec!["tile-visual.tif".into()],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["imagery"], "visual");
        assert_eq!(json["stages"][0]["stage"], "merge");
        assert!(json["stages"][0].get("removed").is_none());
    }

    #[test]
    fn removed_iterates_all_stages() {
        let report = ReduceReport {
            imagery: Imagery::Analytic,
            basename: "t".into(),
            inputs: vec![],
            stages: vec![
                StageRecord {
                    stage: Stage::Reband,
                    output: "t-rgb.tif".into(),
                    removed: vec!["t-merged.tif".into()],
                },
                StageRecord {
                    stage: Stage::Rescale,
                    output: "t-8bit.tif".into(),
                    removed: vec!["t-rgb.tif".into()],
                },
            ],
            outputs: vec![],
        };
        assert_eq!(report.removed().count(), 2);
    }

    #[test]
    fn scene_status_is_tagged() {
        let json = serde_json::to_value(SceneStatus::Skipped {
            reason: "incomplete".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "incomplete");
    }
}
