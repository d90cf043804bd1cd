//! CLI output formatting for all pipelines.
//!
//! Progress goes to stdout and names the stage first, with the file it
//! writes as context. Diagnostics (tool command lines, warnings) go through
//! `tracing` to stderr, so stdout stays a readable run log.
//!
//! # Output Format
//!
//! ## Visual / analytic
//!
//! ```text
//! Reducing 3 analytic tiles → 20170601_181
//! [1/6] merge → 20170601_181-merged.tif
//! [2/6] reband → 20170601_181-rgb.tif
//!     removed 20170601_181-merged.tif
//! ...
//! Outputs
//!     out/20170601_181-analytic.tif
//!     out/20170601_181-cc.tif
//! Removed 4 intermediates
//! ```
//!
//! ## Landsat
//!
//! ```text
//! LC08_L1TP_042034_20170616_sr_ → out/LC08_L1TP_042034_20170616_sr.tif
//! LC08_L1TP_042035_20170616_sr_ skipped: incomplete R-G-B set, missing band 3
//! Wrote 1 of 2 scenes (1 skipped, 0 failed)
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use crate::landsat::SceneResult;
use crate::types::{ProgressEvent, ReduceReport, SceneStatus};
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// File name only, falling back to the full path.
fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

fn scene_line(prefix: &str, status: &SceneStatus) -> String {
    match status {
        SceneStatus::Written { output } => format!("{} \u{2192} {}", prefix, output.display()),
        SceneStatus::Skipped { reason } => format!("{} skipped: {}", prefix, reason),
        SceneStatus::Failed { error } => format!("{} failed: {}", prefix, error),
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Format a single progress event as display lines.
pub fn format_event(event: &ProgressEvent) -> Vec<String> {
    match event {
        ProgressEvent::Validated {
            imagery,
            inputs,
            basename,
        } => vec![format!(
            "Reducing {} {} {} \u{2192} {}",
            inputs,
            imagery,
            if *inputs == 1 { "tile" } else { "tiles" },
            basename
        )],
        ProgressEvent::StageStarted {
            index,
            total,
            stage,
            output,
        } => vec![format!(
            "[{}/{}] {} \u{2192} {}",
            index,
            total,
            stage,
            file_label(output)
        )],
        ProgressEvent::StageFinished(record) => record
            .removed
            .iter()
            .map(|p| format!("{}removed {}", indent(1), file_label(p)))
            .collect(),
        ProgressEvent::Scene { prefix, status } => vec![scene_line(prefix, status)],
    }
}

// ============================================================================
// Summaries
// ============================================================================

/// Format the final products of a visual or analytic run.
pub fn format_report(report: &ReduceReport) -> Vec<String> {
    let mut lines = vec!["Outputs".to_string()];
    for output in &report.outputs {
        lines.push(format!("{}{}", indent(1), output.display()));
    }
    let removed = report.removed().count();
    if removed > 0 {
        lines.push(format!(
            "Removed {}",
            plural(removed, "intermediate", "intermediates")
        ));
    }
    lines
}

/// Print a run report to stdout.
pub fn print_report(report: &ReduceReport) {
    for line in format_report(report) {
        println!("{}", line);
    }
}

/// Format the per-scene summary of a Landsat run.
///
/// Scene lines are already printed as progress, so only the totals line is
/// produced here.
pub fn format_scenes(results: &[SceneResult]) -> Vec<String> {
    let written = results
        .iter()
        .filter(|r| matches!(r.status, SceneStatus::Written { .. }))
        .count();
    let skipped = results
        .iter()
        .filter(|r| matches!(r.status, SceneStatus::Skipped { .. }))
        .count();
    let failed = results.len() - written - skipped;
    vec![format!(
        "Wrote {} of {} ({} skipped, {} failed)",
        written,
        plural(results.len(), "scene", "scenes"),
        skipped,
        failed
    )]
}

/// Print the Landsat totals to stdout.
pub fn print_scenes(results: &[SceneResult]) {
    for line in format_scenes(results) {
        println!("{}", line);
    }
}

/// Format the result of a standalone color correction.
pub fn format_corrected(source: &Path, output: &Path) -> Vec<String> {
    vec![format!(
        "{} \u{2192} {}",
        file_label(source),
        output.display()
    )]
}

/// Print the result of a standalone color correction.
pub fn print_corrected(source: &Path, output: &Path) {
    for line in format_corrected(source, output) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Imagery, Stage, StageRecord};
    use std::path::PathBuf;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn file_label_strips_directories() {
        assert_eq!(file_label(Path::new("/out/t-rgb.tif")), "t-rgb.tif");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "scene", "scenes"), "1 scene");
        assert_eq!(plural(0, "scene", "scenes"), "0 scenes");
    }

    // =========================================================================
    // Progress
    // =========================================================================

    #[test]
    fn validated_line() {
        let lines = format_event(&ProgressEvent::Validated {
            imagery: Imagery::Analytic,
            inputs: 3,
            basename: "20170601_181".into(),
        });
        assert_eq!(lines, ["Reducing 3 analytic tiles \u{2192} 20170601_181"]);
    }

    #[test]
    fn validated_single_tile() {
        let lines = format_event(&ProgressEvent::Validated {
            imagery: Imagery::Visual,
            inputs: 1,
            basename: "tile".into(),
        });
        assert_eq!(lines, ["Reducing 1 visual tile \u{2192} tile"]);
    }

    #[test]
    fn stage_started_shows_position_and_file() {
        let lines = format_event(&ProgressEvent::StageStarted {
            index: 2,
            total: 6,
            stage: Stage::Reband,
            output: "/data/out/20170601_181-rgb.tif".into(),
        });
        assert_eq!(lines, ["[2/6] reband \u{2192} 20170601_181-rgb.tif"]);
    }

    #[test]
    fn stage_finished_lists_removed_intermediates() {
        let lines = format_event(&ProgressEvent::StageFinished(StageRecord {
            stage: Stage::Reband,
            output: "out/t-rgb.tif".into(),
            removed: vec!["out/t-merged.tif".into()],
        }));
        assert_eq!(lines, ["    removed t-merged.tif"]);
    }

    #[test]
    fn stage_finished_without_removals_is_silent() {
        let lines = format_event(&ProgressEvent::StageFinished(StageRecord {
            stage: Stage::Merge,
            output: "out/t-merged.tif".into(),
            removed: vec![],
        }));
        assert!(lines.is_empty());
    }

    #[test]
    fn scene_event_lines() {
        let written = format_event(&ProgressEvent::Scene {
            prefix: "LC08_sr_".into(),
            status: SceneStatus::Written {
                output: "out/LC08_sr.tif".into(),
            },
        });
        assert_eq!(written, ["LC08_sr_ \u{2192} out/LC08_sr.tif"]);

        let skipped = format_event(&ProgressEvent::Scene {
            prefix: "LC08_sr_".into(),
            status: SceneStatus::Skipped {
                reason: "incomplete".into(),
            },
        });
        assert_eq!(skipped, ["LC08_sr_ skipped: incomplete"]);
    }

    // =========================================================================
    // Summaries
    // =========================================================================

    fn report() -> ReduceReport {
        ReduceReport {
            imagery: Imagery::Analytic,
            basename: "t".into(),
            inputs: vec!["t.tif".into()],
            stages: vec![
                StageRecord {
                    stage: Stage::Reband,
                    output: "out/t-rgb.tif".into(),
                    removed: vec!["out/t-merged.tif".into()],
                },
                StageRecord {
                    stage: Stage::Rescale,
                    output: "out/t-8bit.tif".into(),
                    removed: vec!["out/t-rgb.tif".into()],
                },
            ],
            outputs: vec!["out/t-analytic.tif".into(), "out/t-cc.tif".into()],
        }
    }

    #[test]
    fn report_lists_outputs_and_removals() {
        assert_eq!(
            format_report(&report()),
            [
                "Outputs",
                "    out/t-analytic.tif",
                "    out/t-cc.tif",
                "Removed 2 intermediates"
            ]
        );
    }

    #[test]
    fn report_without_removals() {
        let mut r = report();
        for stage in &mut r.stages {
            stage.removed.clear();
        }
        assert_eq!(format_report(&r).len(), 3);
    }

    #[test]
    fn scenes_totals() {
        let results = vec![
            SceneResult {
                prefix: "a_".into(),
                status: SceneStatus::Written {
                    output: PathBuf::from("a.tif"),
                },
            },
            SceneResult {
                prefix: "b_".into(),
                status: SceneStatus::Skipped {
                    reason: "missing".into(),
                },
            },
            SceneResult {
                prefix: "c_".into(),
                status: SceneStatus::Failed {
                    error: "boom".into(),
                },
            },
        ];
        assert_eq!(
            format_scenes(&results),
            ["Wrote 1 of 3 scenes (1 skipped, 1 failed)"]
        );
    }

    #[test]
    fn corrected_line() {
        assert_eq!(
            format_corrected(Path::new("/x/scene-8bit.tif"), Path::new("/x/scene-cc.tif")),
            ["scene-8bit.tif \u{2192} /x/scene-cc.tif"]
        );
    }
}
