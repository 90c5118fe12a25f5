//! Writes a finished run to disk: the report, the full outcome, the profile
//! and one JSON file per figure.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tracing::info;

use crate::pipeline::AnalysisOutcome;

/// File name for a figure: task position (1-based) and binding name, with
/// anything outside `[A-Za-z0-9_-]` replaced.
pub fn figure_file_name(task_index: usize, name: &str, nth: usize) -> String {
    let clean: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if nth == 0 {
        format!("task{:02}_{clean}.json", task_index + 1)
    } else {
        format!("task{:02}_{clean}_{nth}.json", task_index + 1)
    }
}

/// Writes everything under `dir` and returns the paths written.
pub fn write_outcome(dir: &Path, outcome: &AnalysisOutcome) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let mut written = Vec::new();

    let report = dir.join("report.md");
    fs::write(&report, &outcome.report)
        .with_context(|| format!("failed to write {}", report.display()))?;
    written.push(report);

    let results = dir.join("results.json");
    fs::write(&results, serde_json::to_string_pretty(outcome)?)
        .with_context(|| format!("failed to write {}", results.display()))?;
    written.push(results);

    if let Some(profile) = &outcome.profile {
        let path = dir.join("profile.json");
        fs::write(&path, serde_json::to_string_pretty(profile)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }

    let figures_dir = dir.join("figures");
    for record in outcome.execution_results.iter().filter(|r| r.attempt.success) {
        for (nth, fig) in record.attempt.figures.iter().enumerate() {
            fs::create_dir_all(&figures_dir)
                .with_context(|| format!("failed to create {}", figures_dir.display()))?;
            let path = figures_dir.join(figure_file_name(record.task_index, &fig.name, nth));
            fs::write(&path, serde_json::to_string(&fig.spec)?)
                .with_context(|| format!("failed to write {}", path.display()))?;
            written.push(path);
        }
    }

    info!(dir = %dir.display(), files = written.len(), "results exported");
    Ok(written)
}
