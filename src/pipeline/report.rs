//! Reporting gateway: shapes the execution log into a digest and asks the
//! text-generation collaborator for a narrative report and a review pass.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ExecutionRecord;
use crate::{
    config::Config,
    llm::TextGenerator,
    profile::Profile,
    role::{default_role_text, DefaultRole},
};

/// Report text used when narrative synthesis fails.
pub const REPORT_FALLBACK: &str = "An error occurred while generating the report.";

/// One successful task as the report writer sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestEntry {
    pub task: String,
    pub output: String,
    pub figures_count: usize,
}

/// Successful entries only, in log order.
pub fn digest(log: &[ExecutionRecord]) -> Vec<DigestEntry> {
    log.iter()
        .filter(|r| r.attempt.success)
        .map(|r| DigestEntry {
            task: r.task.description.clone(),
            output: r.attempt.stdout.clone(),
            figures_count: r.attempt.figures.len(),
        })
        .collect()
}

pub struct Reporter {
    generator: Arc<dyn TextGenerator>,
    analyst_role: String,
    editor_role: String,
}

impl Reporter {
    pub fn new(generator: Arc<dyn TextGenerator>, cfg: &Config) -> Self {
        Self {
            generator,
            analyst_role: default_role_text(cfg, DefaultRole::Analyst),
            editor_role: default_role_text(cfg, DefaultRole::Editor),
        }
    }

    pub async fn request_report(&self, profile: &Profile, digest: &[DigestEntry]) -> String {
        let prompt = format!(
            "Data summary:\n{}\n\nAnalyses performed:\n{}\n\n\
Write a comprehensive data analysis report based on these results.",
            to_pretty(profile),
            to_pretty(&digest)
        );
        match self.generator.generate(&self.analyst_role, &prompt).await {
            Ok(report) => {
                info!(entries = digest.len(), "report generated");
                report
            }
            Err(e) => {
                warn!(error = %e, "report generation failed");
                REPORT_FALLBACK.to_string()
            }
        }
    }

    /// Review pass; the unreviewed text survives a failed call.
    pub async fn review_report(&self, report: &str) -> String {
        let prompt = format!(
            "Report to review:\n{report}\n\nReview this report and return the improved version."
        );
        match self.generator.generate(&self.editor_role, &prompt).await {
            Ok(reviewed) => {
                info!("report reviewed");
                reviewed
            }
            Err(e) => {
                warn!(error = %e, "report review failed, keeping unreviewed report");
                report.to_string()
            }
        }
    }
}

fn to_pretty<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unavailable: {e}>"))
}
