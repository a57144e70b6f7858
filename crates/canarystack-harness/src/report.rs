//! Report generation for verification runs.

use canarystack_membrane::{MetricsSnapshot, global_metrics};
use serde::Serialize;

use crate::structured_log::{ArtifactEntry, now_utc};
use crate::verify::VerificationSummary;

/// A run report combining verification results, produced artifacts and
/// the process integrity counters.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Report title.
    pub title: String,
    /// Diagnostic level exercised.
    pub level: String,
    /// Sequence seed.
    pub seed: u64,
    /// Timestamp (UTC).
    pub timestamp: String,
    /// Verification summary.
    pub summary: VerificationSummary,
    /// Files written alongside the report.
    pub artifacts: Vec<ArtifactEntry>,
    /// Integrity counters at the end of the run.
    pub metrics: MetricsSnapshot,
}

impl RunReport {
    /// Report stamped now, with the current global counters.
    #[must_use]
    pub fn new(level: &str, seed: u64, summary: VerificationSummary) -> Self {
        Self {
            title: String::from("canarystack verification report"),
            level: level.to_string(),
            seed,
            timestamp: now_utc(),
            summary,
            artifacts: Vec::new(),
            metrics: global_metrics().snapshot(),
        }
    }

    /// Render the report as markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        out.push_str(&format!("- Level: {}\n", self.level));
        out.push_str(&format!("- Seed: {:#x}\n", self.seed));
        out.push_str(&format!("- Timestamp: {}\n", self.timestamp));
        out.push_str(&format!("- Total: {}\n", self.summary.total));
        out.push_str(&format!("- Passed: {}\n", self.summary.passed));
        out.push_str(&format!("- Failed: {}\n\n", self.summary.failed));

        out.push_str("| Case | Category | Status | Detail |\n");
        out.push_str("|------|----------|--------|--------|\n");
        for r in &self.summary.results {
            let status = if r.passed { "PASS" } else { "FAIL" };
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                r.case_name,
                r.category,
                status,
                r.diff.as_deref().unwrap_or(&r.actual)
            ));
        }

        if !self.artifacts.is_empty() {
            out.push_str("\n## Artifacts\n\n");
            for a in &self.artifacts {
                out.push_str(&format!("- `{}` ({}) sha256 `{}`\n", a.path, a.kind, a.sha256));
            }
        }

        let m = &self.metrics;
        out.push_str("\n## Integrity counters\n\n");
        out.push_str(&format!("- validations: {}\n", m.validations));
        out.push_str(&format!(
            "- failures: poison={} guard={} checksum={} bookkeeping={}\n",
            m.poison_failures, m.guard_failures, m.checksum_failures, m.bookkeeping_failures
        ));
        out.push_str(&format!(
            "- reallocations: grow={} shrink={} refused={}\n",
            m.growths, m.shrinks, m.allocation_failures
        ));
        out.push_str(&format!("- faults latched: {}\n", m.faults_latched));
        out
    }

    /// Render the report as JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}
