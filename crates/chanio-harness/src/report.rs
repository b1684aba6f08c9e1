//! Markdown and JSON reports for a fixture run.

use serde::{Deserialize, Serialize};

use crate::verify::VerificationSummary;

/// Fixture file that fed the run, pinned by content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureDigest {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformanceReport {
    pub title: String,
    /// Campaign name the runner was created with.
    pub campaign: String,
    /// Timestamp (UTC).
    pub timestamp: String,
    #[serde(default)]
    pub fixtures: Vec<FixtureDigest>,
    pub summary: VerificationSummary,
}

impl ConformanceReport {
    /// Render the report as markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        out.push_str(&format!("- Campaign: {}\n", self.campaign));
        out.push_str(&format!("- Timestamp: {}\n", self.timestamp));
        out.push_str(&format!("- Total: {}\n", self.summary.total));
        out.push_str(&format!("- Passed: {}\n", self.summary.passed));
        out.push_str(&format!("- Failed: {}\n\n", self.summary.failed));

        if !self.fixtures.is_empty() {
            out.push_str("## Fixtures\n\n");
            for f in &self.fixtures {
                out.push_str(&format!("- `{}` sha256 `{}`\n", f.path, f.sha256));
            }
            out.push('\n');
        }

        out.push_str("| Case | Property | Status |\n");
        out.push_str("|------|----------|--------|\n");
        for r in &self.summary.results {
            let status = if r.passed { "PASS" } else { "FAIL" };
            out.push_str(&format!("| {} | {} | {} |\n", r.case_name, r.property, status));
        }

        for r in self.summary.failures() {
            if let Some(diff) = &r.diff {
                out.push_str(&format!("\n### {}\n\n```diff\n{diff}```\n", r.case_name));
            }
        }
        out
    }

    /// Render the report as JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}
