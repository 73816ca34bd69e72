//! JSON reporter — the machine-readable envelope.

use serde_json::json;

use crate::analyzer::BatchReport;

use super::Reporter;

/// Emits `{version, coverage, results}`.
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn generate(&self, report: &BatchReport) -> Result<String, String> {
        let envelope = json!({
            "version": "1.0",
            "coverage": report.coverage,
            "results": report.results,
        });
        serde_json::to_string_pretty(&envelope).map_err(|e| e.to_string())
    }
}
