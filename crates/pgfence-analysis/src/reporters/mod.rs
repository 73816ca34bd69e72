//! Reporters — output formats for batch reports.
//!
//! 4 formats: human terminal output, the JSON envelope, GitHub PR-comment
//! Markdown, and SARIF 2.1.0 for code scanning.

pub mod console;
pub mod github;
pub mod json;
pub mod sarif;

use crate::analyzer::BatchReport;

/// Trait for report generation.
pub trait Reporter: Send + Sync {
    fn name(&self) -> &'static str;
    fn generate(&self, report: &BatchReport) -> Result<String, String>;
}

/// Create a reporter by format name.
pub fn create_reporter(format: &str) -> Option<Box<dyn Reporter>> {
    match format {
        "cli" => Some(Box::new(console::ConsoleReporter::default())),
        "json" => Some(Box::new(json::JsonReporter)),
        "github" => Some(Box::new(github::GitHubReporter)),
        "sarif" => Some(Box::new(sarif::SarifReporter::new())),
        _ => None,
    }
}

/// List all available reporter format names.
pub fn available_formats() -> &'static [&'static str] {
    &["cli", "json", "github", "sarif"]
}
