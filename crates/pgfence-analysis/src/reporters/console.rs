//! Console reporter — human-readable output with color codes.

use pgfence_core::RiskLevel;

use crate::analyzer::BatchReport;
use crate::policy::Severity;

use super::Reporter;

/// Console reporter for human review in the terminal.
pub struct ConsoleReporter {
    pub use_color: bool,
}

impl ConsoleReporter {
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn risk_color(&self, risk: RiskLevel) -> &'static str {
        if !self.use_color {
            return "";
        }
        match risk {
            RiskLevel::Critical => "\x1b[1;31m", // bold red
            RiskLevel::High => "\x1b[31m",       // red
            RiskLevel::Medium => "\x1b[33m",     // yellow
            RiskLevel::Low => "\x1b[36m",        // cyan
            RiskLevel::Safe => "\x1b[32m",       // green
        }
    }

    fn color_end(&self) -> &'static str {
        if self.use_color {
            "\x1b[0m"
        } else {
            ""
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Reporter for ConsoleReporter {
    fn name(&self) -> &'static str {
        "cli"
    }

    fn generate(&self, report: &BatchReport) -> Result<String, String> {
        let mut output = String::new();

        output.push_str("╔══════════════════════════════════════════╗\n");
        output.push_str("║         pgfence migration report         ║\n");
        output.push_str("╚══════════════════════════════════════════╝\n\n");

        for result in &report.results {
            let cs = self.risk_color(result.max_risk);
            let ce = self.color_end();
            output.push_str(&format!(
                "{} — {cs}{}{ce} ({} statements)\n",
                result.path,
                result.max_risk.as_str().to_uppercase(),
                result.statement_count,
            ));

            for check in &result.checks {
                let risk = check.effective_risk();
                let cs = self.risk_color(risk);
                let lock = check
                    .lock_mode
                    .map(|mode| format!(" [{mode}]"))
                    .unwrap_or_default();
                let adjusted = match (check.adjusted_risk, check.base_risk) {
                    (Some(adjusted), base) if adjusted != base => {
                        format!(" ({} by table size)", adjusted.as_str())
                    }
                    _ => String::new(),
                };
                output.push_str(&format!(
                    "  {cs}{}{ce}: {}:{}{lock}{adjusted}\n    {}\n",
                    risk.as_str(),
                    check.rule_id,
                    check.line,
                    check.message,
                ));
                if let Some(rewrite) = &check.safe_rewrite {
                    output.push_str(&format!("    💡 {}\n", rewrite.description));
                    for step in &rewrite.steps {
                        output.push_str(&format!("       {step}\n"));
                    }
                }
            }

            for violation in &result.violations {
                let marker = match violation.severity {
                    Severity::Error => "✗",
                    Severity::Warning => "⚠",
                };
                output.push_str(&format!(
                    "  {marker} {} [{}]: {}\n    fix: {}\n",
                    violation.severity, violation.rule_id, violation.message, violation.suggested_fix,
                ));
            }

            for warning in &result.warnings {
                output.push_str(&format!(
                    "  ⚠ {}:{}:{}: {}\n",
                    warning.file, warning.line, warning.column, warning.message
                ));
            }

            output.push('\n');
        }

        let total_checks: usize = report.results.iter().map(|r| r.checks.len()).sum();
        let total_violations: usize = report.results.iter().map(|r| r.violations.len()).sum();
        output.push_str(&format!(
            "─── {} files, {total_checks} findings, {total_violations} policy violations ───\n",
            report.results.len(),
        ));
        output.push_str(&format!(
            "Coverage: {}% ({} statements, {} dynamic)\n",
            report.coverage.coverage_percent,
            report.coverage.total_statements,
            report.coverage.dynamic_statements,
        ));

        Ok(output)
    }
}
