//! GitHub reporter — a Markdown PR comment.

use pgfence_core::RiskLevel;

use crate::analyzer::BatchReport;
use crate::policy::Severity;

use super::Reporter;

/// Renders the report as a single Markdown comment body.
pub struct GitHubReporter;

fn risk_badge(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::Critical => "🟥 CRITICAL",
        RiskLevel::High => "🟧 HIGH",
        RiskLevel::Medium => "🟨 MEDIUM",
        RiskLevel::Low => "🟦 LOW",
        RiskLevel::Safe => "🟩 SAFE",
    }
}

impl Reporter for GitHubReporter {
    fn name(&self) -> &'static str {
        "github"
    }

    fn generate(&self, report: &BatchReport) -> Result<String, String> {
        let mut output = String::from("## pgfence migration report\n\n");
        output.push_str(&format!(
            "**Coverage:** {}% ({} statements, {} dynamic)\n\n",
            report.coverage.coverage_percent,
            report.coverage.total_statements,
            report.coverage.dynamic_statements,
        ));

        for result in &report.results {
            output.push_str(&format!(
                "### `{}` — {}\n\n",
                result.path,
                risk_badge(result.max_risk)
            ));

            if !result.checks.is_empty() {
                output.push_str("| Risk | Rule | Table | Lock | Message |\n");
                output.push_str("|---|---|---|---|---|\n");
                for check in &result.checks {
                    output.push_str(&format!(
                        "| {} | `{}` | {} | {} | {} |\n",
                        check.effective_risk().as_str(),
                        check.rule_id,
                        check.table.as_deref().unwrap_or("—"),
                        check
                            .lock_mode
                            .map(|mode| mode.as_str())
                            .unwrap_or("—"),
                        check.message.replace('|', "\\|"),
                    ));
                }
                output.push('\n');

                for check in &result.checks {
                    let Some(rewrite) = &check.safe_rewrite else {
                        continue;
                    };
                    output.push_str(&format!(
                        "<details><summary>Safe rewrite for <code>{}</code> (line {}): {}</summary>\n\n```sql\n{}\n```\n</details>\n\n",
                        check.rule_id,
                        check.line,
                        rewrite.description,
                        rewrite.steps.join("\n"),
                    ));
                }
            }

            for violation in &result.violations {
                let marker = match violation.severity {
                    Severity::Error => "❌",
                    Severity::Warning => "⚠️",
                };
                output.push_str(&format!(
                    "- {marker} **{}** — {} _(fix: {})_\n",
                    violation.rule_id, violation.message, violation.suggested_fix,
                ));
            }
            for warning in &result.warnings {
                output.push_str(&format!(
                    "- ⚠️ `{}:{}` {}\n",
                    warning.file, warning.line, warning.message
                ));
            }
            output.push('\n');
        }

        Ok(output)
    }
}
