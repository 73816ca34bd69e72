//! SARIF 2.1.0 reporter for GitHub Code Scanning.

use std::collections::HashSet;

use serde_json::{json, Value};

use pgfence_core::RiskLevel;

use crate::analyzer::BatchReport;
use crate::policy::Severity;

use super::Reporter;

/// SARIF 2.1.0 reporter.
pub struct SarifReporter {
    pub tool_name: String,
    pub tool_version: String,
}

impl SarifReporter {
    pub fn new() -> Self {
        Self {
            tool_name: "pgfence".to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn risk_to_level(risk: RiskLevel) -> &'static str {
        match risk {
            RiskLevel::Critical | RiskLevel::High => "error",
            RiskLevel::Medium => "warning",
            RiskLevel::Low | RiskLevel::Safe => "note",
        }
    }

    fn severity_to_level(severity: Severity) -> &'static str {
        match severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }

    fn build_results(&self, report: &BatchReport) -> Vec<Value> {
        let mut results = Vec::new();

        for file_result in &report.results {
            for check in &file_result.checks {
                let mut result = json!({
                    "ruleId": check.rule_id,
                    "level": Self::risk_to_level(check.effective_risk()),
                    "message": {
                        "text": check.message
                    },
                    "locations": [{
                        "physicalLocation": {
                            "artifactLocation": {
                                "uri": file_result.path,
                                "uriBaseId": "%SRCROOT%"
                            },
                            "region": {
                                "startLine": check.line.max(1)
                            }
                        }
                    }]
                });

                let mut properties = serde_json::Map::new();
                properties.insert("baseRisk".to_string(), json!(check.base_risk));
                if let Some(adjusted) = check.adjusted_risk {
                    properties.insert("adjustedRisk".to_string(), json!(adjusted));
                }
                if let Some(lock) = check.lock_mode {
                    properties.insert("lockMode".to_string(), json!(lock.as_str()));
                }
                if let Some(table) = &check.table {
                    properties.insert("table".to_string(), json!(table));
                }
                result["properties"] = Value::Object(properties);

                if let Some(rewrite) = &check.safe_rewrite {
                    result["fixes"] = json!([{
                        "description": {
                            "text": format!("{}\n{}", rewrite.description, rewrite.steps.join("\n"))
                        }
                    }]);
                }

                results.push(result);
            }

            for violation in &file_result.violations {
                results.push(json!({
                    "ruleId": format!("policy-{}", violation.rule_id),
                    "level": Self::severity_to_level(violation.severity),
                    "message": {
                        "text": violation.message
                    },
                    "locations": [{
                        "physicalLocation": {
                            "artifactLocation": {
                                "uri": file_result.path,
                                "uriBaseId": "%SRCROOT%"
                            },
                            "region": {
                                "startLine": violation.line.unwrap_or(1).max(1)
                            }
                        }
                    }]
                }));
            }
        }

        results
    }

    fn build_rules(&self, report: &BatchReport) -> Vec<Value> {
        let mut seen = HashSet::new();
        let mut rules = Vec::new();

        for file_result in &report.results {
            for check in &file_result.checks {
                if seen.insert(check.rule_id.clone()) {
                    rules.push(json!({
                        "id": check.rule_id,
                        "shortDescription": {
                            "text": check.message.chars().take(100).collect::<String>()
                        },
                        "defaultConfiguration": {
                            "level": Self::risk_to_level(check.base_risk)
                        }
                    }));
                }
            }
            for violation in &file_result.violations {
                let id = format!("policy-{}", violation.rule_id);
                if seen.insert(id.clone()) {
                    rules.push(json!({
                        "id": id,
                        "shortDescription": {
                            "text": violation.message.chars().take(100).collect::<String>()
                        },
                        "defaultConfiguration": {
                            "level": Self::severity_to_level(violation.severity)
                        }
                    }));
                }
            }
        }

        rules
    }
}

impl Default for SarifReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for SarifReporter {
    fn name(&self) -> &'static str {
        "sarif"
    }

    fn generate(&self, report: &BatchReport) -> Result<String, String> {
        let sarif = json!({
            "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/main/sarif-2.1/schema/sarif-schema-2.1.0.json",
            "version": "2.1.0",
            "runs": [{
                "tool": {
                    "driver": {
                        "name": self.tool_name,
                        "version": self.tool_version,
                        "informationUri": "https://github.com/pgfence/pgfence",
                        "rules": self.build_rules(report)
                    }
                },
                "results": self.build_results(report)
            }]
        });

        serde_json::to_string_pretty(&sarif).map_err(|e| e.to_string())
    }
}
