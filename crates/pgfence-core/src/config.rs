//! Analyzer configuration.

use serde::{Deserialize, Serialize};

use crate::risk::RiskLevel;

/// Configuration for one analysis run. All fields are optional; the
/// `effective_*` accessors apply the documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyzeConfig {
    /// Lowest PostgreSQL major version the migration must run on. Default: 11.
    pub min_pg_version: Option<u32>,
    /// Highest acceptable per-file risk for CI gating. Default: high.
    pub max_risk: Option<RiskLevel>,
    /// Require a `SET lock_timeout` in every file. Default: true.
    pub require_lock_timeout: Option<bool>,
    /// Require a `SET statement_timeout` in every file. Default: true.
    pub require_statement_timeout: Option<bool>,
    /// Ceiling for `lock_timeout` values, in milliseconds. Default: 5000.
    pub max_lock_timeout_ms: Option<u64>,
    /// Ceiling for `statement_timeout` values, in milliseconds. Default: 600000.
    pub max_statement_timeout_ms: Option<u64>,
    /// Rule ids to skip. Takes precedence over `enabled_rules`.
    #[serde(default)]
    pub disabled_rules: Vec<String>,
    /// When non-empty, only these rule ids report.
    #[serde(default)]
    pub enabled_rules: Vec<String>,
    /// Width at which statement previews truncate. Default: 80.
    pub preview_width: Option<usize>,
}

impl AnalyzeConfig {
    pub fn effective_min_pg_version(&self) -> u32 {
        self.min_pg_version.unwrap_or(11)
    }

    pub fn effective_max_risk(&self) -> RiskLevel {
        self.max_risk.unwrap_or(RiskLevel::High)
    }

    pub fn effective_require_lock_timeout(&self) -> bool {
        self.require_lock_timeout.unwrap_or(true)
    }

    pub fn effective_require_statement_timeout(&self) -> bool {
        self.require_statement_timeout.unwrap_or(true)
    }

    pub fn effective_max_lock_timeout_ms(&self) -> u64 {
        self.max_lock_timeout_ms.unwrap_or(5_000)
    }

    pub fn effective_max_statement_timeout_ms(&self) -> u64 {
        self.max_statement_timeout_ms.unwrap_or(600_000)
    }

    pub fn effective_preview_width(&self) -> usize {
        self.preview_width.unwrap_or(80)
    }

    /// Whether a rule id survives the enable/disable filters.
    pub fn rule_enabled(&self, rule_id: &str) -> bool {
        if self.disabled_rules.iter().any(|id| id == rule_id) {
            return false;
        }
        if self.enabled_rules.is_empty() {
            return true;
        }
        self.enabled_rules.iter().any(|id| id == rule_id)
    }
}
