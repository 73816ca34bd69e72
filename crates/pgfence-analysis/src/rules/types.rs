//! Output types of the rule engine.

use serde::Serialize;

use pgfence_core::{AnalyzeConfig, BlockedOps, LockMode, RiskLevel, SchemaSnapshot};

use crate::parser::{preview, ParsedStatement};

/// A concrete safe-rewrite recipe: what to do instead, as ordered SQL steps.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeRewrite {
    pub description: String,
    pub steps: Vec<String>,
}

/// One finding produced by a rule for one statement.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    /// The original statement text.
    pub statement: String,
    /// Comment-stripped, whitespace-collapsed one-liner for messages.
    pub preview: String,
    /// 1-based line of the statement in its source file.
    pub line: usize,
    /// Target table, when the statement has one.
    pub table: Option<String>,
    /// Lock the statement acquires; absent for advisory findings.
    pub lock_mode: Option<LockMode>,
    /// What that lock blocks.
    pub blocked: Option<BlockedOps>,
    pub base_risk: RiskLevel,
    /// Risk after table-size adjustment, when stats are available.
    pub adjusted_risk: Option<RiskLevel>,
    pub message: String,
    pub rule_id: String,
    pub safe_rewrite: Option<SafeRewrite>,
    pub applies_to_new_tables: bool,
}

impl CheckResult {
    /// The risk downstream aggregation uses.
    pub fn effective_risk(&self) -> RiskLevel {
        self.adjusted_risk.unwrap_or(self.base_risk)
    }

    pub fn with_rewrite(mut self, description: impl Into<String>, steps: Vec<String>) -> Self {
        self.safe_rewrite = Some(SafeRewrite {
            description: description.into(),
            steps,
        });
        self
    }
}

/// Everything a rule may consult: the statement, the immutable config, and
/// the optional schema snapshot.
pub struct RuleContext<'a> {
    pub statement: &'a ParsedStatement,
    pub config: &'a AnalyzeConfig,
    pub snapshot: Option<&'a SchemaSnapshot>,
}

impl RuleContext<'_> {
    pub fn finding(
        &self,
        rule_id: &str,
        table: Option<String>,
        lock: Option<LockMode>,
        risk: RiskLevel,
        message: String,
    ) -> CheckResult {
        CheckResult {
            statement: self.statement.sql.clone(),
            preview: preview(&self.statement.sql, self.config.effective_preview_width()),
            line: self.statement.line,
            table,
            lock_mode: lock,
            blocked: lock.map(LockMode::blocked_ops),
            base_risk: risk,
            adjusted_risk: None,
            message,
            rule_id: rule_id.to_string(),
            safe_rewrite: None,
            applies_to_new_tables: false,
        }
    }
}
