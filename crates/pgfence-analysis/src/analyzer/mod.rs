//! The per-batch analysis pipeline.
//!
//! Runs every rule on every statement, then applies suppression,
//! enable/disable filtering, new-table visibility, and size-based risk
//! adjustment, and finally aggregates per-file results. Files are processed
//! strictly in the order supplied: the created-tables accumulator carries
//! across files of one batch.

use std::path::Path;

use pg_query::NodeEnum;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use pgfence_core::errors::{codes, ExtractError, ParseError, PgfenceErrorCode, PluginError};
use pgfence_core::{AnalyzeConfig, RiskLevel, SchemaSnapshot, StatsSnapshot};
use rustc_hash::FxHashSet;

use crate::extractors::{extract_file, ExtractionWarning, MigrationFormat};
use crate::parser::{parse_sql, ParsedStatement};
use crate::plugins::{Plugin, PluginSet};
use crate::policy::{PolicyEngine, PolicyViolation, Severity};
use crate::rules::{builtin_rule_ids, builtin_rules, CheckResult, Rule, RuleContext};

/// Failure of one file's analysis. Both variants are fail-fast.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl PgfenceErrorCode for AnalyzeError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Extract(err) => err.error_code(),
            Self::Parse(_) => codes::PARSE_ERROR,
        }
    }
}

/// Coverage is the primary trust signal: how much of the migration the
/// analyzer actually saw.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    pub total_statements: usize,
    pub dynamic_statements: usize,
    pub coverage_percent: u32,
}

impl Coverage {
    pub fn compute(total_statements: usize, dynamic_statements: usize) -> Self {
        let coverage_percent = if total_statements == 0 {
            100
        } else {
            let analyzed = total_statements.saturating_sub(dynamic_statements);
            ((analyzed as f64 / total_statements as f64) * 100.0).round() as u32
        };
        Self {
            total_statements,
            dynamic_statements,
            coverage_percent,
        }
    }
}

/// Everything the analyzer found in one file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub path: String,
    pub statement_count: usize,
    pub checks: Vec<CheckResult>,
    pub violations: Vec<PolicyViolation>,
    pub warnings: Vec<ExtractionWarning>,
    pub max_risk: RiskLevel,
}

/// The aggregate over one batch of files.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub results: Vec<AnalysisResult>,
    pub coverage: Coverage,
}

impl BatchReport {
    /// The CI gate: true when any file exceeds the allowed risk or any
    /// error-severity policy violation exists.
    pub fn ci_failure(&self, max_allowed: RiskLevel) -> bool {
        self.results.iter().any(|result| {
            result.max_risk > max_allowed
                || result
                    .violations
                    .iter()
                    .any(|violation| violation.severity == Severity::Error)
        })
    }
}

/// The single-threaded batch analyzer. Instantiate one per batch; the
/// created-tables accumulator is its only cross-file state.
pub struct Analyzer {
    config: AnalyzeConfig,
    stats: Option<StatsSnapshot>,
    snapshot: Option<SchemaSnapshot>,
    rules: Vec<Box<dyn Rule>>,
    plugins: PluginSet,
    created_tables: FxHashSet<String>,
}

impl Analyzer {
    pub fn new(config: AnalyzeConfig) -> Self {
        Self {
            config,
            stats: None,
            snapshot: None,
            rules: builtin_rules(),
            plugins: PluginSet::new(),
            created_tables: FxHashSet::default(),
        }
    }

    pub fn with_stats(mut self, stats: StatsSnapshot) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_snapshot(mut self, snapshot: SchemaSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn register_plugin(&mut self, plugin: &dyn Plugin) -> Result<(), PluginError> {
        self.plugins.register(plugin, &builtin_rule_ids())
    }

    /// Every rule id this analyzer can emit, built-in plus plugin.
    pub fn rule_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = builtin_rule_ids()
            .into_iter()
            .map(str::to_string)
            .collect();
        ids.extend(self.plugins.rule_ids().map(str::to_string));
        ids
    }

    /// Analyze a batch of files in the order supplied.
    pub fn analyze_files(
        &mut self,
        paths: &[std::path::PathBuf],
        format: Option<MigrationFormat>,
    ) -> Result<BatchReport, AnalyzeError> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            results.push(self.analyze_file(path, format)?);
        }
        let total = results.iter().map(|r| r.statement_count).sum();
        let dynamic = results.iter().map(|r| r.warnings.len()).sum();
        Ok(BatchReport {
            results,
            coverage: Coverage::compute(total, dynamic),
        })
    }

    /// Extract and analyze one file.
    pub fn analyze_file(
        &mut self,
        path: &Path,
        format: Option<MigrationFormat>,
    ) -> Result<AnalysisResult, AnalyzeError> {
        let extraction = extract_file(path, format)?;
        debug!(
            path = %path.display(),
            warnings = extraction.warnings.len(),
            auto_commit = extraction.auto_commit,
            "extracted migration"
        );
        Ok(self.analyze_sql(
            &path.display().to_string(),
            &extraction.sql,
            extraction.warnings,
            extraction.auto_commit,
        )?)
    }

    /// Analyze already-extracted SQL.
    pub fn analyze_sql(
        &mut self,
        path: &str,
        sql: &str,
        warnings: Vec<ExtractionWarning>,
        auto_commit: bool,
    ) -> Result<AnalysisResult, ParseError> {
        let statements = parse_sql(path, sql)?;
        let mut warnings = warnings;
        let mut checks = Vec::new();

        // Procedural bodies are opaque to the analyzer; count them as
        // unanalyzed sites so coverage reflects reality.
        for statement in &statements {
            let message = match statement.kind {
                "DoStmt" => "Unanalyzable DO block — statements inside are not checked",
                "CreateFunctionStmt" => {
                    "Unanalyzable function body — statements inside are not checked"
                }
                _ => continue,
            };
            warnings.push(ExtractionWarning {
                file: path.to_string(),
                line: statement.line,
                column: 1,
                message: message.to_string(),
            });
        }

        for statement in &statements {
            let ctx = RuleContext {
                statement,
                config: &self.config,
                snapshot: self.snapshot.as_ref(),
            };

            let mut produced = Vec::new();
            for rule in &self.rules {
                let mut results = rule.check(&ctx);
                for result in &mut results {
                    result.applies_to_new_tables = rule.applies_to_new_tables();
                }
                produced.extend(results);
            }
            produced.extend(self.plugins.check_statement(&ctx));

            produced.retain(|check| self.keep_finding(statement, check));
            checks.extend(produced);

            // The statement's own creations become visible only to later
            // statements, so its own findings are filtered first.
            if let NodeEnum::CreateStmt(create) = &statement.node {
                if let Some(relation) = create.relation.as_ref() {
                    self.created_tables.insert(relation.relname.to_lowercase());
                }
            }
        }

        if let Some(stats) = &self.stats {
            for check in &mut checks {
                adjust_risk(check, stats);
            }
        }

        let violations = PolicyEngine::new(&self.config).check_file(&statements, auto_commit);
        let max_risk = checks
            .iter()
            .map(CheckResult::effective_risk)
            .max()
            .unwrap_or(RiskLevel::Safe);

        Ok(AnalysisResult {
            path: path.to_string(),
            statement_count: statements.len(),
            checks,
            violations,
            warnings,
            max_risk,
        })
    }

    /// Suppression, enable/disable filtering, and new-table visibility.
    fn keep_finding(&self, statement: &ParsedStatement, check: &CheckResult) -> bool {
        if statement.suppresses(&check.rule_id) {
            return false;
        }
        if !self.config.rule_enabled(&check.rule_id) {
            return false;
        }
        if !check.applies_to_new_tables {
            if let Some(table) = check.table.as_deref() {
                if self.created_tables.contains(&table.to_lowercase()) {
                    return false;
                }
            }
        }
        true
    }
}

/// The row-count step function: < 10k unchanged, ≥ 10k +1, ≥ 1M +2,
/// ≥ 10M straight to CRITICAL. Bumps saturate.
fn adjust_risk(check: &mut CheckResult, stats: &StatsSnapshot) {
    let Some(table) = check.table.as_deref() else {
        return;
    };
    let Some(entry) = stats.lookup(table) else {
        return;
    };
    let adjusted = match entry.row_count {
        count if count >= 10_000_000 => RiskLevel::Critical,
        count if count >= 1_000_000 => check.base_risk.bump(2),
        count if count >= 10_000 => check.base_risk.bump(1),
        _ => check.base_risk,
    };
    check.adjusted_risk = Some(adjusted);
}
