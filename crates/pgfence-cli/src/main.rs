//! pgfence command-line front-end.
//!
//! Exit codes: 0 success, 1 CI gate failure, 2 fatal error.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::Parser;

use pgfence_analysis::analyzer::Analyzer;
use pgfence_analysis::extractors::MigrationFormat;
use pgfence_analysis::reporters::create_reporter;
use pgfence_core::errors::{PgfenceErrorCode, PluginError, StatsError};
use pgfence_core::{AnalyzeConfig, RiskLevel, SchemaSnapshot, StatsSnapshot};

use pgfence_cli::cli::{Cli, Commands};

fn main() -> ExitCode {
    pgfence_core::tracing::init_tracing();
    let cli = Cli::parse();

    match run_analyze(cli.command) {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::from(1),
        Err(diagnostic) => {
            eprintln!("pgfence: {diagnostic}");
            ExitCode::from(2)
        }
    }
}

/// Run the analyze subcommand. `Ok(true)` means the CI gate failed;
/// `Err` carries a single-line fatal diagnostic.
fn run_analyze(command: Commands) -> Result<bool> {
    let Commands::Analyze {
        files,
        format,
        output,
        db_url,
        stats_file,
        min_pg_version,
        max_risk,
        ci,
        no_lock_timeout,
        no_statement_timeout,
        max_lock_timeout,
        max_statement_timeout,
        disable_rules,
        enable_rules,
        snapshot,
        plugin,
    } = command;

    let format = MigrationFormat::parse_flag(&format).map_err(|err| anyhow!(err.diagnostic()))?;
    let max_risk = RiskLevel::from_str(&max_risk).map_err(|err| anyhow!(err.diagnostic()))?;

    if !plugin.is_empty() {
        let err = PluginError::LoaderUnavailable {
            path: plugin[0].display().to_string(),
        };
        return Err(anyhow!(err.diagnostic()));
    }

    let config = AnalyzeConfig {
        min_pg_version: Some(min_pg_version),
        max_risk: Some(max_risk),
        require_lock_timeout: Some(!no_lock_timeout),
        require_statement_timeout: Some(!no_statement_timeout),
        max_lock_timeout_ms: max_lock_timeout,
        max_statement_timeout_ms: max_statement_timeout,
        disabled_rules: disable_rules,
        enabled_rules: enable_rules,
        preview_width: None,
    };

    let mut analyzer = Analyzer::new(config);
    if let Some(stats) = load_stats(db_url.as_deref(), stats_file.as_deref())? {
        analyzer = analyzer.with_stats(stats);
    }
    if let Some(path) = snapshot {
        let snapshot = SchemaSnapshot::load(&path).map_err(|err| anyhow!(err.diagnostic()))?;
        analyzer = analyzer.with_snapshot(snapshot);
    }

    let paths: Vec<PathBuf> = files;
    let report = analyzer
        .analyze_files(&paths, format)
        .map_err(|err| anyhow!(err.diagnostic()))?;

    let reporter =
        create_reporter(&output).ok_or_else(|| anyhow!("unknown output format: {output}"))?;
    let rendered = reporter.generate(&report).map_err(|err| anyhow!(err))?;
    print!("{rendered}");

    Ok(ci && report.ci_failure(max_risk))
}

/// Stats come from --db-url (collaborator, unavailable here) or --stats-file.
fn load_stats(db_url: Option<&str>, stats_file: Option<&Path>) -> Result<Option<StatsSnapshot>> {
    if db_url.is_some() {
        return Err(anyhow!(StatsError::DbUnavailable.diagnostic()));
    }
    match stats_file {
        Some(path) => StatsSnapshot::load(path)
            .map(Some)
            .map_err(|err| anyhow!(err.diagnostic())),
        None => Ok(None),
    }
}
