//! CLI definitions for pgfence.
//!
//! All argument parsing structures live here, using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "pgfence",
    version,
    about = "Static safety analyzer for PostgreSQL schema migrations",
    long_about = "Reports the lock each DDL statement takes, a calibrated risk level, \
                  migration-wide policy violations, and concrete safe rewrites."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze one or more migration files
    Analyze {
        /// Migration files to analyze, in application order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Migration source format
        #[arg(long, default_value = "auto")]
        format: String,

        /// Report format
        #[arg(long, default_value = "cli", value_parser = ["cli", "json", "github", "sarif"])]
        output: String,

        /// Fetch table statistics from a live database (external collaborator)
        #[arg(long)]
        db_url: Option<String>,

        /// Pre-fetched table statistics JSON; ignored when --db-url is given
        #[arg(long)]
        stats_file: Option<PathBuf>,

        /// Lowest PostgreSQL major version the migration must support
        #[arg(long, default_value_t = 11)]
        min_pg_version: u32,

        /// Highest acceptable per-file risk
        #[arg(long, default_value = "high")]
        max_risk: String,

        /// Exit 1 when the risk ceiling is exceeded or an error-severity
        /// policy violation is present
        #[arg(long)]
        ci: bool,

        /// Do not require SET lock_timeout
        #[arg(long)]
        no_lock_timeout: bool,

        /// Do not require SET statement_timeout
        #[arg(long)]
        no_statement_timeout: bool,

        /// Ceiling for lock_timeout values, in milliseconds
        #[arg(long)]
        max_lock_timeout: Option<u64>,

        /// Ceiling for statement_timeout values, in milliseconds
        #[arg(long)]
        max_statement_timeout: Option<u64>,

        /// Rule ids to skip
        #[arg(long, num_args = 1..)]
        disable_rules: Vec<String>,

        /// When given, only these rule ids report
        #[arg(long, num_args = 1..)]
        enable_rules: Vec<String>,

        /// Schema snapshot JSON produced by the introspection collaborator
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Plugin modules to load (external loader collaborator)
        #[arg(long, num_args = 1..)]
        plugin: Vec<PathBuf>,
    },
}
