//! CLI argument-surface tests.

use clap::Parser;
use pgfence_cli::cli::{Cli, Commands};

#[test]
fn test_analyze_defaults() {
    let cli = Cli::try_parse_from(["pgfence", "analyze", "001_init.sql"]).unwrap();
    let Commands::Analyze {
        files,
        format,
        output,
        min_pg_version,
        max_risk,
        ci,
        ..
    } = cli.command;
    assert_eq!(files.len(), 1);
    assert_eq!(format, "auto");
    assert_eq!(output, "cli");
    assert_eq!(min_pg_version, 11);
    assert_eq!(max_risk, "high");
    assert!(!ci);
}

#[test]
fn test_analyze_requires_files() {
    assert!(Cli::try_parse_from(["pgfence", "analyze"]).is_err());
}

#[test]
fn test_output_values_are_validated() {
    assert!(Cli::try_parse_from(["pgfence", "analyze", "m.sql", "--output", "sarif"]).is_ok());
    assert!(Cli::try_parse_from(["pgfence", "analyze", "m.sql", "--output", "xml"]).is_err());
}

#[test]
fn test_rule_lists_take_multiple_values() {
    let cli = Cli::try_parse_from([
        "pgfence",
        "analyze",
        "m.sql",
        "--disable-rules",
        "drop-table",
        "truncate",
        "--max-lock-timeout",
        "2000",
    ])
    .unwrap();
    let Commands::Analyze {
        disable_rules,
        max_lock_timeout,
        ..
    } = cli.command;
    assert_eq!(disable_rules, vec!["drop-table", "truncate"]);
    assert_eq!(max_lock_timeout, Some(2000));
}

#[test]
fn test_multiple_files_in_order() {
    let cli = Cli::try_parse_from(["pgfence", "analyze", "001.sql", "002.sql", "003.sql"]).unwrap();
    let Commands::Analyze { files, .. } = cli.command;
    let names: Vec<_> = files
        .iter()
        .map(|path| path.file_name().unwrap().to_str().unwrap())
        .collect();
    assert_eq!(names, vec!["001.sql", "002.sql", "003.sql"]);
}
