//! File-level extraction: format detection, BOM stripping, batch analysis.

use std::io::Write;

use pgfence_analysis::analyzer::Analyzer;
use pgfence_analysis::extractors::{extract_file, MigrationFormat};
use pgfence_core::AnalyzeConfig;

fn write_file(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    path
}

#[test]
fn test_sql_files_are_detected_and_bom_stripped() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "001_init.sql", "\u{feff}CREATE TABLE t (id bigint);\n");
    let extraction = extract_file(&path, None).unwrap();
    assert!(extraction.sql.starts_with("CREATE TABLE"));
    assert!(extraction.warnings.is_empty());
}

#[test]
fn test_typeorm_detection_by_content() {
    let dir = tempfile::tempdir().unwrap();
    let source = r#"
import { MigrationInterface, QueryRunner } from "typeorm";
export class M implements MigrationInterface {
    async up(q: QueryRunner) { await q.query("DROP TABLE x"); }
}
"#;
    let path = write_file(&dir, "1712-m.ts", source);
    let extraction = extract_file(&path, None).unwrap();
    assert!(extraction.sql.contains("DROP TABLE x"));
}

#[test]
fn test_unknown_format_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "m.py", "def up(): pass");
    assert!(extract_file(&path, None).is_err());
}

#[test]
fn test_explicit_format_overrides_detection() {
    let dir = tempfile::tempdir().unwrap();
    // A .txt file would not auto-detect, but an explicit format reads it raw.
    let path = write_file(&dir, "m.txt", "DROP TABLE t;");
    let extraction = extract_file(&path, Some(MigrationFormat::Sql)).unwrap();
    assert_eq!(extraction.sql, "DROP TABLE t;");
}

#[test]
fn test_missing_file_is_fatal() {
    let path = std::path::Path::new("does/not/exist.sql");
    assert!(extract_file(path, None).is_err());
}

#[test]
fn test_batch_analysis_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_file(&dir, "001.sql", "CREATE TABLE staging (id bigint);\n");
    let second = write_file(
        &dir,
        "002.sql",
        "ALTER TABLE staging ADD COLUMN x int NOT NULL;\n",
    );

    let mut analyzer = Analyzer::new(AnalyzeConfig::default());
    let report = analyzer
        .analyze_files(&[first, second], None)
        .unwrap();

    assert_eq!(report.results.len(), 2);
    assert_eq!(report.coverage.total_statements, 2);
    // The second file's table was created by the first: the lock finding is
    // filtered by visibility.
    assert!(report.results[1]
        .checks
        .iter()
        .all(|check| check.rule_id != "add-column-not-null-no-default"));
}

#[test]
fn test_format_flag_parsing() {
    assert_eq!(MigrationFormat::parse_flag("auto").unwrap(), None);
    assert_eq!(
        MigrationFormat::parse_flag("typeorm").unwrap(),
        Some(MigrationFormat::TypeOrm)
    );
    assert_eq!(
        MigrationFormat::parse_flag("PRISMA").unwrap(),
        Some(MigrationFormat::Prisma)
    );
    assert!(MigrationFormat::parse_flag("liquibase").is_err());
}
