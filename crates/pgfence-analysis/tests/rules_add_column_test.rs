//! ADD COLUMN rule family: NOT NULL, DEFAULT classification, json/serial/
//! generated, and the column-type preferences.

use pgfence_analysis::analyzer::Analyzer;
use pgfence_analysis::rules::CheckResult;
use pgfence_core::{AnalyzeConfig, LockMode, RiskLevel};

fn checks_with_config(sql: &str, config: AnalyzeConfig) -> Vec<CheckResult> {
    let mut analyzer = Analyzer::new(config);
    analyzer
        .analyze_sql("test.sql", sql, Vec::new(), false)
        .unwrap()
        .checks
}

fn checks(sql: &str) -> Vec<CheckResult> {
    checks_with_config(sql, AnalyzeConfig::default())
}

fn find<'a>(checks: &'a [CheckResult], rule_id: &str) -> &'a CheckResult {
    checks
        .iter()
        .find(|check| check.rule_id == rule_id)
        .unwrap_or_else(|| panic!("no {rule_id} finding in {checks:#?}"))
}

fn pg_version(version: u32) -> AnalyzeConfig {
    AnalyzeConfig {
        min_pg_version: Some(version),
        ..AnalyzeConfig::default()
    }
}

/// Seed scenario: NOT NULL without DEFAULT is HIGH with a full recipe.
#[test]
fn test_add_column_not_null_no_default() {
    let results = checks("ALTER TABLE users ADD COLUMN status varchar(20) NOT NULL;");
    let finding = find(&results, "add-column-not-null-no-default");
    assert_eq!(finding.lock_mode, Some(LockMode::AccessExclusive));
    assert_eq!(finding.base_risk, RiskLevel::High);
    assert_eq!(finding.table.as_deref(), Some("users"));
    let rewrite = finding.safe_rewrite.as_ref().expect("recipe required");
    assert!(rewrite.steps.len() >= 5, "steps: {:?}", rewrite.steps);
    assert!(rewrite.steps.iter().all(|step| !step.contains("<table>")));
    assert!(rewrite.steps[0].contains("users"));
}

/// Seed scenario: a constant DEFAULT on PG 11 is the instant path.
#[test]
fn test_add_column_constant_default_pg11() {
    let sql = "ALTER TABLE appointments ADD COLUMN priority int DEFAULT 0;";
    let results = checks_with_config(sql, pg_version(11));
    let finding = find(&results, "add-column-constant-default");
    assert_eq!(finding.base_risk, RiskLevel::Low);
    assert!(results
        .iter()
        .all(|check| check.rule_id != "add-column-default-pre-pg11"));
}

/// Seed scenario: the same statement on PG 10 rewrites the table.
#[test]
fn test_add_column_default_pre_pg11() {
    let sql = "ALTER TABLE appointments ADD COLUMN priority int DEFAULT 0;";
    let results = checks_with_config(sql, pg_version(10));
    let finding = find(&results, "add-column-default-pre-pg11");
    assert_eq!(finding.base_risk, RiskLevel::High);
    assert!(finding.safe_rewrite.is_some());
    assert!(results
        .iter()
        .all(|check| check.rule_id != "add-column-constant-default"));
}

/// A typecast around a literal still counts as constant.
#[test]
fn test_typecast_of_literal_is_constant() {
    let sql = "ALTER TABLE t ADD COLUMN flags int DEFAULT '0'::int;";
    let results = checks(sql);
    find(&results, "add-column-constant-default");
}

/// A function call is never a constant, immutability notwithstanding.
#[test]
fn test_function_default_is_not_constant() {
    let sql = "ALTER TABLE events ADD COLUMN created_at timestamptz DEFAULT now();";
    let results = checks(sql);
    let finding = find(&results, "add-column-non-constant-default");
    assert_eq!(finding.base_risk, RiskLevel::High);
    assert!(finding.safe_rewrite.is_some());
}

#[test]
fn test_add_column_json() {
    let results = checks("ALTER TABLE users ADD COLUMN prefs json;");
    let finding = find(&results, "add-column-json");
    assert_eq!(finding.base_risk, RiskLevel::Low);
    assert!(finding.applies_to_new_tables);
}

#[test]
fn test_add_column_serial() {
    let results = checks("ALTER TABLE users ADD COLUMN seq bigserial;");
    let finding = find(&results, "add-column-serial");
    assert_eq!(finding.base_risk, RiskLevel::Medium);
    assert_eq!(finding.lock_mode, Some(LockMode::AccessExclusive));
}

#[test]
fn test_add_column_stored_generated() {
    let sql = "ALTER TABLE orders ADD COLUMN total_cents bigint GENERATED ALWAYS AS (total * 100) STORED;";
    let results = checks(sql);
    let finding = find(&results, "add-column-stored-generated");
    assert_eq!(finding.base_risk, RiskLevel::High);
    assert!(finding.safe_rewrite.is_some());
}

#[test]
fn test_prefer_bigint_fires_on_create_and_add() {
    let created = checks("CREATE TABLE t (id int);");
    assert!(find(&created, "prefer-bigint-over-int").applies_to_new_tables);

    let added = checks("ALTER TABLE t ADD COLUMN counter smallint;");
    find(&added, "prefer-bigint-over-int");
}

#[test]
fn test_prefer_text_field() {
    let results = checks("ALTER TABLE t ADD COLUMN name varchar(50);");
    let finding = find(&results, "prefer-text-field");
    assert_eq!(finding.base_risk, RiskLevel::Low);
    // Unparameterized varchar is fine.
    let results = checks("ALTER TABLE t ADD COLUMN name varchar;");
    assert!(results.iter().all(|c| c.rule_id != "prefer-text-field"));
}

#[test]
fn test_prefer_timestamptz() {
    let results = checks("CREATE TABLE t (created_at timestamp);");
    find(&results, "prefer-timestamptz");
    // timestamptz itself passes.
    let results = checks("CREATE TABLE t2 (created_at timestamptz);");
    assert!(results.iter().all(|c| c.rule_id != "prefer-timestamptz"));
}
