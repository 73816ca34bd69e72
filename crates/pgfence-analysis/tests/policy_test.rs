//! Policy engine tests: timeouts, compounding locks, wide lock windows,
//! NOT VALID/VALIDATE pairing, and concurrent-index placement.

use pgfence_analysis::parser::parse_sql;
use pgfence_analysis::policy::{PolicyEngine, PolicyViolation, Severity};
use pgfence_core::AnalyzeConfig;

fn violations_with_config(
    sql: &str,
    auto_commit: bool,
    config: &AnalyzeConfig,
) -> Vec<PolicyViolation> {
    let statements = parse_sql("test.sql", sql).unwrap();
    PolicyEngine::new(config).check_file(&statements, auto_commit)
}

fn violations(sql: &str) -> Vec<PolicyViolation> {
    violations_with_config(sql, false, &AnalyzeConfig::default())
}

fn find<'a>(violations: &'a [PolicyViolation], rule_id: &str) -> &'a PolicyViolation {
    violations
        .iter()
        .find(|violation| violation.rule_id == rule_id)
        .unwrap_or_else(|| panic!("no {rule_id} violation in {violations:#?}"))
}

fn absent(violations: &[PolicyViolation], rule_id: &str) {
    assert!(
        violations.iter().all(|violation| violation.rule_id != rule_id),
        "unexpected {rule_id} violation"
    );
}

#[test]
fn test_missing_lock_timeout_is_an_error() {
    let all = violations("ALTER TABLE t DROP COLUMN c;");
    assert_eq!(find(&all, "missing-lock-timeout").severity, Severity::Error);
    assert_eq!(
        find(&all, "missing-statement-timeout").severity,
        Severity::Warning
    );
    find(&all, "missing-application-name");
    find(&all, "missing-idle-in-transaction-session-timeout");
}

#[test]
fn test_timeout_requirements_can_be_disabled() {
    let config = AnalyzeConfig {
        require_lock_timeout: Some(false),
        require_statement_timeout: Some(false),
        ..AnalyzeConfig::default()
    };
    let all = violations_with_config("SELECT 1;", false, &config);
    absent(&all, "missing-lock-timeout");
    absent(&all, "missing-statement-timeout");
}

#[test]
fn test_timeouts_present_are_accepted() {
    let sql = "SET lock_timeout = '2s';\nSET statement_timeout = '10min';\nALTER TABLE t DROP COLUMN c;";
    let all = violations(sql);
    absent(&all, "missing-lock-timeout");
    absent(&all, "missing-statement-timeout");
    absent(&all, "lock-timeout-too-long");
}

#[test]
fn test_lock_timeout_too_long() {
    let all = violations("SET lock_timeout = '1h';");
    assert_eq!(find(&all, "lock-timeout-too-long").severity, Severity::Warning);

    // Integer values are milliseconds.
    let all = violations("SET lock_timeout = 6000;");
    find(&all, "lock-timeout-too-long");
    let all = violations("SET lock_timeout = 4000;");
    absent(&all, "lock-timeout-too-long");

    // 0 means unlimited, which exceeds any ceiling.
    let all = violations("SET lock_timeout = 0;");
    find(&all, "lock-timeout-too-long");
}

#[test]
fn test_statement_timeout_too_long() {
    let all = violations("SET statement_timeout = '2h';");
    find(&all, "statement-timeout-too-long");
    let all = violations("SET statement_timeout = '5min';");
    absent(&all, "statement-timeout-too-long");
}

/// lock_timeout set after the first dangerous statement came too late.
#[test]
fn test_lock_timeout_ordering() {
    let sql = "ALTER TABLE t DROP COLUMN c;\nSET lock_timeout = '2s';";
    let all = violations(sql);
    assert_eq!(
        find(&all, "lock-timeout-after-dangerous-statement").severity,
        Severity::Error
    );

    let sql = "SET lock_timeout = '2s';\nALTER TABLE t DROP COLUMN c;";
    absent(&violations(sql), "lock-timeout-after-dangerous-statement");
}

/// Seed scenario: NOT VALID and VALIDATE in one transaction is an error.
#[test]
fn test_not_valid_validate_same_transaction() {
    let sql = "BEGIN;\nALTER TABLE t ADD CONSTRAINT c CHECK (x>0) NOT VALID;\nALTER TABLE t VALIDATE CONSTRAINT c;\nCOMMIT;";
    let all = violations(sql);
    assert_eq!(
        find(&all, "not-valid-validate-same-tx").severity,
        Severity::Error
    );
}

/// Outside a transaction every statement auto-commits and the pattern is the
/// recommended one.
#[test]
fn test_not_valid_validate_without_transaction_is_fine() {
    let sql = "ALTER TABLE t ADD CONSTRAINT c CHECK (x>0) NOT VALID;\nALTER TABLE t VALIDATE CONSTRAINT c;";
    absent(&violations(sql), "not-valid-validate-same-tx");
}

/// A commit between the two steps resets the tracking.
#[test]
fn test_not_valid_validate_across_transactions_is_fine() {
    let sql = "BEGIN;\nALTER TABLE t ADD CONSTRAINT c CHECK (x>0) NOT VALID;\nCOMMIT;\nBEGIN;\nALTER TABLE t VALIDATE CONSTRAINT c;\nCOMMIT;";
    absent(&violations(sql), "not-valid-validate-same-tx");
}

/// Seed scenario: two exclusively-locked tables in one transaction.
#[test]
fn test_wide_lock_window() {
    let sql = "SET lock_timeout='2s';\nBEGIN;\nALTER TABLE users ALTER COLUMN email TYPE text;\nALTER TABLE orders ALTER COLUMN status TYPE text;\nCOMMIT;";
    let all = violations(sql);
    let violation = find(&all, "wide-lock-window");
    assert_eq!(violation.severity, Severity::Warning);
    assert!(violation.message.contains("users"));
    assert!(violation.message.contains("orders"));
}

/// Re-locking the same table is not a wide window.
#[test]
fn test_same_table_relock_is_not_wide() {
    let sql = "BEGIN;\nALTER TABLE users ALTER COLUMN email TYPE text;\nALTER TABLE users DROP COLUMN legacy;\nCOMMIT;";
    absent(&violations(sql), "wide-lock-window");
}

#[test]
fn test_compounding_warning_inside_transaction() {
    let sql = "BEGIN;\nALTER TABLE users DROP COLUMN a;\nALTER TABLE users DROP COLUMN b;\nCOMMIT;";
    let all = violations(sql);
    assert_eq!(
        find(&all, "statement-after-access-exclusive").severity,
        Severity::Warning
    );
}

/// With the extractor's auto-commit hint, locks do not compound.
#[test]
fn test_compounding_suppressed_under_auto_commit() {
    let sql = "BEGIN;\nALTER TABLE users DROP COLUMN a;\nALTER TABLE users DROP COLUMN b;\nCOMMIT;";
    let all = violations_with_config(sql, true, &AnalyzeConfig::default());
    absent(&all, "statement-after-access-exclusive");
}

#[test]
fn test_no_compounding_outside_transaction() {
    let sql = "ALTER TABLE users DROP COLUMN a;\nALTER TABLE users DROP COLUMN b;";
    absent(&violations(sql), "statement-after-access-exclusive");
}

#[test]
fn test_concurrent_index_inside_transaction() {
    let sql = "BEGIN;\nCREATE INDEX CONCURRENTLY idx ON t(x);\nCOMMIT;";
    assert_eq!(
        find(&violations(sql), "concurrent-in-transaction").severity,
        Severity::Error
    );

    let sql = "CREATE INDEX CONCURRENTLY idx ON t(x);";
    absent(&violations(sql), "concurrent-in-transaction");
}

#[test]
fn test_update_without_where_warns() {
    let all = violations("UPDATE users SET active = true;");
    assert_eq!(find(&all, "update-in-migration").severity, Severity::Warning);

    let all = violations("UPDATE users SET active = true WHERE id = 7;");
    absent(&all, "update-in-migration");
}

/// DROP TRIGGER locks the trigger's table, not an object named after the
/// trigger. Re-locking the same table via another statement is not a wide
/// window, and a genuine wide window names the table.
#[test]
fn test_drop_trigger_locks_its_table() {
    let sql = "BEGIN;\nDROP TRIGGER audit ON users;\nALTER TABLE users ALTER COLUMN email TYPE text;\nCOMMIT;";
    absent(&violations(sql), "wide-lock-window");

    let sql = "BEGIN;\nDROP TRIGGER audit ON users;\nALTER TABLE orders ALTER COLUMN status TYPE text;\nCOMMIT;";
    let all = violations(sql);
    let violation = find(&all, "wide-lock-window");
    assert!(violation.message.contains("users"));
    assert!(violation.message.contains("orders"));
    assert!(!violation.message.contains("audit"));
}

/// A rollback to a savepoint drops the locks taken after it, so no wide
/// window is reported across the restore.
#[test]
fn test_savepoint_rollback_restores_lock_state() {
    let sql = "BEGIN;\nSAVEPOINT before_users;\nALTER TABLE users DROP COLUMN a;\nROLLBACK TO SAVEPOINT before_users;\nALTER TABLE orders DROP COLUMN b;\nCOMMIT;";
    absent(&violations(sql), "wide-lock-window");
}
