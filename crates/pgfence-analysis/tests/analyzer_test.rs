//! End-to-end pipeline tests: suppression, visibility, risk adjustment,
//! the CI gate, plugin isolation, and determinism.

use pgfence_analysis::analyzer::{AnalysisResult, Analyzer};
use pgfence_analysis::plugins::Plugin;
use pgfence_analysis::rules::{CheckResult, Rule, RuleContext};
use pgfence_core::{AnalyzeConfig, RiskLevel, StatsSnapshot, TableStats};

fn analyze(sql: &str) -> AnalysisResult {
    Analyzer::new(AnalyzeConfig::default())
        .analyze_sql("test.sql", sql, Vec::new(), false)
        .unwrap()
}

fn stats(table: &str, rows: u64) -> StatsSnapshot {
    StatsSnapshot::from_tables(vec![TableStats {
        schema_name: "public".to_string(),
        table_name: table.to_string(),
        row_count: rows,
        total_bytes: rows * 64,
    }])
}

/// Seed scenario: a bare ignore wipes every finding on that statement,
/// including the rest of the file's other statements' findings staying put.
#[test]
fn test_bare_suppression_end_to_end() {
    let sql = "-- pgfence-ignore\nDROP TABLE old_data;\nDROP TABLE other;";
    let result = analyze(sql);
    assert!(result
        .checks
        .iter()
        .all(|check| check.table.as_deref() != Some("old_data")));
    assert!(result
        .checks
        .iter()
        .any(|check| check.rule_id == "drop-table" && check.table.as_deref() == Some("other")));
}

/// Seed scenario: a listed ignore drops only the named rule; other findings
/// on the same statement survive.
#[test]
fn test_listed_suppression_keeps_other_rules() {
    let sql = "-- pgfence-ignore: drop-table\nDROP TABLE old_data;";
    let result = analyze(sql);
    assert!(result.checks.iter().all(|check| check.rule_id != "drop-table"));
    // The robustness preference on the same statement still fires.
    assert!(result
        .checks
        .iter()
        .any(|check| check.rule_id == "prefer-robust-drop-table"));
}

/// Tables created earlier in the file are invisible to lock rules.
#[test]
fn test_new_table_visibility_within_file() {
    let sql = "CREATE TABLE staging (id bigint);\nALTER TABLE staging ADD COLUMN x int NOT NULL;";
    let result = analyze(sql);
    assert!(result
        .checks
        .iter()
        .all(|check| check.rule_id != "add-column-not-null-no-default"));
    // Opt-in rules still apply to the new table.
    assert!(result
        .checks
        .iter()
        .any(|check| check.rule_id == "prefer-bigint-over-int"));
}

/// The accumulator carries across files in batch order.
#[test]
fn test_new_table_visibility_across_files() {
    let mut analyzer = Analyzer::new(AnalyzeConfig::default());
    analyzer
        .analyze_sql("001.sql", "CREATE TABLE staging (id bigint);", Vec::new(), false)
        .unwrap();
    let second = analyzer
        .analyze_sql(
            "002.sql",
            "ALTER TABLE staging ADD COLUMN x int NOT NULL;",
            Vec::new(),
            false,
        )
        .unwrap();
    assert!(second
        .checks
        .iter()
        .all(|check| check.rule_id != "add-column-not-null-no-default"));

    // A fresh batch sees nothing.
    let fresh = analyze("ALTER TABLE staging ADD COLUMN x int NOT NULL;");
    assert!(fresh
        .checks
        .iter()
        .any(|check| check.rule_id == "add-column-not-null-no-default"));
}

#[test]
fn test_rule_enable_disable_filters() {
    let config = AnalyzeConfig {
        disabled_rules: vec!["prefer-robust-drop-table".to_string()],
        ..AnalyzeConfig::default()
    };
    let result = Analyzer::new(config)
        .analyze_sql("test.sql", "DROP TABLE t;", Vec::new(), false)
        .unwrap();
    assert!(result.checks.iter().any(|check| check.rule_id == "drop-table"));
    assert!(result
        .checks
        .iter()
        .all(|check| check.rule_id != "prefer-robust-drop-table"));

    let config = AnalyzeConfig {
        enabled_rules: vec!["drop-table".to_string()],
        ..AnalyzeConfig::default()
    };
    let result = Analyzer::new(config)
        .analyze_sql("test.sql", "DROP TABLE t;", Vec::new(), false)
        .unwrap();
    assert!(result.checks.iter().all(|check| check.rule_id == "drop-table"));
}

/// The row-count step function, including saturation and the 10M cliff.
#[test]
fn test_risk_adjustment_steps() {
    let sql = "ALTER TABLE users ALTER COLUMN email SET NOT NULL;";
    let cases = [
        (5_000_u64, RiskLevel::Medium),
        (50_000, RiskLevel::High),
        (5_000_000, RiskLevel::Critical),
        (50_000_000, RiskLevel::Critical),
    ];
    for (rows, expected) in cases {
        let result = Analyzer::new(AnalyzeConfig::default())
            .with_stats(stats("users", rows))
            .analyze_sql("test.sql", sql, Vec::new(), false)
            .unwrap();
        let check = result
            .checks
            .iter()
            .find(|check| check.rule_id == "alter-column-set-not-null")
            .unwrap();
        assert_eq!(check.base_risk, RiskLevel::Medium);
        assert_eq!(check.effective_risk(), expected, "at {rows} rows");
    }
}

#[test]
fn test_max_risk_uses_adjusted_value() {
    let result = Analyzer::new(AnalyzeConfig::default())
        .with_stats(stats("users", 50_000))
        .analyze_sql(
            "test.sql",
            "ALTER TABLE users ALTER COLUMN email SET NOT NULL;",
            Vec::new(),
            false,
        )
        .unwrap();
    assert_eq!(result.max_risk, RiskLevel::High);
}

#[test]
fn test_max_risk_is_safe_when_no_findings() {
    let result = analyze("SELECT 1;");
    assert_eq!(result.max_risk, RiskLevel::Safe);
    assert_eq!(result.statement_count, 1);
}

/// CI fails iff risk exceeds the ceiling or an error-severity violation exists.
#[test]
fn test_ci_gate() {
    use pgfence_analysis::analyzer::{BatchReport, Coverage};

    let high = analyze("SET lock_timeout='1s';\nALTER TABLE t DROP COLUMN c;");
    let report = BatchReport {
        results: vec![high],
        coverage: Coverage::compute(2, 0),
    };
    // HIGH does not exceed the default ceiling of HIGH, but the file has a
    // missing-statement-timeout warning only — no error violations... except
    // missing-lock-timeout is satisfied here, so the gate passes on risk.
    assert!(!report.ci_failure(RiskLevel::High));
    assert!(report.ci_failure(RiskLevel::Medium));

    let erroring = analyze("ALTER TABLE t DROP COLUMN c;");
    let report = BatchReport {
        results: vec![erroring],
        coverage: Coverage::compute(1, 0),
    };
    // missing-lock-timeout is an error-severity violation: CI fails even at
    // a permissive risk ceiling.
    assert!(report.ci_failure(RiskLevel::Critical));
}

/// Running the analyzer twice on the same input yields identical results.
#[test]
fn test_determinism() {
    let sql = "SET lock_timeout='2s';\nCREATE TABLE t (id int);\nALTER TABLE users DROP COLUMN a;";
    let first = analyze(sql);
    let second = analyze(sql);
    let first_ids: Vec<_> = first.checks.iter().map(|c| (&c.rule_id, c.line)).collect();
    let second_ids: Vec<_> = second.checks.iter().map(|c| (&c.rule_id, c.line)).collect();
    assert_eq!(first_ids, second_ids);
    assert_eq!(first.max_risk, second.max_risk);
    assert_eq!(first.violations.len(), second.violations.len());
}

struct NoisyRule;

impl Rule for NoisyRule {
    fn ids(&self) -> &'static [&'static str] {
        &["plugin:acme/no-drops"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        if ctx.statement.kind == "DropStmt" {
            vec![ctx.finding(
                "plugin:acme/no-drops",
                None,
                None,
                RiskLevel::Medium,
                "acme forbids drops".to_string(),
            )]
        } else {
            Vec::new()
        }
    }
}

struct PanickyRule;

impl Rule for PanickyRule {
    fn ids(&self) -> &'static [&'static str] {
        &["plugin:acme/panics"]
    }

    fn check(&self, _ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        panic!("plugin bug");
    }
}

struct AcmePlugin {
    panicky: bool,
}

impl Plugin for AcmePlugin {
    fn name(&self) -> &str {
        "acme"
    }

    fn rules(&self) -> Vec<Box<dyn Rule>> {
        if self.panicky {
            vec![Box::new(PanickyRule)]
        } else {
            vec![Box::new(NoisyRule)]
        }
    }
}

struct BadIdPlugin;

impl Plugin for BadIdPlugin {
    fn name(&self) -> &str {
        "bad"
    }

    fn rules(&self) -> Vec<Box<dyn Rule>> {
        struct BadRule;
        impl Rule for BadRule {
            fn ids(&self) -> &'static [&'static str] {
                &["drop-table"]
            }
            fn check(&self, _ctx: &RuleContext<'_>) -> Vec<CheckResult> {
                Vec::new()
            }
        }
        vec![Box::new(BadRule)]
    }
}

#[test]
fn test_plugin_findings_flow_through_pipeline() {
    let mut analyzer = Analyzer::new(AnalyzeConfig::default());
    analyzer
        .register_plugin(&AcmePlugin { panicky: false })
        .unwrap();
    let result = analyzer
        .analyze_sql("test.sql", "DROP TABLE t;", Vec::new(), false)
        .unwrap();
    assert!(result
        .checks
        .iter()
        .any(|check| check.rule_id == "plugin:acme/no-drops"));

    // Plugin findings obey suppression like built-ins.
    let result = analyzer
        .analyze_sql(
            "test.sql",
            "-- pgfence-ignore: plugin:acme/no-drops\nDROP TABLE t2;",
            Vec::new(),
            false,
        )
        .unwrap();
    assert!(result
        .checks
        .iter()
        .all(|check| check.rule_id != "plugin:acme/no-drops"));
}

/// A panicking plugin loses its findings; the analysis continues.
#[test]
fn test_plugin_panic_is_isolated() {
    let mut analyzer = Analyzer::new(AnalyzeConfig::default());
    analyzer
        .register_plugin(&AcmePlugin { panicky: true })
        .unwrap();
    let result = analyzer
        .analyze_sql("test.sql", "DROP TABLE t;", Vec::new(), false)
        .unwrap();
    // Built-in findings are unaffected.
    assert!(result.checks.iter().any(|check| check.rule_id == "drop-table"));
    assert!(result
        .checks
        .iter()
        .all(|check| !check.rule_id.starts_with("plugin:")));
}

/// Unprefixed plugin ids are rejected at registration.
#[test]
fn test_plugin_id_must_be_namespaced() {
    let mut analyzer = Analyzer::new(AnalyzeConfig::default());
    assert!(analyzer.register_plugin(&BadIdPlugin).is_err());
}

/// DO blocks and function bodies are opaque: they surface as warnings so the
/// coverage number does not silently inflate.
#[test]
fn test_procedural_bodies_count_as_unanalyzed() {
    let result = analyze("DO $$ BEGIN DELETE FROM sessions; END $$;");
    assert_eq!(result.statement_count, 1);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].message.contains("DO block"));
    // The DELETE inside the body produces no finding.
    assert!(result
        .checks
        .iter()
        .all(|check| check.rule_id != "delete-without-where"));

    let result = analyze(
        "CREATE FUNCTION wipe() RETURNS void AS $$ DELETE FROM sessions; $$ LANGUAGE sql;",
    );
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].message.contains("function body"));
}

/// Coverage arithmetic: analyzed + dynamic = total; empty input is 100%.
#[test]
fn test_coverage_arithmetic() {
    use pgfence_analysis::analyzer::Coverage;

    let coverage = Coverage::compute(10, 3);
    assert_eq!(coverage.coverage_percent, 70);
    assert_eq!(Coverage::compute(0, 0).coverage_percent, 100);
    assert_eq!(Coverage::compute(3, 0).coverage_percent, 100);
    assert_eq!(Coverage::compute(2, 5).coverage_percent, 0);
}
