//! Property-based invariants: risk monotonicity, coverage arithmetic,
//! preview bounds, and duration parsing.

use proptest::prelude::*;

use pgfence_analysis::analyzer::{Analyzer, Coverage};
use pgfence_analysis::parser::preview;
use pgfence_analysis::policy::{parse_timeout, TimeoutValue};
use pgfence_core::{AnalyzeConfig, RiskLevel, StatsSnapshot, TableStats};

fn effective_risk_at(rows: u64) -> RiskLevel {
    let stats = StatsSnapshot::from_tables(vec![TableStats {
        schema_name: "public".to_string(),
        table_name: "users".to_string(),
        row_count: rows,
        total_bytes: 0,
    }]);
    let result = Analyzer::new(AnalyzeConfig::default())
        .with_stats(stats)
        .analyze_sql(
            "t.sql",
            "ALTER TABLE users ALTER COLUMN email SET NOT NULL;",
            Vec::new(),
            false,
        )
        .unwrap();
    result
        .checks
        .iter()
        .find(|check| check.rule_id == "alter-column-set-not-null")
        .unwrap()
        .effective_risk()
}

proptest! {
    /// More rows never lowers the adjusted risk.
    #[test]
    fn prop_risk_adjustment_is_monotonic(a in 0u64..100_000_000, b in 0u64..100_000_000) {
        let (small, large) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(effective_risk_at(small) <= effective_risk_at(large));
    }

    /// Coverage percent is within 0..=100 and analyzed + dynamic = total.
    #[test]
    fn prop_coverage_arithmetic(total in 0usize..10_000, dynamic in 0usize..10_000) {
        let coverage = Coverage::compute(total, dynamic);
        prop_assert!(coverage.coverage_percent <= 100);
        let analyzed = coverage.total_statements.saturating_sub(coverage.dynamic_statements);
        prop_assert_eq!(analyzed + coverage.dynamic_statements.min(coverage.total_statements),
            coverage.total_statements);
        if total == 0 {
            prop_assert_eq!(coverage.coverage_percent, 100);
        }
    }

    /// Previews never exceed width plus the ellipsis and never hold newlines.
    #[test]
    fn prop_preview_is_bounded(sql in ".{0,400}", width in 4usize..120) {
        let rendered = preview(&sql, width);
        prop_assert!(rendered.chars().count() <= width + 3);
        prop_assert!(!rendered.contains('\n'));
    }

    /// Seconds scale by exactly 1000 over milliseconds.
    #[test]
    fn prop_seconds_are_thousands_of_millis(value in 1u64..10_000) {
        let seconds = parse_timeout(&format!("{value}s"));
        let millis = parse_timeout(&format!("{}ms", value * 1000));
        prop_assert_eq!(seconds, millis);
        prop_assert_eq!(seconds, Some(TimeoutValue::Millis(value * 1000)));
    }
}

/// The duration grammar's documented forms.
#[test]
fn test_duration_grammar_forms() {
    assert_eq!(parse_timeout("2s"), Some(TimeoutValue::Millis(2_000)));
    assert_eq!(parse_timeout("500ms"), Some(TimeoutValue::Millis(500)));
    assert_eq!(parse_timeout("5min"), Some(TimeoutValue::Millis(300_000)));
    assert_eq!(parse_timeout("1h"), Some(TimeoutValue::Millis(3_600_000)));
    assert_eq!(parse_timeout("2 seconds"), Some(TimeoutValue::Millis(2_000)));
    assert_eq!(parse_timeout("250"), Some(TimeoutValue::Millis(250)));
    assert_eq!(parse_timeout("0"), Some(TimeoutValue::Unlimited));
    assert_eq!(parse_timeout("banana"), None);
    assert_eq!(parse_timeout("2 fortnights"), None);
}

#[test]
fn test_unlimited_exceeds_every_ceiling() {
    assert!(TimeoutValue::Unlimited.exceeds(u64::MAX));
    assert!(TimeoutValue::Millis(5_001).exceeds(5_000));
    assert!(!TimeoutValue::Millis(5_000).exceeds(5_000));
}
