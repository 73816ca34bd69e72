//! Reporter tests: envelope shape, SARIF structure, Markdown and console
//! rendering.

use pgfence_analysis::analyzer::{Analyzer, BatchReport};
use pgfence_analysis::reporters::{available_formats, create_reporter};
use pgfence_core::AnalyzeConfig;
use serde_json::Value;

fn report_for(sql: &str) -> BatchReport {
    let mut analyzer = Analyzer::new(AnalyzeConfig::default());
    let result = analyzer
        .analyze_sql("migrations/001_drop.sql", sql, Vec::new(), false)
        .unwrap();
    let total = result.statement_count;
    BatchReport {
        results: vec![result],
        coverage: pgfence_analysis::analyzer::Coverage::compute(total, 0),
    }
}

#[test]
fn test_factory_knows_every_format() {
    for format in available_formats() {
        assert!(create_reporter(format).is_some(), "{format}");
    }
    assert!(create_reporter("xml").is_none());
}

#[test]
fn test_json_envelope_shape() {
    let report = report_for("DROP TABLE old_data;");
    let rendered = create_reporter("json").unwrap().generate(&report).unwrap();
    let value: Value = serde_json::from_str(&rendered).unwrap();

    assert_eq!(value["version"], "1.0");
    assert_eq!(value["coverage"]["totalStatements"], 1);
    assert_eq!(value["coverage"]["dynamicStatements"], 0);
    assert_eq!(value["coverage"]["coveragePercent"], 100);

    let result = &value["results"][0];
    assert_eq!(result["path"], "migrations/001_drop.sql");
    assert_eq!(result["maxRisk"], "critical");
    let checks = result["checks"].as_array().unwrap();
    let drop = checks
        .iter()
        .find(|check| check["ruleId"] == "drop-table")
        .unwrap();
    assert_eq!(drop["lockMode"], "ACCESS EXCLUSIVE");
    assert_eq!(drop["blocked"]["reads"], true);
    assert_eq!(drop["baseRisk"], "critical");
    assert!(drop["safeRewrite"]["steps"].as_array().unwrap().len() >= 2);
}

#[test]
fn test_sarif_structure_and_severity_mapping() {
    let report = report_for("DROP TABLE old_data;\nCREATE INDEX idx ON t(x);");
    let rendered = create_reporter("sarif").unwrap().generate(&report).unwrap();
    let value: Value = serde_json::from_str(&rendered).unwrap();

    assert_eq!(value["version"], "2.1.0");
    let run = &value["runs"][0];
    assert_eq!(run["tool"]["driver"]["name"], "pgfence");

    let rules = run["tool"]["driver"]["rules"].as_array().unwrap();
    assert!(rules.iter().any(|rule| rule["id"] == "drop-table"));
    // Policy rule ids carry the policy- prefix.
    assert!(rules
        .iter()
        .any(|rule| rule["id"] == "policy-missing-lock-timeout"));

    let results = run["results"].as_array().unwrap();
    let drop = results
        .iter()
        .find(|result| result["ruleId"] == "drop-table")
        .unwrap();
    assert_eq!(drop["level"], "error"); // CRITICAL → error
    let index = results
        .iter()
        .find(|result| result["ruleId"] == "create-index-not-concurrent")
        .unwrap();
    assert_eq!(index["level"], "warning"); // MEDIUM → warning
    let robust = results
        .iter()
        .find(|result| result["ruleId"] == "prefer-robust-drop-table")
        .unwrap();
    assert_eq!(robust["level"], "note"); // LOW → note

    let policy = results
        .iter()
        .find(|result| result["ruleId"] == "policy-missing-lock-timeout")
        .unwrap();
    assert_eq!(policy["level"], "error");

    // Every distinct rule id in results is registered on the driver.
    for result in results {
        let id = result["ruleId"].as_str().unwrap();
        assert!(
            rules.iter().any(|rule| rule["id"] == id),
            "unregistered rule {id}"
        );
    }
}

#[test]
fn test_github_markdown_contains_table_and_recipes() {
    let report = report_for("DROP TABLE old_data;");
    let rendered = create_reporter("github").unwrap().generate(&report).unwrap();

    assert!(rendered.contains("## pgfence migration report"));
    assert!(rendered.contains("`migrations/001_drop.sql`"));
    assert!(rendered.contains("🟥 CRITICAL"));
    assert!(rendered.contains("| Risk | Rule | Table | Lock | Message |"));
    assert!(rendered.contains("`drop-table`"));
    assert!(rendered.contains("<details>"));
    assert!(rendered.contains("```sql"));
}

#[test]
fn test_console_output_mentions_findings_and_coverage() {
    let report = report_for("DROP TABLE old_data;");
    let rendered = create_reporter("cli").unwrap().generate(&report).unwrap();

    assert!(rendered.contains("pgfence migration report"));
    assert!(rendered.contains("drop-table"));
    assert!(rendered.contains("Coverage: 100%"));
    assert!(rendered.contains("missing-lock-timeout"));
}
