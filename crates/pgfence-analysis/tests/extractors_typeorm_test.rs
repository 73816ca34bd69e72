//! TypeORM extractor tests.

use pgfence_analysis::extractors::{extract_source, MigrationFormat};

#[test]
fn test_lifts_template_and_string_literals() {
    let source = r#"
import { MigrationInterface, QueryRunner } from "typeorm";

export class AddStatus1712345678 implements MigrationInterface {
    public async up(queryRunner: QueryRunner): Promise<void> {
        await queryRunner.query(`ALTER TABLE users ADD COLUMN status varchar(20)`);
        await queryRunner.query("CREATE INDEX idx_users_status ON users(status)");
    }

    public async down(queryRunner: QueryRunner): Promise<void> {
        await queryRunner.query(`ALTER TABLE users DROP COLUMN status`);
    }
}
"#;
    let extraction = extract_source("m.ts", source, MigrationFormat::TypeOrm).unwrap();
    assert!(extraction.sql.contains("ADD COLUMN status varchar(20)"));
    assert!(extraction.sql.contains("CREATE INDEX idx_users_status"));
    // The down method is deliberately not analyzed.
    assert!(!extraction.sql.contains("DROP COLUMN status"));
    assert!(extraction.warnings.is_empty());
    assert!(!extraction.auto_commit);
}

#[test]
fn test_dynamic_sql_warns_instead_of_vanishing() {
    let source = r#"
export class Dyn implements MigrationInterface {
    async up(runner: QueryRunner) {
        const table = process.env.TABLE;
        await runner.query(`DROP TABLE ${table}`);
        await runner.query("DROP TABLE fixed");
    }
}
"#;
    let extraction = extract_source("m.ts", source, MigrationFormat::TypeOrm).unwrap();
    assert_eq!(extraction.warnings.len(), 1);
    assert!(extraction.warnings[0]
        .message
        .contains("Dynamic SQL — cannot statically analyze queryRunner.query()"));
    assert!(extraction.warnings[0].line > 1);
    // The static statement still comes through.
    assert!(extraction.sql.contains("DROP TABLE fixed"));
    assert!(!extraction.sql.contains("${table}"));
}

#[test]
fn test_conditional_sql_warns_but_is_included() {
    let source = r#"
export class Cond implements MigrationInterface {
    async up(q: QueryRunner) {
        if (process.env.FAST) {
            await q.query("CREATE INDEX idx ON t(x)");
        }
    }
}
"#;
    let extraction = extract_source("m.ts", source, MigrationFormat::TypeOrm).unwrap();
    assert!(extraction.sql.contains("CREATE INDEX idx"));
    assert_eq!(extraction.warnings.len(), 1);
    assert!(extraction.warnings[0].message.contains("Conditional SQL"));
}

#[test]
fn test_transaction_false_sets_auto_commit() {
    let source = r#"
export class NoTx implements MigrationInterface {
    transaction = false;

    async up(q: QueryRunner) {
        await q.query("CREATE INDEX CONCURRENTLY idx ON t(x)");
    }
}
"#;
    let extraction = extract_source("m.ts", source, MigrationFormat::TypeOrm).unwrap();
    assert!(extraction.auto_commit);
}

#[test]
fn test_missing_up_is_a_warning_not_an_error() {
    let source = "export class Nothing { async down(q: any) {} }";
    let extraction = extract_source("m.ts", source, MigrationFormat::TypeOrm).unwrap();
    assert!(extraction.sql.is_empty());
    assert_eq!(extraction.warnings.len(), 1);
    assert!(extraction.warnings[0].message.contains("up"));
}

#[test]
fn test_plain_javascript_migrations_parse_too() {
    let source = r#"
class M {
    async up(q) {
        await q.query("ALTER TABLE a DROP COLUMN b");
    }
}
module.exports = { M };
"#;
    let extraction = extract_source("m.js", source, MigrationFormat::TypeOrm).unwrap();
    assert!(extraction.sql.contains("DROP COLUMN b"));
}
