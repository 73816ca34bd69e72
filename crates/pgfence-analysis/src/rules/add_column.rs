//! ADD COLUMN rules: NOT NULL, DEFAULT classification, json/serial/generated.

use pg_query::protobuf::{AlterTableType, ColumnDef, ConstrType};
use pgfence_core::{LockMode, RiskLevel};

use super::ast;
use super::types::{CheckResult, RuleContext};
use super::Rule;

/// Every (table, column) pair added by the statement.
fn added_columns<'a>(ctx: &RuleContext<'a>) -> Vec<(String, &'a ColumnDef)> {
    let Some(alter) = ast::as_alter_table(&ctx.statement.node) else {
        return Vec::new();
    };
    let Some(table) = ast::relation_name(alter.relation.as_ref()) else {
        return Vec::new();
    };
    ast::commands(alter)
        .filter(|cmd| ast::subtype(cmd) == Some(AlterTableType::AtAddColumn))
        .filter_map(|cmd| ast::cmd_column_def(cmd))
        .map(|col| (table.clone(), col))
        .collect()
}

fn not_null_rewrite(table: &str, column: &str, col_type: &str) -> (String, Vec<String>) {
    let check = format!("{table}_{column}_not_null");
    (
        "Add the column nullable, backfill, then enforce NOT NULL in steps".to_string(),
        vec![
            format!("ALTER TABLE {table} ADD COLUMN {column} {col_type};"),
            format!(
                "UPDATE {table} SET {column} = <backfill value> WHERE {column} IS NULL; \
                 -- batch by primary-key range"
            ),
            format!(
                "ALTER TABLE {table} ADD CONSTRAINT {check} CHECK ({column} IS NOT NULL) NOT VALID;"
            ),
            format!("ALTER TABLE {table} VALIDATE CONSTRAINT {check};"),
            format!("ALTER TABLE {table} ALTER COLUMN {column} SET NOT NULL;"),
            format!("ALTER TABLE {table} DROP CONSTRAINT {check};"),
        ],
    )
}

fn backfill_rewrite(table: &str, column: &str, col_type: &str) -> (String, Vec<String>) {
    (
        "Add the column bare, set the default for new rows, backfill the rest".to_string(),
        vec![
            format!("ALTER TABLE {table} ADD COLUMN {column} {col_type};"),
            format!(
                "ALTER TABLE {table} ALTER COLUMN {column} SET DEFAULT <expression>; \
                 -- applies to new rows only"
            ),
            format!(
                "UPDATE {table} SET {column} = <expression> WHERE {column} IS NULL; \
                 -- batch by primary-key range"
            ),
        ],
    )
}

/// ADD COLUMN ... NOT NULL with no DEFAULT.
pub struct AddColumnNotNull;

impl Rule for AddColumnNotNull {
    fn ids(&self) -> &'static [&'static str] {
        &["add-column-not-null-no-default"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        added_columns(ctx)
            .into_iter()
            .filter(|(_, col)| ast::is_not_null(col) && ast::default_expr(col).is_none())
            .map(|(table, col)| {
                let col_type = col
                    .type_name
                    .as_ref()
                    .map(ast::render_type)
                    .unwrap_or_default();
                let (description, steps) = not_null_rewrite(&table, &col.colname, &col_type);
                ctx.finding(
                    "add-column-not-null-no-default",
                    Some(table.clone()),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::High,
                    format!(
                        "ADD COLUMN {} NOT NULL without DEFAULT fails if {} has rows and \
                         holds ACCESS EXCLUSIVE while every row is checked",
                        col.colname, table
                    ),
                )
                .with_rewrite(description, steps)
            })
            .collect()
    }
}

/// ADD COLUMN with a DEFAULT: constant vs. volatile vs. pre-11 semantics.
pub struct AddColumnDefault;

impl Rule for AddColumnDefault {
    fn ids(&self) -> &'static [&'static str] {
        &[
            "add-column-constant-default",
            "add-column-non-constant-default",
            "add-column-default-pre-pg11",
        ]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let pg = ctx.config.effective_min_pg_version();
        let mut out = Vec::new();

        for (table, col) in added_columns(ctx) {
            let Some(default) = ast::default_expr(col) else {
                continue;
            };
            let col_type = col
                .type_name
                .as_ref()
                .map(ast::render_type)
                .unwrap_or_default();

            if pg < 11 {
                let (description, steps) = backfill_rewrite(&table, &col.colname, &col_type);
                out.push(
                    ctx.finding(
                        "add-column-default-pre-pg11",
                        Some(table.clone()),
                        Some(LockMode::AccessExclusive),
                        RiskLevel::High,
                        format!(
                            "on PostgreSQL {pg}, ADD COLUMN {} with any DEFAULT rewrites all \
                             of {table} under ACCESS EXCLUSIVE",
                            col.colname
                        ),
                    )
                    .with_rewrite(description, steps),
                );
            } else if ast::is_constant_expr(default) {
                out.push(ctx.finding(
                    "add-column-constant-default",
                    Some(table.clone()),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::Low,
                    format!(
                        "ADD COLUMN {} with a constant DEFAULT is metadata-only on \
                         PostgreSQL 11+; no rewrite of {table}",
                        col.colname
                    ),
                ));
            } else {
                let (description, steps) = backfill_rewrite(&table, &col.colname, &col_type);
                out.push(
                    ctx.finding(
                        "add-column-non-constant-default",
                        Some(table.clone()),
                        Some(LockMode::AccessExclusive),
                        RiskLevel::High,
                        format!(
                            "DEFAULT for column {} is not a constant, so PostgreSQL rewrites \
                             every row of {table} under ACCESS EXCLUSIVE",
                            col.colname
                        ),
                    )
                    .with_rewrite(description, steps),
                );
            }
        }

        out
    }
}

/// ADD COLUMN of type `json`.
pub struct AddColumnJson;

impl Rule for AddColumnJson {
    fn ids(&self) -> &'static [&'static str] {
        &["add-column-json"]
    }

    fn applies_to_new_tables(&self) -> bool {
        true
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        added_columns(ctx)
            .into_iter()
            .filter(|(_, col)| {
                col.type_name
                    .as_ref()
                    .is_some_and(|tn| ast::type_name_last(tn) == "json")
            })
            .map(|(table, col)| {
                ctx.finding(
                    "add-column-json",
                    Some(table.clone()),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::Low,
                    format!(
                        "column {} uses json, which has no equality operator and cannot be \
                         indexed; jsonb supports both",
                        col.colname
                    ),
                )
                .with_rewrite(
                    "Use jsonb unless byte-exact document preservation is required",
                    vec![format!(
                        "ALTER TABLE {table} ADD COLUMN {} jsonb;",
                        col.colname
                    )],
                )
            })
            .collect()
    }
}

/// ADD COLUMN of a serial type.
pub struct AddColumnSerial;

impl Rule for AddColumnSerial {
    fn ids(&self) -> &'static [&'static str] {
        &["add-column-serial"]
    }

    fn applies_to_new_tables(&self) -> bool {
        true
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        added_columns(ctx)
            .into_iter()
            .filter(|(_, col)| {
                col.type_name
                    .as_ref()
                    .is_some_and(|tn| ast::SERIAL_FAMILY.contains(&ast::type_name_last(tn).as_str()))
            })
            .map(|(table, col)| {
                ctx.finding(
                    "add-column-serial",
                    Some(table.clone()),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::Medium,
                    format!(
                        "serial column {} assigns a sequence value to every existing row of \
                         {table} while ACCESS EXCLUSIVE is held",
                        col.colname
                    ),
                )
            })
            .collect()
    }
}

/// ADD COLUMN ... GENERATED ALWAYS AS (...) STORED.
pub struct AddColumnGenerated;

impl Rule for AddColumnGenerated {
    fn ids(&self) -> &'static [&'static str] {
        &["add-column-stored-generated"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        added_columns(ctx)
            .into_iter()
            .filter(|(_, col)| ast::has_constraint(col, ConstrType::ConstrGenerated))
            .map(|(table, col)| {
                ctx.finding(
                    "add-column-stored-generated",
                    Some(table.clone()),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::High,
                    format!(
                        "stored generated column {} is computed and written for every row of \
                         {table} under ACCESS EXCLUSIVE",
                        col.colname
                    ),
                )
                .with_rewrite(
                    "Backfill a plain column, keep it current, and swap later",
                    vec![
                        format!("ALTER TABLE {table} ADD COLUMN {}_plain <type>;", col.colname),
                        format!(
                            "UPDATE {table} SET {0}_plain = <expression> WHERE {0}_plain IS NULL; \
                             -- batch by primary-key range",
                            col.colname
                        ),
                        "-- keep the value current from application code or a trigger".to_string(),
                        "-- swap names in a later release once readers have migrated".to_string(),
                    ],
                )
            })
            .collect()
    }
}
