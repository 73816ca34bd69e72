//! ALTER COLUMN rules: TYPE changes and SET NOT NULL.

use pg_query::protobuf::AlterTableType;
use pgfence_core::{LockMode, RiskLevel};

use super::ast;
use super::types::{CheckResult, RuleContext};
use super::Rule;

/// ALTER COLUMN ... TYPE, classified by how expensive the conversion is.
pub struct AlterColumnType;

impl Rule for AlterColumnType {
    fn ids(&self) -> &'static [&'static str] {
        &["alter-column-type"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let Some(alter) = ast::as_alter_table(&ctx.statement.node) else {
            return Vec::new();
        };
        let Some(table) = ast::relation_name(alter.relation.as_ref()) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for cmd in ast::commands(alter) {
            if ast::subtype(cmd) != Some(AlterTableType::AtAlterColumnType) {
                continue;
            }
            let Some(def) = ast::cmd_column_def(cmd) else {
                continue;
            };
            let Some(type_name) = def.type_name.as_ref() else {
                continue;
            };
            let column = cmd.name.clone();
            let base = ast::type_name_last(type_name);
            let mods = ast::type_mod_count(type_name);
            let rendered = ast::render_type(type_name);

            let finding = if base == "text" || (base == "varchar" && mods == 0) {
                ctx.finding(
                    "alter-column-type",
                    Some(table.clone()),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::Low,
                    format!(
                        "changing {table}.{column} to {rendered} is binary-compatible from \
                         varchar/char and skips the rewrite, but still takes ACCESS EXCLUSIVE"
                    ),
                )
                .with_rewrite(
                    "Verify the current type before relying on the no-rewrite path",
                    vec![verify_column_step(ctx, &table, &column)],
                )
            } else if (base == "varchar" || base == "numeric") && mods > 0 {
                ctx.finding(
                    "alter-column-type",
                    Some(table.clone()),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::Medium,
                    format!(
                        "changing {table}.{column} to {rendered} is metadata-only when it \
                         widens the current limit, a full rewrite otherwise"
                    ),
                )
                .with_rewrite(
                    "Confirm the change widens the declared limit",
                    vec![verify_column_step(ctx, &table, &column)],
                )
            } else {
                ctx.finding(
                    "alter-column-type",
                    Some(table.clone()),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::High,
                    format!(
                        "changing {table}.{column} to {rendered} rewrites the whole table \
                         and every index on it under ACCESS EXCLUSIVE"
                    ),
                )
                .with_rewrite(
                    "Expand/contract: add a new column, dual-write, backfill, swap",
                    vec![
                        format!("ALTER TABLE {table} ADD COLUMN {column}_new {rendered};"),
                        format!(
                            "UPDATE {table} SET {column}_new = {column}::{rendered} \
                             WHERE {column}_new IS NULL; -- batch by primary-key range"
                        ),
                        "-- dual-write both columns from the application during the transition"
                            .to_string(),
                        format!("ALTER TABLE {table} RENAME COLUMN {column} TO {column}_old;"),
                        format!("ALTER TABLE {table} RENAME COLUMN {column}_new TO {column};"),
                        format!(
                            "ALTER TABLE {table} DROP COLUMN {column}_old; -- in a later release"
                        ),
                    ],
                )
            };
            out.push(finding);
        }
        out
    }
}

/// The verify step, sharpened with the snapshot's declared length when known.
fn verify_column_step(ctx: &RuleContext<'_>, table: &str, column: &str) -> String {
    if let Some(current) = ctx
        .snapshot
        .and_then(|snapshot| snapshot.column(table, column))
    {
        let length = current
            .character_maximum_length
            .map(|len| format!("({len})"))
            .unwrap_or_default();
        return format!(
            "-- snapshot says {table}.{column} is currently {}{length}; \
             the change must not narrow it",
            current.udt_name
        );
    }
    format!(
        "SELECT data_type, character_maximum_length FROM information_schema.columns \
         WHERE table_name = '{table}' AND column_name = '{column}';"
    )
}

/// ALTER COLUMN ... SET NOT NULL.
pub struct SetNotNull;

impl Rule for SetNotNull {
    fn ids(&self) -> &'static [&'static str] {
        &["alter-column-set-not-null"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let Some(alter) = ast::as_alter_table(&ctx.statement.node) else {
            return Vec::new();
        };
        let Some(table) = ast::relation_name(alter.relation.as_ref()) else {
            return Vec::new();
        };

        ast::commands(alter)
            .filter(|cmd| ast::subtype(cmd) == Some(AlterTableType::AtSetNotNull))
            .map(|cmd| {
                let column = cmd.name.clone();
                let check = format!("{table}_{column}_not_null");
                ctx.finding(
                    "alter-column-set-not-null",
                    Some(table.clone()),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::Medium,
                    format!(
                        "SET NOT NULL scans all of {table} under ACCESS EXCLUSIVE; \
                         PostgreSQL 12+ skips the scan when a validated CHECK proves it"
                    ),
                )
                .with_rewrite(
                    "Prove the invariant with a NOT VALID check first",
                    vec![
                        format!(
                            "ALTER TABLE {table} ADD CONSTRAINT {check} \
                             CHECK ({column} IS NOT NULL) NOT VALID;"
                        ),
                        format!("ALTER TABLE {table} VALIDATE CONSTRAINT {check};"),
                        format!("ALTER TABLE {table} ALTER COLUMN {column} SET NOT NULL;"),
                        format!("ALTER TABLE {table} DROP CONSTRAINT {check};"),
                    ],
                )
            })
            .collect()
    }
}
