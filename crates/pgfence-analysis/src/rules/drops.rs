//! Destructive statement rules: DROP TABLE, DROP COLUMN, TRUNCATE.

use pg_query::protobuf::{AlterTableType, DropBehavior, ObjectType};
use pg_query::NodeEnum;
use pgfence_core::{LockMode, RiskLevel};

use super::ast;
use super::types::{CheckResult, RuleContext};
use super::Rule;

/// DROP TABLE.
pub struct DropTable;

impl Rule for DropTable {
    fn ids(&self) -> &'static [&'static str] {
        &["drop-table"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let NodeEnum::DropStmt(drop) = &ctx.statement.node else {
            return Vec::new();
        };
        if !matches!(
            ObjectType::try_from(drop.remove_type),
            Ok(ObjectType::ObjectTable)
        ) {
            return Vec::new();
        }

        ast::object_names(&drop.objects)
            .into_iter()
            .map(|name| {
                let table = ast::unqualified(&name).to_string();
                ctx.finding(
                    "drop-table",
                    Some(table.clone()),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::Critical,
                    format!("DROP TABLE {name} destroys the table and all its data irreversibly"),
                )
                .with_rewrite(
                    "Retire the table first, drop it a release later",
                    vec![
                        format!("ALTER TABLE {name} RENAME TO {table}_retired;"),
                        "-- run a full release cycle; anything still reading the table fails \
                         loudly instead of losing data"
                            .to_string(),
                        format!("DROP TABLE {table}_retired;"),
                    ],
                )
            })
            .collect()
    }
}

/// ALTER TABLE ... DROP COLUMN.
pub struct DropColumn;

impl Rule for DropColumn {
    fn ids(&self) -> &'static [&'static str] {
        &["drop-column"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let Some(alter) = ast::as_alter_table(&ctx.statement.node) else {
            return Vec::new();
        };
        let Some(table) = ast::relation_name(alter.relation.as_ref()) else {
            return Vec::new();
        };

        ast::commands(alter)
            .filter(|cmd| ast::subtype(cmd) == Some(AlterTableType::AtDropColumn))
            .map(|cmd| {
                let column = cmd.name.clone();
                ctx.finding(
                    "drop-column",
                    Some(table.clone()),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::High,
                    format!(
                        "DROP COLUMN {column} breaks every query still selecting it and \
                         cannot be undone without a restore"
                    ),
                )
                .with_rewrite(
                    "Contract in two releases",
                    vec![
                        "-- release 1: remove every read and write of the column from the \
                         application"
                            .to_string(),
                        format!(
                            "ALTER TABLE {table} DROP COLUMN {column}; -- release 2, once \
                             nothing references it"
                        ),
                    ],
                )
            })
            .collect()
    }
}

/// TRUNCATE, with an extra finding when CASCADE widens the blast radius.
pub struct Truncate;

impl Rule for Truncate {
    fn ids(&self) -> &'static [&'static str] {
        &["truncate", "truncate-cascade"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let NodeEnum::TruncateStmt(truncate) = &ctx.statement.node else {
            return Vec::new();
        };

        let tables: Vec<String> = truncate
            .relations
            .iter()
            .filter_map(|node| match node.node.as_ref() {
                Some(NodeEnum::RangeVar(rv)) => Some(rv.relname.clone()),
                _ => None,
            })
            .collect();

        let mut out: Vec<CheckResult> = tables
            .iter()
            .map(|table| {
                ctx.finding(
                    "truncate",
                    Some(table.clone()),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::Critical,
                    format!("TRUNCATE removes every row of {table} and cannot be rolled back \
                             once committed"),
                )
                .with_rewrite(
                    "Delete in bounded batches instead",
                    vec![
                        format!(
                            "DELETE FROM {table} WHERE <predicate> LIMIT 10000; \
                             -- repeat until zero rows"
                        ),
                        "-- or confirm a verified backup exists before truncating".to_string(),
                    ],
                )
            })
            .collect();

        if matches!(
            DropBehavior::try_from(truncate.behavior),
            Ok(DropBehavior::DropCascade)
        ) {
            out.push(
                ctx.finding(
                    "truncate-cascade",
                    tables.first().cloned(),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::Critical,
                    "TRUNCATE ... CASCADE also empties every table with a foreign key \
                     referencing the target"
                        .to_string(),
                )
                .with_rewrite(
                    "Enumerate the cascade set before running",
                    vec![
                        "SELECT conrelid::regclass FROM pg_constraint WHERE confrelid = \
                         '<table>'::regclass;"
                            .to_string(),
                        "-- truncate the listed tables explicitly, or drop CASCADE".to_string(),
                    ],
                ),
            );
        }

        out
    }
}
