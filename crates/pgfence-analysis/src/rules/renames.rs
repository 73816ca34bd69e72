//! RENAME rules.

use pg_query::protobuf::ObjectType;
use pg_query::NodeEnum;
use pgfence_core::{LockMode, RiskLevel};

use super::ast;
use super::types::{CheckResult, RuleContext};
use super::Rule;

/// ALTER TABLE ... RENAME COLUMN.
pub struct RenameColumn;

impl Rule for RenameColumn {
    fn ids(&self) -> &'static [&'static str] {
        &["rename-column"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let NodeEnum::RenameStmt(rename) = &ctx.statement.node else {
            return Vec::new();
        };
        if !matches!(
            ObjectType::try_from(rename.rename_type),
            Ok(ObjectType::ObjectColumn)
        ) {
            return Vec::new();
        }
        let Some(table) = ast::relation_name(rename.relation.as_ref()) else {
            return Vec::new();
        };

        vec![ctx
            .finding(
                "rename-column",
                Some(table.clone()),
                Some(LockMode::AccessExclusive),
                RiskLevel::Low,
                format!(
                    "RENAME COLUMN {} TO {} is instant but breaks queries still using the \
                     old name the moment it commits",
                    rename.subname, rename.newname
                ),
            )
            .with_rewrite(
                "Verify deploy ordering before renaming",
                vec![format!(
                    "-- confirm no running application version still references \
                     {table}.{}; renames cannot be phased",
                    rename.subname
                )],
            )]
    }
}

/// ALTER TABLE ... RENAME TO.
pub struct RenameTable;

impl Rule for RenameTable {
    fn ids(&self) -> &'static [&'static str] {
        &["rename-table"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let NodeEnum::RenameStmt(rename) = &ctx.statement.node else {
            return Vec::new();
        };
        if !matches!(
            ObjectType::try_from(rename.rename_type),
            Ok(ObjectType::ObjectTable)
        ) {
            return Vec::new();
        }
        let Some(table) = ast::relation_name(rename.relation.as_ref()) else {
            return Vec::new();
        };
        let new = rename.newname.clone();

        vec![ctx
            .finding(
                "rename-table",
                Some(table.clone()),
                Some(LockMode::AccessExclusive),
                RiskLevel::High,
                format!(
                    "RENAME TABLE {table} TO {new} breaks every query using the old name \
                     at commit; there is no grace period"
                ),
            )
            .with_rewrite(
                "Rename with a compatibility view for the old name",
                vec![
                    format!("ALTER TABLE {table} RENAME TO {new};"),
                    format!("CREATE VIEW {table} AS SELECT * FROM {new};"),
                    "-- migrate readers and writers to the new name".to_string(),
                    format!("DROP VIEW {table}; -- once nothing uses the old name"),
                ],
            )]
    }
}
