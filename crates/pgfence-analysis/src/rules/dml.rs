//! DML rules.

use pg_query::NodeEnum;
use pgfence_core::{LockMode, RiskLevel};

use super::ast;
use super::types::{CheckResult, RuleContext};
use super::Rule;

/// DELETE without a WHERE clause.
pub struct DeleteWithoutWhere;

impl Rule for DeleteWithoutWhere {
    fn ids(&self) -> &'static [&'static str] {
        &["delete-without-where"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let NodeEnum::DeleteStmt(delete) = &ctx.statement.node else {
            return Vec::new();
        };
        if delete.where_clause.is_some() {
            return Vec::new();
        }
        let Some(table) = ast::relation_name(delete.relation.as_ref()) else {
            return Vec::new();
        };

        vec![ctx
            .finding(
                "delete-without-where",
                Some(table.clone()),
                Some(LockMode::RowExclusive),
                RiskLevel::High,
                format!(
                    "DELETE without WHERE removes every row of {table} and bloats the table \
                     with dead tuples in one long transaction"
                ),
            )
            .with_rewrite(
                "Scope the delete, or batch a full purge",
                vec![
                    format!("DELETE FROM {table} WHERE <predicate>;"),
                    format!(
                        "-- for a full purge, delete in bounded batches: DELETE FROM {table} \
                         WHERE ctid IN (SELECT ctid FROM {table} LIMIT 10000); and repeat"
                    ),
                ],
            )]
    }
}
