//! Index build and drop rules.

use pg_query::protobuf::ObjectType;
use pg_query::NodeEnum;
use pgfence_core::{LockMode, RiskLevel};

use super::ast;
use super::types::{CheckResult, RuleContext};
use super::Rule;

/// CREATE INDEX without CONCURRENTLY.
pub struct CreateIndexNotConcurrent;

impl Rule for CreateIndexNotConcurrent {
    fn ids(&self) -> &'static [&'static str] {
        &["create-index-not-concurrent"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let NodeEnum::IndexStmt(index) = &ctx.statement.node else {
            return Vec::new();
        };
        if index.concurrent {
            return Vec::new();
        }
        let Some(table) = ast::relation_name(index.relation.as_ref()) else {
            return Vec::new();
        };
        let name = if index.idxname.is_empty() {
            "<index>".to_string()
        } else {
            index.idxname.clone()
        };

        vec![ctx
            .finding(
                "create-index-not-concurrent",
                Some(table.clone()),
                Some(LockMode::Share),
                RiskLevel::Medium,
                format!(
                    "CREATE INDEX on {table} without CONCURRENTLY holds SHARE and blocks \
                     every write for the whole build"
                ),
            )
            .with_rewrite(
                "Build the index without blocking writes",
                vec![
                    format!(
                        "CREATE INDEX CONCURRENTLY {name} ON {table} (<same column list>);"
                    ),
                    format!(
                        "-- a failed concurrent build leaves an INVALID index: \
                         DROP INDEX CONCURRENTLY {name}; and retry"
                    ),
                ],
            )]
    }
}

/// DROP INDEX without CONCURRENTLY.
pub struct DropIndexNotConcurrent;

impl Rule for DropIndexNotConcurrent {
    fn ids(&self) -> &'static [&'static str] {
        &["drop-index-not-concurrent"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let NodeEnum::DropStmt(drop) = &ctx.statement.node else {
            return Vec::new();
        };
        if !matches!(
            ObjectType::try_from(drop.remove_type),
            Ok(ObjectType::ObjectIndex)
        ) || drop.concurrent
        {
            return Vec::new();
        }

        ast::object_names(&drop.objects)
            .into_iter()
            .map(|index| {
                let short = ast::unqualified(&index).to_string();
                ctx.finding(
                    "drop-index-not-concurrent",
                    Some(short.clone()),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::Medium,
                    format!(
                        "DROP INDEX {index} without CONCURRENTLY takes ACCESS EXCLUSIVE on \
                         the indexed table"
                    ),
                )
                .with_rewrite(
                    "Drop without blocking the table",
                    vec![format!("DROP INDEX CONCURRENTLY {index};")],
                )
            })
            .collect()
    }
}
