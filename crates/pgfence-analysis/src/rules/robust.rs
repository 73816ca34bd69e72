//! Idempotent-DDL preference rules.

use pg_query::protobuf::ObjectType;
use pg_query::NodeEnum;
use pgfence_core::RiskLevel;

use super::ast;
use super::types::{CheckResult, RuleContext};
use super::Rule;

/// CREATE/DROP TABLE and INDEX without the idempotency clause.
pub struct RobustDdl;

impl Rule for RobustDdl {
    fn ids(&self) -> &'static [&'static str] {
        &[
            "prefer-robust-create-table",
            "prefer-robust-create-index",
            "prefer-robust-drop-table",
            "prefer-robust-drop-index",
        ]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        match &ctx.statement.node {
            NodeEnum::CreateStmt(create) if !create.if_not_exists => {
                let Some(table) = ast::relation_name(create.relation.as_ref()) else {
                    return Vec::new();
                };
                vec![ctx.finding(
                    "prefer-robust-create-table",
                    Some(table.clone()),
                    None,
                    RiskLevel::Low,
                    format!(
                        "CREATE TABLE {table} without IF NOT EXISTS fails if the migration \
                         is re-run after a partial apply"
                    ),
                )]
            }
            NodeEnum::IndexStmt(index) if !index.if_not_exists => {
                let Some(table) = ast::relation_name(index.relation.as_ref()) else {
                    return Vec::new();
                };
                vec![ctx.finding(
                    "prefer-robust-create-index",
                    Some(table),
                    None,
                    RiskLevel::Low,
                    "CREATE INDEX without IF NOT EXISTS fails on re-run; IF NOT EXISTS \
                     requires naming the index"
                        .to_string(),
                )]
            }
            NodeEnum::DropStmt(drop) if !drop.missing_ok => {
                let (rule_id, noun) = match ObjectType::try_from(drop.remove_type) {
                    Ok(ObjectType::ObjectTable) => ("prefer-robust-drop-table", "TABLE"),
                    Ok(ObjectType::ObjectIndex) => ("prefer-robust-drop-index", "INDEX"),
                    _ => return Vec::new(),
                };
                ast::object_names(&drop.objects)
                    .into_iter()
                    .map(|name| {
                        ctx.finding(
                            rule_id,
                            Some(ast::unqualified(&name).to_string()),
                            None,
                            RiskLevel::Low,
                            format!(
                                "DROP {noun} {name} without IF EXISTS fails if the object is \
                                 already gone"
                            ),
                        )
                    })
                    .collect()
            }
            _ => Vec::new(),
        }
    }
}
