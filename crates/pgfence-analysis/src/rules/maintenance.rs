//! Maintenance statement rules: VACUUM FULL, REINDEX, REFRESH MATERIALIZED VIEW.

use pg_query::protobuf::ReindexObjectType;
use pg_query::NodeEnum;
use pgfence_core::{LockMode, RiskLevel};

use super::ast;
use super::types::{CheckResult, RuleContext};
use super::Rule;

/// VACUUM FULL.
pub struct VacuumFull;

impl Rule for VacuumFull {
    fn ids(&self) -> &'static [&'static str] {
        &["vacuum-full"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let NodeEnum::VacuumStmt(vacuum) = &ctx.statement.node else {
            return Vec::new();
        };
        if !vacuum.is_vacuumcmd || ast::def_elem_named(&vacuum.options, "full").is_none() {
            return Vec::new();
        }

        let tables: Vec<Option<String>> = if vacuum.rels.is_empty() {
            vec![None]
        } else {
            vacuum
                .rels
                .iter()
                .filter_map(|node| match node.node.as_ref() {
                    Some(NodeEnum::VacuumRelation(rel)) => {
                        Some(ast::relation_name(rel.relation.as_ref()))
                    }
                    _ => None,
                })
                .collect()
        };

        tables
            .into_iter()
            .map(|table| {
                let target = table.clone().unwrap_or_else(|| "every table".to_string());
                ctx.finding(
                    "vacuum-full",
                    table,
                    Some(LockMode::AccessExclusive),
                    RiskLevel::High,
                    format!(
                        "VACUUM FULL rewrites {target} entirely under ACCESS EXCLUSIVE; \
                         plain VACUUM reclaims space without blocking"
                    ),
                )
                .with_rewrite(
                    "Reclaim space without the exclusive lock",
                    vec![
                        "VACUUM (ANALYZE) <table>; -- reclaims space for reuse, non-blocking"
                            .to_string(),
                        "-- if the table must shrink on disk, use pg_repack instead".to_string(),
                    ],
                )
            })
            .collect()
    }
}

/// REINDEX without CONCURRENTLY.
pub struct ReindexNonConcurrent;

impl Rule for ReindexNonConcurrent {
    fn ids(&self) -> &'static [&'static str] {
        &["reindex-non-concurrent"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let NodeEnum::ReindexStmt(reindex) = &ctx.statement.node else {
            return Vec::new();
        };
        if ast::def_elem_named(&reindex.params, "concurrently").is_some() {
            return Vec::new();
        }

        let kind = ReindexObjectType::try_from(reindex.kind).ok();
        let broad = matches!(
            kind,
            Some(
                ReindexObjectType::ReindexObjectSchema
                    | ReindexObjectType::ReindexObjectSystem
                    | ReindexObjectType::ReindexObjectDatabase
            )
        );
        let target = ast::relation_name(reindex.relation.as_ref())
            .or_else(|| (!reindex.name.is_empty()).then(|| reindex.name.clone()));
        let label = target.clone().unwrap_or_else(|| "the target".to_string());

        let (risk, message) = if broad {
            (
                RiskLevel::Critical,
                format!(
                    "REINDEX over {label} locks every table it touches with ACCESS \
                     EXCLUSIVE, one after another"
                ),
            )
        } else {
            (
                RiskLevel::High,
                format!("REINDEX locks {label} with ACCESS EXCLUSIVE for the whole rebuild"),
            )
        };

        vec![ctx
            .finding(
                "reindex-non-concurrent",
                target,
                Some(LockMode::AccessExclusive),
                risk,
                message,
            )
            .with_rewrite(
                "Rebuild without blocking (PostgreSQL 12+)",
                vec![format!("REINDEX INDEX CONCURRENTLY {label};")],
            )]
    }
}

/// REFRESH MATERIALIZED VIEW, concurrent or blocking.
pub struct RefreshMatView;

impl Rule for RefreshMatView {
    fn ids(&self) -> &'static [&'static str] {
        &["refresh-matview-concurrent", "refresh-matview-blocking"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let NodeEnum::RefreshMatViewStmt(refresh) = &ctx.statement.node else {
            return Vec::new();
        };
        let Some(view) = ast::relation_name(refresh.relation.as_ref()) else {
            return Vec::new();
        };

        if refresh.concurrent {
            return vec![ctx.finding(
                "refresh-matview-concurrent",
                Some(view.clone()),
                Some(LockMode::ShareUpdateExclusive),
                RiskLevel::Low,
                format!(
                    "REFRESH MATERIALIZED VIEW CONCURRENTLY keeps {view} readable; \
                     requires a unique index on the view"
                ),
            )];
        }

        let risk = if refresh.skip_data {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        };
        let detail = if refresh.skip_data {
            format!("WITH NO DATA leaves {view} unscannable until the next refresh")
        } else {
            format!("blocks every read of {view} for the full rebuild")
        };

        vec![ctx
            .finding(
                "refresh-matview-blocking",
                Some(view.clone()),
                Some(LockMode::AccessExclusive),
                risk,
                format!("REFRESH MATERIALIZED VIEW without CONCURRENTLY {detail}"),
            )
            .with_rewrite(
                "Refresh without blocking readers",
                vec![
                    format!(
                        "CREATE UNIQUE INDEX CONCURRENTLY {view}_refresh_key ON {view} (<key>); \
                         -- once"
                    ),
                    format!("REFRESH MATERIALIZED VIEW CONCURRENTLY {view};"),
                ],
            )]
    }
}
