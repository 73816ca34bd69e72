//! Partition attach/detach rules.

use pg_query::protobuf::AlterTableType;
use pgfence_core::{LockMode, RiskLevel};

use super::ast;
use super::types::{CheckResult, RuleContext};
use super::Rule;

/// ALTER TABLE ... ATTACH PARTITION.
pub struct AttachPartition;

impl Rule for AttachPartition {
    fn ids(&self) -> &'static [&'static str] {
        &["attach-partition"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let Some(alter) = ast::as_alter_table(&ctx.statement.node) else {
            return Vec::new();
        };
        let Some(parent) = ast::relation_name(alter.relation.as_ref()) else {
            return Vec::new();
        };

        ast::commands(alter)
            .filter(|cmd| ast::subtype(cmd) == Some(AlterTableType::AtAttachPartition))
            .map(|cmd| {
                let partition = ast::cmd_partition(cmd)
                    .and_then(|p| ast::relation_name(p.name.as_ref()))
                    .unwrap_or_else(|| "<partition>".to_string());
                ctx.finding(
                    "attach-partition",
                    Some(parent.clone()),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::High,
                    format!(
                        "ATTACH PARTITION {partition} scans it for bound violations while \
                         {parent} is locked exclusively"
                    ),
                )
                .with_rewrite(
                    "Prove the bound with a CHECK so the attach skips the scan",
                    vec![
                        format!(
                            "ALTER TABLE {partition} ADD CONSTRAINT {partition}_bound \
                             CHECK (<partition bound predicate>) NOT VALID;"
                        ),
                        format!("ALTER TABLE {partition} VALIDATE CONSTRAINT {partition}_bound;"),
                        format!(
                            "ALTER TABLE {parent} ATTACH PARTITION {partition} \
                             FOR VALUES <bound>; -- no scan needed"
                        ),
                        format!("ALTER TABLE {partition} DROP CONSTRAINT {partition}_bound;"),
                    ],
                )
            })
            .collect()
    }
}

/// ALTER TABLE ... DETACH PARTITION, concurrent or not.
pub struct DetachPartition;

impl Rule for DetachPartition {
    fn ids(&self) -> &'static [&'static str] {
        &["detach-partition", "detach-partition-concurrent"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let Some(alter) = ast::as_alter_table(&ctx.statement.node) else {
            return Vec::new();
        };
        let Some(parent) = ast::relation_name(alter.relation.as_ref()) else {
            return Vec::new();
        };

        ast::commands(alter)
            .filter(|cmd| ast::subtype(cmd) == Some(AlterTableType::AtDetachPartition))
            .map(|cmd| {
                let partition_cmd = ast::cmd_partition(cmd);
                let partition = partition_cmd
                    .and_then(|p| ast::relation_name(p.name.as_ref()))
                    .unwrap_or_else(|| "<partition>".to_string());
                let concurrent = partition_cmd.is_some_and(|p| p.concurrent);

                if concurrent {
                    ctx.finding(
                        "detach-partition-concurrent",
                        Some(parent.clone()),
                        Some(LockMode::ShareUpdateExclusive),
                        RiskLevel::Low,
                        format!(
                            "DETACH PARTITION {partition} CONCURRENTLY keeps {parent} \
                             readable and writable during the detach"
                        ),
                    )
                } else {
                    ctx.finding(
                        "detach-partition",
                        Some(parent.clone()),
                        Some(LockMode::AccessExclusive),
                        RiskLevel::High,
                        format!(
                            "DETACH PARTITION {partition} locks {parent} exclusively while \
                             the partition is removed from the hierarchy"
                        ),
                    )
                    .with_rewrite(
                        "Detach without blocking (PostgreSQL 14+)",
                        vec![format!(
                            "ALTER TABLE {parent} DETACH PARTITION {partition} CONCURRENTLY; \
                             -- must run outside a transaction block"
                        )],
                    )
                }
            })
            .collect()
    }
}
