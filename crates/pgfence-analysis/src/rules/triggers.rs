//! Trigger rules: create, drop, enable/disable.

use pg_query::protobuf::{AlterTableType, ObjectType};
use pg_query::NodeEnum;
use pgfence_core::{LockMode, RiskLevel};

use super::ast;
use super::types::{CheckResult, RuleContext};
use super::Rule;

/// CREATE TRIGGER.
pub struct CreateTrigger;

impl Rule for CreateTrigger {
    fn ids(&self) -> &'static [&'static str] {
        &["create-trigger"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let NodeEnum::CreateTrigStmt(trigger) = &ctx.statement.node else {
            return Vec::new();
        };
        let Some(table) = ast::relation_name(trigger.relation.as_ref()) else {
            return Vec::new();
        };

        vec![ctx.finding(
            "create-trigger",
            Some(table.clone()),
            Some(LockMode::AccessExclusive),
            RiskLevel::Medium,
            format!(
                "CREATE TRIGGER {} locks {table} exclusively while it is installed and \
                 adds per-row overhead to every write afterwards",
                trigger.trigname
            ),
        )]
    }
}

/// DROP TRIGGER.
pub struct DropTrigger;

impl Rule for DropTrigger {
    fn ids(&self) -> &'static [&'static str] {
        &["drop-trigger"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let NodeEnum::DropStmt(drop) = &ctx.statement.node else {
            return Vec::new();
        };
        if !matches!(
            ObjectType::try_from(drop.remove_type),
            Ok(ObjectType::ObjectTrigger)
        ) {
            return Vec::new();
        }

        // Trigger objects are qualified as [schema,] table, trigger.
        ast::object_names(&drop.objects)
            .into_iter()
            .map(|name| {
                let mut parts = name.rsplit('.');
                let trigger = parts.next().unwrap_or(&name).to_string();
                let table = parts.next().map(str::to_string);
                ctx.finding(
                    "drop-trigger",
                    table,
                    Some(LockMode::AccessExclusive),
                    RiskLevel::Medium,
                    format!("DROP TRIGGER {trigger} takes ACCESS EXCLUSIVE on its table"),
                )
            })
            .collect()
    }
}

/// ALTER TABLE ... ENABLE/DISABLE TRIGGER.
pub struct EnableDisableTrigger;

impl Rule for EnableDisableTrigger {
    fn ids(&self) -> &'static [&'static str] {
        &["enable-disable-trigger"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let Some(alter) = ast::as_alter_table(&ctx.statement.node) else {
            return Vec::new();
        };
        let Some(table) = ast::relation_name(alter.relation.as_ref()) else {
            return Vec::new();
        };

        ast::commands(alter)
            .filter(|cmd| {
                matches!(
                    ast::subtype(cmd),
                    Some(
                        AlterTableType::AtEnableTrig
                            | AlterTableType::AtEnableAlwaysTrig
                            | AlterTableType::AtEnableReplicaTrig
                            | AlterTableType::AtEnableTrigAll
                            | AlterTableType::AtEnableTrigUser
                            | AlterTableType::AtDisableTrig
                            | AlterTableType::AtDisableTrigAll
                            | AlterTableType::AtDisableTrigUser
                    )
                )
            })
            .map(|cmd| {
                let what = if cmd.name.is_empty() {
                    "triggers".to_string()
                } else {
                    format!("trigger {}", cmd.name)
                };
                ctx.finding(
                    "enable-disable-trigger",
                    Some(table.clone()),
                    Some(LockMode::ShareRowExclusive),
                    RiskLevel::Low,
                    format!(
                        "toggling {what} on {table} takes SHARE ROW EXCLUSIVE, briefly \
                         blocking writes"
                    ),
                )
            })
            .collect()
    }
}
