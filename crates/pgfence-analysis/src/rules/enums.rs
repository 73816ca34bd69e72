//! ALTER TYPE ... ADD VALUE rule.

use pg_query::NodeEnum;
use pgfence_core::{LockMode, RiskLevel};

use super::types::{CheckResult, RuleContext};
use super::Rule;

/// ALTER TYPE ... ADD VALUE on an enum.
pub struct AlterEnumAddValue;

impl Rule for AlterEnumAddValue {
    fn ids(&self) -> &'static [&'static str] {
        &["alter-enum-add-value"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let NodeEnum::AlterEnumStmt(alter) = &ctx.statement.node else {
            return Vec::new();
        };
        // RENAME VALUE sets old_val; ADD VALUE does not.
        if !alter.old_val.is_empty() || alter.new_val.is_empty() {
            return Vec::new();
        }

        let type_name: Vec<&str> = alter
            .type_name
            .iter()
            .filter_map(|node| match node.node.as_ref() {
                Some(NodeEnum::String(value)) => Some(value.sval.as_str()),
                _ => None,
            })
            .collect();
        let type_name = type_name.join(".");

        let pg = ctx.config.effective_min_pg_version();
        let finding = if pg >= 12 {
            ctx.finding(
                "alter-enum-add-value",
                None,
                Some(LockMode::ShareUpdateExclusive),
                RiskLevel::Low,
                format!(
                    "ADD VALUE '{}' to enum {type_name} takes SHARE UPDATE EXCLUSIVE on the \
                     type and runs inside a transaction on PostgreSQL 12+",
                    alter.new_val
                ),
            )
        } else {
            ctx.finding(
                "alter-enum-add-value",
                None,
                Some(LockMode::AccessExclusive),
                RiskLevel::Medium,
                format!(
                    "before PostgreSQL 12, ADD VALUE '{}' to enum {type_name} cannot run in a \
                     transaction block and locks the type exclusively",
                    alter.new_val
                ),
            )
        };
        vec![finding]
    }
}
