//! ADD CONSTRAINT and VALIDATE CONSTRAINT rules.

use pg_query::protobuf::{AlterTableType, ConstrType, Constraint};
use pgfence_core::{LockMode, RiskLevel};

use super::ast;
use super::types::{CheckResult, RuleContext};
use super::Rule;

/// Every (table, constraint) added by the statement.
fn added_constraints<'a>(ctx: &RuleContext<'a>) -> Vec<(String, &'a Constraint)> {
    let Some(alter) = ast::as_alter_table(&ctx.statement.node) else {
        return Vec::new();
    };
    let Some(table) = ast::relation_name(alter.relation.as_ref()) else {
        return Vec::new();
    };
    ast::commands(alter)
        .filter(|cmd| ast::subtype(cmd) == Some(AlterTableType::AtAddConstraint))
        .filter_map(|cmd| ast::cmd_constraint(cmd))
        .map(|constraint| (table.clone(), constraint))
        .collect()
}

fn constraint_label(constraint: &Constraint) -> String {
    if constraint.conname.is_empty() {
        "<unnamed>".to_string()
    } else {
        constraint.conname.clone()
    }
}

/// ADD FOREIGN KEY without NOT VALID.
pub struct AddForeignKey;

impl Rule for AddForeignKey {
    fn ids(&self) -> &'static [&'static str] {
        &["add-constraint-fk-no-not-valid"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        added_constraints(ctx)
            .into_iter()
            .filter(|(_, c)| {
                ast::constraint_type(c) == Some(ConstrType::ConstrForeign) && !c.skip_validation
            })
            .map(|(table, c)| {
                let name = constraint_label(c);
                let referenced = c
                    .pktable
                    .as_ref()
                    .map(|rv| rv.relname.clone())
                    .unwrap_or_else(|| "<referenced>".to_string());
                ctx.finding(
                    "add-constraint-fk-no-not-valid",
                    Some(table.clone()),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::High,
                    format!(
                        "ADD FOREIGN KEY {name} validates every row of {table} against \
                         {referenced} while holding ACCESS EXCLUSIVE on both"
                    ),
                )
                .with_rewrite(
                    "Create the constraint NOT VALID, then validate separately",
                    vec![
                        format!(
                            "ALTER TABLE {table} ADD CONSTRAINT {name} FOREIGN KEY (...) \
                             REFERENCES {referenced} (...) NOT VALID;"
                        ),
                        format!(
                            "ALTER TABLE {table} VALIDATE CONSTRAINT {name}; \
                             -- SHARE UPDATE EXCLUSIVE only"
                        ),
                    ],
                )
            })
            .collect()
    }
}

/// ADD CHECK without NOT VALID.
pub struct AddCheck;

impl Rule for AddCheck {
    fn ids(&self) -> &'static [&'static str] {
        &["add-constraint-check-no-not-valid"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        added_constraints(ctx)
            .into_iter()
            .filter(|(_, c)| {
                ast::constraint_type(c) == Some(ConstrType::ConstrCheck) && !c.skip_validation
            })
            .map(|(table, c)| {
                let name = constraint_label(c);
                ctx.finding(
                    "add-constraint-check-no-not-valid",
                    Some(table.clone()),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::Medium,
                    format!(
                        "ADD CHECK {name} scans all of {table} under ACCESS EXCLUSIVE; \
                         NOT VALID defers the scan to a weaker lock"
                    ),
                )
                .with_rewrite(
                    "Create the constraint NOT VALID, then validate separately",
                    vec![
                        format!(
                            "ALTER TABLE {table} ADD CONSTRAINT {name} CHECK (...) NOT VALID;"
                        ),
                        format!(
                            "ALTER TABLE {table} VALIDATE CONSTRAINT {name}; \
                             -- SHARE UPDATE EXCLUSIVE only"
                        ),
                    ],
                )
            })
            .collect()
    }
}

/// ADD UNIQUE, with or without USING INDEX.
pub struct AddUnique;

impl Rule for AddUnique {
    fn ids(&self) -> &'static [&'static str] {
        &["add-constraint-unique-using-index", "add-constraint-unique"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        added_constraints(ctx)
            .into_iter()
            .filter(|(_, c)| ast::constraint_type(c) == Some(ConstrType::ConstrUnique))
            .map(|(table, c)| {
                let name = constraint_label(c);
                if !c.indexname.is_empty() {
                    ctx.finding(
                        "add-constraint-unique-using-index",
                        Some(table.clone()),
                        Some(LockMode::AccessExclusive),
                        RiskLevel::Low,
                        format!(
                            "UNIQUE USING INDEX {} attaches an existing index; the ACCESS \
                             EXCLUSIVE window is brief",
                            c.indexname
                        ),
                    )
                } else {
                    let keys = ast::constraint_keys(c);
                    let index = suggested_index_name(&table, &keys, "key");
                    let columns = column_list(&keys);
                    ctx.finding(
                        "add-constraint-unique",
                        Some(table.clone()),
                        Some(LockMode::AccessExclusive),
                        RiskLevel::High,
                        format!(
                            "ADD UNIQUE {name} builds its index inside the ACCESS EXCLUSIVE \
                             window, blocking all access to {table} for the whole build"
                        ),
                    )
                    .with_rewrite(
                        "Build the index concurrently, then attach it",
                        vec![
                            format!(
                                "CREATE UNIQUE INDEX CONCURRENTLY {index} ON {table} ({columns});"
                            ),
                            format!(
                                "ALTER TABLE {table} ADD CONSTRAINT {name} UNIQUE \
                                 USING INDEX {index};"
                            ),
                        ],
                    )
                }
            })
            .collect()
    }
}

/// ADD PRIMARY KEY, with or without USING INDEX.
pub struct AddPrimaryKey;

impl Rule for AddPrimaryKey {
    fn ids(&self) -> &'static [&'static str] {
        &["add-pk-using-index", "add-pk-without-using-index"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        added_constraints(ctx)
            .into_iter()
            .filter(|(_, c)| ast::constraint_type(c) == Some(ConstrType::ConstrPrimary))
            .map(|(table, c)| {
                let name = constraint_label(c);
                if !c.indexname.is_empty() {
                    ctx.finding(
                        "add-pk-using-index",
                        Some(table.clone()),
                        Some(LockMode::AccessExclusive),
                        RiskLevel::Low,
                        format!(
                            "PRIMARY KEY USING INDEX {} attaches an existing unique index; \
                             the ACCESS EXCLUSIVE window is brief",
                            c.indexname
                        ),
                    )
                } else {
                    let keys = ast::constraint_keys(c);
                    let index = suggested_index_name(&table, &keys, "pkey");
                    let columns = column_list(&keys);
                    ctx.finding(
                        "add-pk-without-using-index",
                        Some(table.clone()),
                        Some(LockMode::AccessExclusive),
                        RiskLevel::High,
                        format!(
                            "ADD PRIMARY KEY {name} builds its index and checks NOT NULL \
                             inside the ACCESS EXCLUSIVE window on {table}"
                        ),
                    )
                    .with_rewrite(
                        "Build the index concurrently, then attach it",
                        vec![
                            format!(
                                "CREATE UNIQUE INDEX CONCURRENTLY {index} ON {table} ({columns});"
                            ),
                            format!(
                                "-- ensure the key columns are already NOT NULL \
                                 (see alter-column-set-not-null)"
                            ),
                            format!(
                                "ALTER TABLE {table} ADD CONSTRAINT {name} PRIMARY KEY \
                                 USING INDEX {index};"
                            ),
                        ],
                    )
                }
            })
            .collect()
    }
}

/// ADD EXCLUDE.
pub struct AddExclude;

impl Rule for AddExclude {
    fn ids(&self) -> &'static [&'static str] {
        &["add-constraint-exclude"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        added_constraints(ctx)
            .into_iter()
            .filter(|(_, c)| ast::constraint_type(c) == Some(ConstrType::ConstrExclusion))
            .map(|(table, c)| {
                let name = constraint_label(c);
                ctx.finding(
                    "add-constraint-exclude",
                    Some(table.clone()),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::High,
                    format!(
                        "ADD EXCLUDE {name} builds a new index under ACCESS EXCLUSIVE; \
                         exclusion constraints cannot be added NOT VALID or USING INDEX"
                    ),
                )
                .with_rewrite(
                    "Bound the lock wait and run during low traffic",
                    vec![
                        "SET lock_timeout = '2s';".to_string(),
                        format!(
                            "ALTER TABLE {table} ADD CONSTRAINT {name} EXCLUDE (...); \
                             -- retry with backoff until it wins the lock"
                        ),
                        "-- schedule during the lowest-traffic window available".to_string(),
                    ],
                )
            })
            .collect()
    }
}

/// VALIDATE CONSTRAINT.
pub struct ValidateConstraint;

impl Rule for ValidateConstraint {
    fn ids(&self) -> &'static [&'static str] {
        &["validate-constraint"]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let Some(alter) = ast::as_alter_table(&ctx.statement.node) else {
            return Vec::new();
        };
        let Some(table) = ast::relation_name(alter.relation.as_ref()) else {
            return Vec::new();
        };

        ast::commands(alter)
            .filter(|cmd| ast::subtype(cmd) == Some(AlterTableType::AtValidateConstraint))
            .map(|cmd| {
                ctx.finding(
                    "validate-constraint",
                    Some(table.clone()),
                    Some(LockMode::ShareUpdateExclusive),
                    RiskLevel::Low,
                    format!(
                        "VALIDATE CONSTRAINT {} scans {table} under SHARE UPDATE EXCLUSIVE; \
                         reads and writes continue",
                        cmd.name
                    ),
                )
            })
            .collect()
    }
}

fn suggested_index_name(table: &str, keys: &[String], suffix: &str) -> String {
    if keys.is_empty() {
        format!("{table}_{suffix}")
    } else {
        format!("{table}_{}_{suffix}", keys.join("_"))
    }
}

fn column_list(keys: &[String]) -> String {
    if keys.is_empty() {
        "...".to_string()
    } else {
        keys.join(", ")
    }
}
