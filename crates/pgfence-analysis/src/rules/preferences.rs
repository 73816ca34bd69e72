//! Column-type preference rules. These fire on new tables too.

use pg_query::protobuf::{AlterTableType, ColumnDef};
use pg_query::NodeEnum;
use pgfence_core::RiskLevel;

use super::ast;
use super::types::{CheckResult, RuleContext};
use super::Rule;

/// Every column defined by the statement, whether CREATE TABLE or ADD COLUMN.
fn defined_columns<'a>(ctx: &RuleContext<'a>) -> Vec<(String, &'a ColumnDef)> {
    match &ctx.statement.node {
        NodeEnum::CreateStmt(create) => {
            let Some(table) = ast::relation_name(create.relation.as_ref()) else {
                return Vec::new();
            };
            create
                .table_elts
                .iter()
                .filter_map(|node| match node.node.as_ref() {
                    Some(NodeEnum::ColumnDef(col)) => Some((table.clone(), col)),
                    _ => None,
                })
                .collect()
        }
        NodeEnum::AlterTableStmt(alter) => {
            let Some(table) = ast::relation_name(alter.relation.as_ref()) else {
                return Vec::new();
            };
            ast::commands(alter)
                .filter(|cmd| ast::subtype(cmd) == Some(AlterTableType::AtAddColumn))
                .filter_map(|cmd| ast::cmd_column_def(cmd))
                .map(|col| (table.clone(), col))
                .collect()
        }
        _ => Vec::new(),
    }
}

fn columns_of_type<'a>(
    ctx: &RuleContext<'a>,
    matcher: impl Fn(&str, usize) -> bool,
) -> Vec<(String, &'a ColumnDef)> {
    defined_columns(ctx)
        .into_iter()
        .filter(|(_, col)| {
            col.type_name.as_ref().is_some_and(|tn| {
                matcher(ast::type_name_last(tn).as_str(), ast::type_mod_count(tn))
            })
        })
        .collect()
}

/// Prefer bigint over int for key-sized columns.
pub struct PreferBigint;

impl Rule for PreferBigint {
    fn ids(&self) -> &'static [&'static str] {
        &["prefer-bigint-over-int"]
    }

    fn applies_to_new_tables(&self) -> bool {
        true
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        columns_of_type(ctx, |base, _| ast::INT_FAMILY.contains(&base))
            .into_iter()
            .map(|(table, col)| {
                ctx.finding(
                    "prefer-bigint-over-int",
                    Some(table.clone()),
                    None,
                    RiskLevel::Low,
                    format!(
                        "column {} is a 4-byte (or smaller) integer; if it can grow past \
                         2^31 rows or values, migrating to bigint later means a full rewrite",
                        col.colname
                    ),
                )
                .with_rewrite(
                    "Verify the expected value range before keeping int",
                    vec![format!(
                        "-- if {}.{} can exceed 2147483647, declare it bigint now",
                        table, col.colname
                    )],
                )
            })
            .collect()
    }
}

/// Prefer text over varchar(N).
pub struct PreferText;

impl Rule for PreferText {
    fn ids(&self) -> &'static [&'static str] {
        &["prefer-text-field"]
    }

    fn applies_to_new_tables(&self) -> bool {
        true
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        columns_of_type(ctx, |base, mods| base == "varchar" && mods > 0)
            .into_iter()
            .map(|(table, col)| {
                ctx.finding(
                    "prefer-text-field",
                    Some(table.clone()),
                    None,
                    RiskLevel::Low,
                    format!(
                        "column {} is varchar(N); text plus a CHECK constraint enforces the \
                         same limit and widens without DDL on the column type",
                        col.colname
                    ),
                )
                .with_rewrite(
                    "Enforce the limit with a CHECK on text",
                    vec![format!(
                        "-- {}.{} as: {} text CHECK (length({}) <= N)",
                        table, col.colname, col.colname, col.colname
                    )],
                )
            })
            .collect()
    }
}

/// Prefer timestamptz over timestamp.
pub struct PreferTimestamptz;

impl Rule for PreferTimestamptz {
    fn ids(&self) -> &'static [&'static str] {
        &["prefer-timestamptz"]
    }

    fn applies_to_new_tables(&self) -> bool {
        true
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        columns_of_type(ctx, |base, _| base == "timestamp")
            .into_iter()
            .map(|(table, col)| {
                ctx.finding(
                    "prefer-timestamptz",
                    Some(table.clone()),
                    None,
                    RiskLevel::Low,
                    format!(
                        "column {} is timestamp without time zone, which stores ambiguous \
                         wall-clock time; timestamptz records an absolute instant",
                        col.colname
                    ),
                )
            })
            .collect()
    }
}
