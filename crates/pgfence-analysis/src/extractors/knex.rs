//! Knex migration extractor.
//!
//! Lifts literal SQL from `knex.raw`/`knex.schema.raw` and transpiles the
//! schema-builder calls (`createTable`, `alterTable`, `dropTable`,
//! `renameTable` and their variants) into plain PostgreSQL DDL.

use pgfence_core::errors::ExtractError;
use tree_sitter::Node;

use super::js::{
    call_chain, first_identifier, literal_string, member_parts, named_arguments, walk_with_depth,
    HostSource,
};
use super::typeorm::join_statements;
use super::{Extraction, ExtractionWarning};

const BUILDER_METHODS: &[&str] = &[
    "createTable",
    "createTableIfNotExists",
    "alterTable",
    "dropTable",
    "dropTableIfExists",
    "renameTable",
];

pub(crate) fn extract(file: &str, source: &str) -> Result<Extraction, ExtractError> {
    let host = HostSource::parse(file, source)?;
    let mut warnings: Vec<ExtractionWarning> = Vec::new();
    let mut sql_parts: Vec<String> = Vec::new();

    let Some(up) = find_up_function(&host) else {
        warnings.push(ExtractionWarning {
            file: file.to_string(),
            line: 1,
            column: 1,
            message: "no `up` function found — nothing to analyze".to_string(),
        });
        return Ok(Extraction {
            sql: String::new(),
            warnings,
            auto_commit: false,
        });
    };

    let knex_param = up
        .child_by_field_name("parameters")
        .and_then(|params| {
            let mut cursor = params.walk();
            params.named_children(&mut cursor).next()
        })
        .and_then(|param| first_identifier(param, &host.source))
        .unwrap_or_else(|| "knex".to_string());
    let is_knex_root =
        |name: &str| name == knex_param || name == "knex" || name == "trx";

    let body = up.child_by_field_name("body").unwrap_or(up);
    walk_with_depth(body, 0, &mut |node, depth| {
        if node.kind() != "call_expression" {
            return;
        }
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let Some((object, property)) = member_parts(function) else {
            return;
        };
        let method = host.text(property).to_string();

        // knex.raw(...) / trx.raw(...)
        if method == "raw" && object.kind() == "identifier" && is_knex_root(host.text(object)) {
            lift_raw(&host, node, depth, &mut sql_parts, &mut warnings);
            return;
        }

        // knex.schema.<method>(...)
        let Some((schema_object, schema_property)) = member_parts(object) else {
            return;
        };
        if host.text(schema_property) != "schema"
            || schema_object.kind() != "identifier"
            || !is_knex_root(host.text(schema_object))
        {
            return;
        }

        if method == "raw" {
            lift_raw(&host, node, depth, &mut sql_parts, &mut warnings);
            return;
        }

        if !BUILDER_METHODS.contains(&method.as_str()) {
            warnings.push(host.warn(
                node,
                format!("Unsupported builder call knex.schema.{method} — cannot statically analyze"),
            ));
            return;
        }

        let produced = transpile_builder(&host, node, &method, &mut warnings);
        for sql in produced {
            if depth > 0 {
                warnings.push(host.warn(
                    node,
                    format!(
                        "Conditional SQL at line {} — statement may or may not execute \
                         depending on runtime condition",
                        node.start_position().row + 1
                    ),
                ));
            }
            sql_parts.push(sql);
        }
    });

    Ok(Extraction {
        sql: join_statements(&sql_parts),
        warnings,
        auto_commit: false,
    })
}

fn lift_raw(
    host: &HostSource,
    call: Node<'_>,
    depth: usize,
    sql_parts: &mut Vec<String>,
    warnings: &mut Vec<ExtractionWarning>,
) {
    let argument = named_arguments(call).into_iter().next();
    match argument.and_then(|arg| literal_string(arg, &host.source)) {
        Some(sql) => {
            if depth > 0 {
                warnings.push(host.warn(
                    call,
                    format!(
                        "Conditional SQL at line {} — statement may or may not execute \
                         depending on runtime condition",
                        call.start_position().row + 1
                    ),
                ));
            }
            sql_parts.push(sql);
        }
        None => {
            warnings.push(host.warn(
                call,
                "Dynamic SQL — cannot statically analyze knex.raw() argument",
            ));
        }
    }
}

/// Locate `up` in any of its export forms.
fn find_up_function<'t>(host: &'t HostSource) -> Option<Node<'t>> {
    for node in host.descendants(host.root()) {
        match node.kind() {
            // export function up(...) / function up(...)
            "function_declaration" => {
                if node
                    .child_by_field_name("name")
                    .is_some_and(|name| host.text(name) == "up")
                {
                    return Some(node);
                }
            }
            // export const up = ... / const up = ...
            "variable_declarator" => {
                if node
                    .child_by_field_name("name")
                    .is_some_and(|name| host.text(name) == "up")
                {
                    if let Some(value) = node.child_by_field_name("value") {
                        if is_function_node(value.kind()) {
                            return Some(value);
                        }
                    }
                }
            }
            // exports.up = ... / module.exports.up = ...
            "assignment_expression" => {
                let Some(left) = node.child_by_field_name("left") else {
                    continue;
                };
                let target = host.text(left);
                if target == "exports.up" || target == "module.exports.up" {
                    if let Some(right) = node.child_by_field_name("right") {
                        if is_function_node(right.kind()) {
                            return Some(right);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    None
}

fn is_function_node(kind: &str) -> bool {
    matches!(
        kind,
        "arrow_function" | "function_expression" | "function" | "generator_function"
    )
}

/// Turn one `knex.schema.<method>(...)` call into SQL statements.
fn transpile_builder(
    host: &HostSource,
    call: Node<'_>,
    method: &str,
    warnings: &mut Vec<ExtractionWarning>,
) -> Vec<String> {
    let args = named_arguments(call);
    let table = match args.first().and_then(|arg| literal_string(*arg, &host.source)) {
        Some(table) => table,
        None => {
            warnings.push(host.warn(
                call,
                format!("Dynamic table name — cannot statically analyze knex.schema.{method}() call"),
            ));
            return Vec::new();
        }
    };

    match method {
        "dropTable" => vec![format!("DROP TABLE {table}")],
        "dropTableIfExists" => vec![format!("DROP TABLE IF EXISTS {table}")],
        "renameTable" => match args.get(1).and_then(|arg| literal_string(*arg, &host.source)) {
            Some(new_name) => vec![format!("ALTER TABLE {table} RENAME TO {new_name}")],
            None => {
                warnings.push(host.warn(call, "Dynamic table name — cannot statically analyze knex.schema.renameTable() call"));
                Vec::new()
            }
        },
        "createTable" | "createTableIfNotExists" => {
            let if_not_exists = method == "createTableIfNotExists";
            transpile_create_table(host, call, &table, if_not_exists, args.get(1), warnings)
        }
        "alterTable" => transpile_alter_table(host, call, &table, args.get(1), warnings),
        _ => Vec::new(),
    }
}

fn transpile_create_table(
    host: &HostSource,
    call: Node<'_>,
    table: &str,
    if_not_exists: bool,
    callback: Option<&Node<'_>>,
    warnings: &mut Vec<ExtractionWarning>,
) -> Vec<String> {
    let Some(callback) = callback.copied().filter(|cb| is_function_node(cb.kind())) else {
        warnings.push(host.warn(call, "createTable without a builder callback — cannot statically analyze"));
        return Vec::new();
    };
    let builder_param = callback
        .child_by_field_name("parameters")
        .and_then(|params| first_identifier(params, &host.source))
        .unwrap_or_else(|| "table".to_string());

    let mut columns = Vec::new();
    for chain in builder_chains(host, callback, &builder_param) {
        if let Some(definition) = column_definition(host, &chain, warnings) {
            columns.push(definition);
        }
    }

    let clause = if if_not_exists { " IF NOT EXISTS" } else { "" };
    vec![format!(
        "CREATE TABLE{clause} {table} (\n  {}\n)",
        columns.join(",\n  ")
    )]
}

fn transpile_alter_table(
    host: &HostSource,
    call: Node<'_>,
    table: &str,
    callback: Option<&Node<'_>>,
    warnings: &mut Vec<ExtractionWarning>,
) -> Vec<String> {
    let Some(callback) = callback.copied().filter(|cb| is_function_node(cb.kind())) else {
        warnings.push(host.warn(call, "alterTable without a builder callback — cannot statically analyze"));
        return Vec::new();
    };
    let builder_param = callback
        .child_by_field_name("parameters")
        .and_then(|params| first_identifier(params, &host.source))
        .unwrap_or_else(|| "table".to_string());

    let mut statements = Vec::new();
    for chain in builder_chains(host, callback, &builder_param) {
        let first = &chain[0];
        match first.method.as_str() {
            "dropColumn" => {
                match first.args.first().and_then(|a| literal_string(*a, &host.source)) {
                    Some(column) => {
                        statements.push(format!("ALTER TABLE {table} DROP COLUMN {column}"))
                    }
                    None => warnings.push(host.warn(
                        callback,
                        "Dynamic column name — cannot statically analyze dropColumn() call",
                    )),
                }
            }
            "renameColumn" => {
                let old = first.args.first().and_then(|a| literal_string(*a, &host.source));
                let new = first.args.get(1).and_then(|a| literal_string(*a, &host.source));
                match (old, new) {
                    (Some(old), Some(new)) => statements.push(format!(
                        "ALTER TABLE {table} RENAME COLUMN {old} TO {new}"
                    )),
                    _ => warnings.push(host.warn(
                        callback,
                        "Dynamic column name — cannot statically analyze renameColumn() call",
                    )),
                }
            }
            _ => {
                if let Some(definition) = column_definition(host, &chain, warnings) {
                    statements.push(format!("ALTER TABLE {table} ADD COLUMN {definition}"));
                }
            }
        }
    }
    statements
}

/// Every fluent chain in the callback body rooted at the builder parameter.
fn builder_chains<'t>(
    host: &'t HostSource,
    callback: Node<'t>,
    builder_param: &str,
) -> Vec<Vec<super::js::ChainCall<'t>>> {
    let Some(body) = callback.child_by_field_name("body") else {
        return Vec::new();
    };
    let mut chains = Vec::new();
    let mut cursor = body.walk();
    for statement in body.named_children(&mut cursor) {
        if statement.kind() != "expression_statement" {
            continue;
        }
        let Some(expression) = statement.named_child(0) else {
            continue;
        };
        if let Some((root, calls)) = call_chain(expression, &host.source) {
            if root == builder_param && !calls.is_empty() {
                chains.push(calls);
            }
        }
    }
    chains
}

/// Builder column types → PostgreSQL types.
fn knex_type(host: &HostSource, call: &super::js::ChainCall<'_>) -> Option<String> {
    let int_arg = |index: usize| {
        call.args
            .get(index)
            .filter(|node| node.kind() == "number")
            .map(|node| host.text(*node).to_string())
    };

    Some(match call.method.as_str() {
        "increments" => "serial PRIMARY KEY".to_string(),
        "bigIncrements" => "bigserial PRIMARY KEY".to_string(),
        "string" => format!("varchar({})", int_arg(1).unwrap_or_else(|| "255".to_string())),
        "text" => "text".to_string(),
        "integer" => "integer".to_string(),
        "bigInteger" => "bigint".to_string(),
        "smallint" => "smallint".to_string(),
        "boolean" => "boolean".to_string(),
        "date" => "date".to_string(),
        "datetime" | "timestamp" => "timestamp".to_string(),
        "time" => "time".to_string(),
        "float" => "real".to_string(),
        "double" => "double precision".to_string(),
        "decimal" => match (int_arg(1), int_arg(2)) {
            (Some(precision), Some(scale)) => format!("numeric({precision},{scale})"),
            (Some(precision), None) => format!("numeric({precision})"),
            _ => "numeric(8,2)".to_string(),
        },
        "json" => "json".to_string(),
        "jsonb" => "jsonb".to_string(),
        "uuid" => "uuid".to_string(),
        "binary" => "bytea".to_string(),
        "specificType" => literal_string(*call.args.get(1)?, &host.source)?,
        _ => return None,
    })
}

/// Render one `t.<type>(name, ...).<modifiers>()` chain as a column clause.
fn column_definition(
    host: &HostSource,
    chain: &[super::js::ChainCall<'_>],
    warnings: &mut Vec<ExtractionWarning>,
) -> Option<String> {
    let type_call = &chain[0];
    let Some(sql_type) = knex_type(host, type_call) else {
        warnings.push(host.warn(
            type_call.args.first().copied().unwrap_or_else(|| host.root()),
            format!(
                "Unsupported builder call {}() — cannot statically analyze",
                type_call.method
            ),
        ));
        return None;
    };

    let name = type_call
        .args
        .first()
        .and_then(|arg| literal_string(*arg, &host.source))
        .unwrap_or_else(|| "id".to_string());

    let mut definition = format!("{name} {sql_type}");
    let mut reference_column: Option<String> = None;
    let mut reference_table: Option<String> = None;
    let mut actions = String::new();

    for modifier in &chain[1..] {
        match modifier.method.as_str() {
            "notNullable" => definition.push_str(" NOT NULL"),
            "nullable" => {}
            "primary" => definition.push_str(" PRIMARY KEY"),
            "unique" => definition.push_str(" UNIQUE"),
            "unsigned" => {}
            "defaultTo" => {
                let rendered = modifier
                    .args
                    .first()
                    .map(|arg| render_default(host, *arg))
                    .unwrap_or_else(|| "pgfence_volatile_expr()".to_string());
                definition.push_str(&format!(" DEFAULT {rendered}"));
            }
            "references" => {
                reference_column = modifier
                    .args
                    .first()
                    .and_then(|arg| literal_string(*arg, &host.source));
            }
            "inTable" => {
                reference_table = modifier
                    .args
                    .first()
                    .and_then(|arg| literal_string(*arg, &host.source));
            }
            "onDelete" => {
                if let Some(action) = modifier
                    .args
                    .first()
                    .and_then(|arg| literal_string(*arg, &host.source))
                {
                    actions.push_str(&format!(" ON DELETE {}", action.to_uppercase()));
                }
            }
            "onUpdate" => {
                if let Some(action) = modifier
                    .args
                    .first()
                    .and_then(|arg| literal_string(*arg, &host.source))
                {
                    actions.push_str(&format!(" ON UPDATE {}", action.to_uppercase()));
                }
            }
            other => {
                warnings.push(host.warn(
                    modifier.args.first().copied().unwrap_or_else(|| host.root()),
                    format!("Unsupported builder call {other}() — cannot statically analyze"),
                ));
            }
        }
    }

    if let Some(column) = reference_column {
        let clause = match (column.split_once('.'), reference_table) {
            (Some((table, column)), _) => Some(format!(" REFERENCES {table}({column})")),
            (None, Some(table)) => Some(format!(" REFERENCES {table}({column})")),
            (None, None) => None,
        };
        if let Some(clause) = clause {
            definition.push_str(&clause);
            definition.push_str(&actions);
        }
    }

    Some(definition)
}

/// Literal defaults render as SQL literals; anything else becomes the
/// volatile-expression sentinel so the analyzer treats it as non-constant.
fn render_default(host: &HostSource, node: Node<'_>) -> String {
    match node.kind() {
        "number" => host.text(node).to_string(),
        "true" => "true".to_string(),
        "false" => "false".to_string(),
        "null" => "NULL".to_string(),
        _ => match literal_string(node, &host.source) {
            Some(value) => format!("'{}'", value.replace('\'', "''")),
            None => "pgfence_volatile_expr()".to_string(),
        },
    }
}
