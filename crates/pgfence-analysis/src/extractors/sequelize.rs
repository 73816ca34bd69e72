//! Sequelize migration extractor.
//!
//! Lifts literal SQL from `<...>.sequelize.query(...)` and transpiles the
//! common `queryInterface` schema methods into PostgreSQL DDL.

use pgfence_core::errors::ExtractError;
use tree_sitter::Node;

use super::js::{
    first_identifier, literal_string, member_parts, named_arguments, walk_with_depth, HostSource,
};
use super::typeorm::join_statements;
use super::{Extraction, ExtractionWarning};

const INTERFACE_METHODS: &[&str] = &[
    "createTable",
    "addColumn",
    "removeColumn",
    "renameColumn",
    "changeColumn",
    "addIndex",
    "removeIndex",
    "dropTable",
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

    let interface_param = up
        .child_by_field_name("parameters")
        .and_then(|params| {
            let mut cursor = params.walk();
            params.named_children(&mut cursor).next()
        })
        .and_then(|param| first_identifier(param, &host.source))
        .unwrap_or_else(|| "queryInterface".to_string());

    let body = up.child_by_field_name("body").unwrap_or(up);
    walk_with_depth(body, 0, &mut |node, _depth| {
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

        // <anything>.sequelize.query(...)
        if method == "query" {
            if let Some((_, inner_property)) = member_parts(object) {
                if host.text(inner_property) == "sequelize" {
                    let argument = named_arguments(node).into_iter().next();
                    match argument.and_then(|arg| literal_string(arg, &host.source)) {
                        Some(sql) => sql_parts.push(sql),
                        None => warnings.push(host.warn(
                            node,
                            "Dynamic SQL — cannot statically analyze sequelize.query() argument",
                        )),
                    }
                }
            }
            return;
        }

        // queryInterface.<method>(...)
        if object.kind() != "identifier" {
            return;
        }
        let receiver = host.text(object);
        if receiver != interface_param && receiver != "queryInterface" {
            return;
        }
        if !INTERFACE_METHODS.contains(&method.as_str()) {
            return;
        }
        sql_parts.extend(transpile_interface(&host, node, &method, &mut warnings));
    });

    Ok(Extraction {
        sql: join_statements(&sql_parts),
        warnings,
        auto_commit: false,
    })
}

/// Locate `up` in its common forms: an `up` property or method in the
/// exported object, `exports.up = ...`, or `export const/function up`.
fn find_up_function<'t>(host: &'t HostSource) -> Option<Node<'t>> {
    for node in host.descendants(host.root()) {
        match node.kind() {
            "pair" => {
                let Some(key) = node.child_by_field_name("key") else {
                    continue;
                };
                if key_text(host, key) == "up" {
                    if let Some(value) = node.child_by_field_name("value") {
                        if is_function_node(value.kind()) {
                            return Some(value);
                        }
                    }
                }
            }
            "method_definition" => {
                if node
                    .child_by_field_name("name")
                    .is_some_and(|name| key_text(host, name) == "up")
                {
                    return Some(node);
                }
            }
            "function_declaration" => {
                if node
                    .child_by_field_name("name")
                    .is_some_and(|name| host.text(name) == "up")
                {
                    return Some(node);
                }
            }
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

fn key_text(host: &HostSource, key: Node<'_>) -> String {
    literal_string(key, &host.source).unwrap_or_else(|| host.text(key).to_string())
}

fn is_function_node(kind: &str) -> bool {
    matches!(
        kind,
        "arrow_function" | "function_expression" | "function" | "generator_function"
    )
}

fn transpile_interface(
    host: &HostSource,
    call: Node<'_>,
    method: &str,
    warnings: &mut Vec<ExtractionWarning>,
) -> Vec<String> {
    let args = named_arguments(call);
    let dynamic = |warnings: &mut Vec<ExtractionWarning>| {
        warnings.push(host.warn(
            call,
            format!(
                "Dynamic table or column name — cannot statically analyze \
                 queryInterface.{method}() call"
            ),
        ));
        Vec::new()
    };

    let Some(table) = args.first().and_then(|arg| literal_string(*arg, &host.source)) else {
        return dynamic(warnings);
    };

    match method {
        "dropTable" => vec![format!("DROP TABLE {table}")],
        "renameTable" => match args.get(1).and_then(|arg| literal_string(*arg, &host.source)) {
            Some(new_name) => vec![format!("ALTER TABLE {table} RENAME TO {new_name}")],
            None => dynamic(warnings),
        },
        "createTable" => {
            let Some(columns) = args.get(1).filter(|node| node.kind() == "object") else {
                return dynamic(warnings);
            };
            transpile_create_table(host, &table, *columns, warnings)
        }
        "addColumn" => {
            let column = args.get(1).and_then(|arg| literal_string(*arg, &host.source));
            let Some(column) = column else {
                return dynamic(warnings);
            };
            match args.get(2).map(|def| column_definition(host, *def, warnings)) {
                Some(definition) => {
                    vec![format!("ALTER TABLE {table} ADD COLUMN {column} {definition}")]
                }
                None => dynamic(warnings),
            }
        }
        "removeColumn" => match args.get(1).and_then(|arg| literal_string(*arg, &host.source)) {
            Some(column) => vec![format!("ALTER TABLE {table} DROP COLUMN {column}")],
            None => dynamic(warnings),
        },
        "renameColumn" => {
            let old = args.get(1).and_then(|arg| literal_string(*arg, &host.source));
            let new = args.get(2).and_then(|arg| literal_string(*arg, &host.source));
            match (old, new) {
                (Some(old), Some(new)) => {
                    vec![format!("ALTER TABLE {table} RENAME COLUMN {old} TO {new}")]
                }
                _ => dynamic(warnings),
            }
        }
        "changeColumn" => {
            let column = args.get(1).and_then(|arg| literal_string(*arg, &host.source));
            let Some(column) = column else {
                return dynamic(warnings);
            };
            let sql_type = args
                .get(2)
                .and_then(|def| definition_type(host, *def, warnings));
            match sql_type {
                Some(sql_type) => vec![format!(
                    "ALTER TABLE {table} ALTER COLUMN {column} TYPE {sql_type}"
                )],
                None => dynamic(warnings),
            }
        }
        "addIndex" => transpile_add_index(host, call, &table, args.get(1), warnings),
        "removeIndex" => match args.get(1).and_then(|arg| literal_string(*arg, &host.source)) {
            Some(index) => vec![format!("DROP INDEX {index}")],
            None => dynamic(warnings),
        },
        _ => Vec::new(),
    }
}

fn transpile_add_index(
    host: &HostSource,
    call: Node<'_>,
    table: &str,
    spec: Option<&Node<'_>>,
    warnings: &mut Vec<ExtractionWarning>,
) -> Vec<String> {
    let dynamic = |warnings: &mut Vec<ExtractionWarning>| {
        warnings.push(host.warn(
            call,
            "Dynamic table or column name — cannot statically analyze \
             queryInterface.addIndex() call"
                .to_string(),
        ));
        Vec::new()
    };

    let Some(spec) = spec.copied() else {
        return dynamic(warnings);
    };

    let (columns, unique, name) = match spec.kind() {
        "array" => (array_strings(host, spec), false, None),
        "object" => {
            let mut columns = None;
            let mut unique = false;
            let mut name = None;
            let mut cursor = spec.walk();
            for pair in spec.named_children(&mut cursor) {
                if pair.kind() != "pair" {
                    continue;
                }
                let (Some(key), Some(value)) = (
                    pair.child_by_field_name("key"),
                    pair.child_by_field_name("value"),
                ) else {
                    continue;
                };
                match key_text(host, key).as_str() {
                    "fields" => columns = array_strings(host, value),
                    "unique" => unique = value.kind() == "true",
                    "name" => name = literal_string(value, &host.source),
                    _ => {}
                }
            }
            (columns, unique, name)
        }
        _ => (None, false, None),
    };

    let Some(columns) = columns.filter(|cols| !cols.is_empty()) else {
        return dynamic(warnings);
    };
    let name = name.unwrap_or_else(|| format!("{table}_{}", columns.join("_")));
    let unique_clause = if unique { "UNIQUE " } else { "" };
    vec![format!(
        "CREATE {unique_clause}INDEX {name} ON {table} ({})",
        columns.join(", ")
    )]
}

/// Literal strings of an array node; `None` if any element is dynamic.
fn array_strings(host: &HostSource, node: Node<'_>) -> Option<Vec<String>> {
    if node.kind() != "array" {
        return None;
    }
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .map(|element| literal_string(element, &host.source))
        .collect()
}

fn transpile_create_table(
    host: &HostSource,
    table: &str,
    columns: Node<'_>,
    warnings: &mut Vec<ExtractionWarning>,
) -> Vec<String> {
    let mut definitions = Vec::new();
    let mut cursor = columns.walk();
    for pair in columns.named_children(&mut cursor) {
        if pair.kind() != "pair" {
            continue;
        }
        let Some(key) = pair.child_by_field_name("key") else {
            continue;
        };
        let Some(value) = pair.child_by_field_name("value") else {
            continue;
        };
        let name = key_text(host, key);
        let definition = column_definition(host, value, warnings);
        definitions.push(format!("{name} {definition}"));
    }

    vec![format!(
        "CREATE TABLE {table} (\n  {}\n)",
        definitions.join(",\n  ")
    )]
}

/// Render a column definition: either a bare datatype reference or an
/// options object with `type`, `allowNull`, `defaultValue`, and friends.
fn column_definition(
    host: &HostSource,
    definition: Node<'_>,
    warnings: &mut Vec<ExtractionWarning>,
) -> String {
    if definition.kind() != "object" {
        return datatype(host, definition, warnings);
    }

    let mut sql_type = "text".to_string();
    let mut auto_increment = false;
    let mut clauses = String::new();
    let mut reference = None;

    let mut cursor = definition.walk();
    for pair in definition.named_children(&mut cursor) {
        if pair.kind() != "pair" {
            continue;
        }
        let (Some(key), Some(value)) = (
            pair.child_by_field_name("key"),
            pair.child_by_field_name("value"),
        ) else {
            continue;
        };
        match key_text(host, key).as_str() {
            "type" => sql_type = datatype(host, value, warnings),
            "allowNull" => {
                if value.kind() == "false" {
                    clauses.push_str(" NOT NULL");
                }
            }
            "defaultValue" => {
                clauses.push_str(&format!(" DEFAULT {}", render_default(host, value)));
            }
            "primaryKey" => {
                if value.kind() == "true" {
                    clauses.push_str(" PRIMARY KEY");
                }
            }
            "unique" => {
                if value.kind() == "true" {
                    clauses.push_str(" UNIQUE");
                }
            }
            "autoIncrement" => auto_increment = value.kind() == "true",
            "references" => reference = references_clause(host, value),
            _ => {}
        }
    }

    if auto_increment {
        sql_type = match sql_type.as_str() {
            "bigint" => "bigserial".to_string(),
            "smallint" => "smallserial".to_string(),
            _ => "serial".to_string(),
        };
    }
    if let Some(reference) = reference {
        clauses.push_str(&reference);
    }

    format!("{sql_type}{clauses}")
}

/// The SQL type of a definition, bare or object-shaped.
fn definition_type(
    host: &HostSource,
    definition: Node<'_>,
    warnings: &mut Vec<ExtractionWarning>,
) -> Option<String> {
    if definition.kind() != "object" {
        return Some(datatype(host, definition, warnings));
    }
    let mut cursor = definition.walk();
    for pair in definition.named_children(&mut cursor) {
        if pair.kind() == "pair"
            && pair
                .child_by_field_name("key")
                .is_some_and(|key| key_text(host, key) == "type")
        {
            return pair
                .child_by_field_name("value")
                .map(|value| datatype(host, value, warnings));
        }
    }
    None
}

fn references_clause(host: &HostSource, value: Node<'_>) -> Option<String> {
    if value.kind() != "object" {
        return None;
    }
    let mut model = None;
    let mut key = None;
    let mut cursor = value.walk();
    for pair in value.named_children(&mut cursor) {
        if pair.kind() != "pair" {
            continue;
        }
        let (Some(pair_key), Some(pair_value)) = (
            pair.child_by_field_name("key"),
            pair.child_by_field_name("value"),
        ) else {
            continue;
        };
        match key_text(host, pair_key).as_str() {
            "model" => model = literal_string(pair_value, &host.source),
            "key" => key = literal_string(pair_value, &host.source),
            _ => {}
        }
    }
    Some(format!(
        " REFERENCES {}({})",
        model?,
        key.unwrap_or_else(|| "id".to_string())
    ))
}

/// `DataTypes.STRING`, `Sequelize.STRING(100)`, `DataTypes.DECIMAL(10,2)` →
/// the PostgreSQL type.
fn datatype(host: &HostSource, node: Node<'_>, warnings: &mut Vec<ExtractionWarning>) -> String {
    let (name, args): (String, Vec<Node<'_>>) = match node.kind() {
        "member_expression" => match node.child_by_field_name("property") {
            Some(property) => (host.text(property).to_string(), Vec::new()),
            None => (String::new(), Vec::new()),
        },
        "call_expression" => {
            let name = node
                .child_by_field_name("function")
                .and_then(member_parts)
                .map(|(_, property)| host.text(property).to_string())
                .unwrap_or_default();
            (name, named_arguments(node))
        }
        _ => (String::new(), Vec::new()),
    };

    let int_arg = |index: usize| {
        args.get(index)
            .filter(|arg| arg.kind() == "number")
            .map(|arg| host.text(*arg).to_string())
    };

    match name.as_str() {
        "STRING" => format!("varchar({})", int_arg(0).unwrap_or_else(|| "255".to_string())),
        "CHAR" => format!("char({})", int_arg(0).unwrap_or_else(|| "255".to_string())),
        "TEXT" => "text".to_string(),
        "INTEGER" => "integer".to_string(),
        "BIGINT" => "bigint".to_string(),
        "SMALLINT" => "smallint".to_string(),
        "FLOAT" | "REAL" => "real".to_string(),
        "DOUBLE" => "double precision".to_string(),
        "DECIMAL" => match (int_arg(0), int_arg(1)) {
            (Some(precision), Some(scale)) => format!("numeric({precision},{scale})"),
            (Some(precision), None) => format!("numeric({precision})"),
            _ => "numeric".to_string(),
        },
        "BOOLEAN" => "boolean".to_string(),
        "DATE" => "timestamptz".to_string(),
        "DATEONLY" => "date".to_string(),
        "TIME" => "time".to_string(),
        "UUID" => "uuid".to_string(),
        "JSON" => "json".to_string(),
        "JSONB" => "jsonb".to_string(),
        "BLOB" => "bytea".to_string(),
        "ENUM" => "text".to_string(),
        other => {
            warnings.push(host.warn(
                node,
                format!("Unsupported datatype {other} — treating as text"),
            ));
            "text".to_string()
        }
    }
}

/// Literal defaults render as SQL literals; anything else becomes the
/// volatile-expression sentinel.
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
