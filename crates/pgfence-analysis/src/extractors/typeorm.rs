//! TypeORM migration extractor.
//!
//! Locates the migration class's `up` method, lifts literal SQL from
//! `<queryRunner>.query(...)` calls, and honors `transaction = false`.
//! The downward method is deliberately not analyzed.

use pgfence_core::errors::ExtractError;
use tree_sitter::Node;

use super::js::{
    first_identifier, literal_string, member_parts, named_arguments, walk_with_depth, HostSource,
};
use super::Extraction;

pub(crate) fn extract(file: &str, source: &str) -> Result<Extraction, ExtractError> {
    let host = HostSource::parse(file, source)?;
    let mut extraction = Extraction::default();

    let Some((class, up)) = find_up_method(&host) else {
        extraction.warnings.push(super::ExtractionWarning {
            file: file.to_string(),
            line: 1,
            column: 1,
            message: "no `up` method found — nothing to analyze".to_string(),
        });
        return Ok(extraction);
    };

    extraction.auto_commit = transaction_disabled(&host, class);

    let runner = up
        .child_by_field_name("parameters")
        .and_then(|params| {
            let mut cursor = params.walk();
            params.named_children(&mut cursor).next()
        })
        .and_then(|param| first_identifier(param, &host.source))
        .unwrap_or_else(|| "queryRunner".to_string());

    let mut sql_parts: Vec<String> = Vec::new();
    if let Some(body) = up.child_by_field_name("body") {
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
            if object.kind() != "identifier"
                || host.text(object) != runner
                || host.text(property) != "query"
            {
                return;
            }

            let argument = named_arguments(node).into_iter().next();
            match argument.and_then(|arg| literal_string(arg, &host.source)) {
                Some(sql) => {
                    if depth > 0 {
                        extraction.warnings.push(host.warn(
                            node,
                            format!(
                                "Conditional SQL at line {} — statement may or may not \
                                 execute depending on runtime condition",
                                node.start_position().row + 1
                            ),
                        ));
                    }
                    sql_parts.push(sql);
                }
                None => {
                    extraction.warnings.push(host.warn(
                        node,
                        "Dynamic SQL — cannot statically analyze queryRunner.query() argument",
                    ));
                }
            }
        });
    }

    extraction.sql = join_statements(&sql_parts);
    Ok(extraction)
}

/// The class declaring an `up` method, and that method.
fn find_up_method<'t>(host: &'t HostSource) -> Option<(Node<'t>, Node<'t>)> {
    for node in host.descendants(host.root()) {
        if !matches!(node.kind(), "class_declaration" | "class") {
            continue;
        }
        let Some(body) = node.child_by_field_name("body") else {
            continue;
        };
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            if member.kind() == "method_definition"
                && member
                    .child_by_field_name("name")
                    .is_some_and(|name| host.text(name) == "up")
            {
                return Some((node, member));
            }
        }
    }
    None
}

/// Whether the class declares `transaction = false`.
fn transaction_disabled(host: &HostSource, class: Node<'_>) -> bool {
    let Some(body) = class.child_by_field_name("body") else {
        return false;
    };
    host.descendants(body).into_iter().any(|member| {
        matches!(member.kind(), "public_field_definition" | "field_definition")
            && member
                .child_by_field_name("name")
                .is_some_and(|name| host.text(name) == "transaction")
            && member
                .child_by_field_name("value")
                .is_some_and(|value| host.text(value) == "false")
    })
}

pub(crate) fn join_statements(parts: &[String]) -> String {
    parts
        .iter()
        .map(|sql| {
            let trimmed = sql.trim();
            if trimmed.ends_with(';') {
                trimmed.to_string()
            } else {
                format!("{trimmed};")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
