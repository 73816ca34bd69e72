//! Shared tree-sitter plumbing for the JavaScript/TypeScript extractors.

use std::path::Path;

use pgfence_core::errors::ExtractError;
use tree_sitter::{Node, Parser, Tree};

use super::ExtractionWarning;

/// A parsed host-language source file.
pub(crate) struct HostSource {
    pub file: String,
    pub source: String,
    tree: Tree,
}

impl HostSource {
    /// Parse with the TypeScript grammar for `.ts`-family extensions, the
    /// JavaScript grammar otherwise.
    pub fn parse(file: &str, source: &str) -> Result<Self, ExtractError> {
        let extension = Path::new(file)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let language = match extension.as_str() {
            "ts" | "mts" | "cts" => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            "tsx" => tree_sitter_typescript::LANGUAGE_TSX.into(),
            _ => tree_sitter_javascript::LANGUAGE.into(),
        };

        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|err| ExtractError::HostSyntax {
                path: Path::new(file).to_path_buf(),
                message: err.to_string(),
            })?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| ExtractError::HostSyntax {
                path: Path::new(file).to_path_buf(),
                message: "tree-sitter produced no tree".to_string(),
            })?;

        Ok(Self {
            file: file.to_string(),
            source: source.to_string(),
            tree,
        })
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or_default()
    }

    pub fn warn(&self, node: Node<'_>, message: impl Into<String>) -> ExtractionWarning {
        let position = node.start_position();
        ExtractionWarning {
            file: self.file.clone(),
            line: position.row + 1,
            column: position.column + 1,
            message: message.into(),
        }
    }

    /// Every descendant of `node` (including itself), preorder.
    pub fn descendants<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut out = Vec::new();
        collect(node, &mut out);
        out
    }
}

fn collect<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    out.push(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect(child, out);
    }
}

/// AST kinds that make enclosed SQL conditional.
pub(crate) fn is_conditional(kind: &str) -> bool {
    matches!(kind, "if_statement" | "ternary_expression" | "switch_case")
}

/// Preorder walk carrying the conditional nesting depth.
pub(crate) fn walk_with_depth<'t>(
    node: Node<'t>,
    depth: usize,
    visit: &mut impl FnMut(Node<'t>, usize),
) {
    visit(node, depth);
    let child_depth = depth + usize::from(is_conditional(node.kind()));
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_with_depth(child, child_depth, visit);
    }
}

/// The value of a plain string literal or an interpolation-free template
/// literal. Anything else is dynamic.
pub(crate) fn literal_string(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "string" => Some(fragments(node, source)),
        "template_string" => {
            let mut cursor = node.walk();
            if node
                .children(&mut cursor)
                .any(|child| child.kind() == "template_substitution")
            {
                return None;
            }
            Some(fragments(node, source))
        }
        _ => None,
    }
}

fn fragments(node: Node<'_>, source: &str) -> String {
    let mut value = String::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "string_fragment" => {
                value.push_str(child.utf8_text(source.as_bytes()).unwrap_or_default());
            }
            "escape_sequence" => {
                let raw = child.utf8_text(source.as_bytes()).unwrap_or_default();
                value.push_str(&unescape(raw));
            }
            _ => {}
        }
    }
    value
}

fn unescape(sequence: &str) -> String {
    match sequence {
        "\\n" => "\n".to_string(),
        "\\r" => "\r".to_string(),
        "\\t" => "\t".to_string(),
        "\\'" => "'".to_string(),
        "\\\"" => "\"".to_string(),
        "\\`" => "`".to_string(),
        "\\\\" => "\\".to_string(),
        other => other.trim_start_matches('\\').to_string(),
    }
}

/// First identifier inside `node`, e.g. the name of a parameter pattern.
pub(crate) fn first_identifier(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() == "identifier" {
        return Some(node.utf8_text(source.as_bytes()).ok()?.to_string());
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_identifier(child, source) {
            return Some(found);
        }
    }
    None
}

/// A call in a fluent chain, e.g. `.notNullable()` or `.defaultTo(0)`.
pub(crate) struct ChainCall<'t> {
    pub method: String,
    pub args: Vec<Node<'t>>,
}

/// Decompose `root.a(x).b(y).c()` into the root identifier and the calls in
/// application order.
pub(crate) fn call_chain<'t>(
    node: Node<'t>,
    source: &str,
) -> Option<(String, Vec<ChainCall<'t>>)> {
    let mut calls = Vec::new();
    let mut current = node;

    loop {
        if current.kind() != "call_expression" {
            return None;
        }
        let function = current.child_by_field_name("function")?;
        if function.kind() != "member_expression" {
            return None;
        }
        let method = function
            .child_by_field_name("property")?
            .utf8_text(source.as_bytes())
            .ok()?
            .to_string();
        let args = named_arguments(current);
        calls.push(ChainCall { method, args });

        let object = function.child_by_field_name("object")?;
        match object.kind() {
            "identifier" => {
                calls.reverse();
                return Some((object.utf8_text(source.as_bytes()).ok()?.to_string(), calls));
            }
            "call_expression" => current = object,
            _ => return None,
        }
    }
}

/// Named children of a call's argument list.
pub(crate) fn named_arguments(call: Node<'_>) -> Vec<Node<'_>> {
    let Some(arguments) = call.child_by_field_name("arguments") else {
        return Vec::new();
    };
    let mut cursor = arguments.walk();
    arguments.named_children(&mut cursor).collect()
}

/// `object.property` member text for matching call receivers.
pub(crate) fn member_parts<'t>(node: Node<'t>) -> Option<(Node<'t>, Node<'t>)> {
    if node.kind() != "member_expression" {
        return None;
    }
    Some((
        node.child_by_field_name("object")?,
        node.child_by_field_name("property")?,
    ))
}
