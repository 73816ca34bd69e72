//! Shared pg_query AST destructuring helpers for rules and the policy engine.

use pg_query::protobuf::{
    AlterTableCmd, AlterTableStmt, AlterTableType, ColumnDef, ConstrType, Constraint, DefElem,
    Node, PartitionCmd, RangeVar, TypeName,
};
use pg_query::NodeEnum;

pub(crate) fn as_alter_table(node: &NodeEnum) -> Option<&AlterTableStmt> {
    match node {
        NodeEnum::AlterTableStmt(stmt) => Some(stmt),
        _ => None,
    }
}

pub(crate) fn relation_name(relation: Option<&RangeVar>) -> Option<String> {
    relation.map(|rv| rv.relname.clone())
}

pub(crate) fn commands(stmt: &AlterTableStmt) -> impl Iterator<Item = &AlterTableCmd> {
    stmt.cmds.iter().filter_map(|node| match node.node.as_ref() {
        Some(NodeEnum::AlterTableCmd(cmd)) => Some(cmd),
        _ => None,
    })
}

pub(crate) fn subtype(cmd: &AlterTableCmd) -> Option<AlterTableType> {
    AlterTableType::try_from(cmd.subtype).ok()
}

pub(crate) fn cmd_column_def(cmd: &AlterTableCmd) -> Option<&ColumnDef> {
    match cmd.def.as_ref()?.node.as_ref()? {
        NodeEnum::ColumnDef(def) => Some(def),
        _ => None,
    }
}

pub(crate) fn cmd_constraint(cmd: &AlterTableCmd) -> Option<&Constraint> {
    match cmd.def.as_ref()?.node.as_ref()? {
        NodeEnum::Constraint(constraint) => Some(constraint),
        _ => None,
    }
}

pub(crate) fn cmd_partition(cmd: &AlterTableCmd) -> Option<&PartitionCmd> {
    match cmd.def.as_ref()?.node.as_ref()? {
        NodeEnum::PartitionCmd(partition) => Some(partition),
        _ => None,
    }
}

pub(crate) fn constraint_type(constraint: &Constraint) -> Option<ConstrType> {
    ConstrType::try_from(constraint.contype).ok()
}

pub(crate) fn column_constraints(column: &ColumnDef) -> impl Iterator<Item = &Constraint> {
    column
        .constraints
        .iter()
        .filter_map(|node| match node.node.as_ref() {
            Some(NodeEnum::Constraint(constraint)) => Some(constraint),
            _ => None,
        })
}

pub(crate) fn has_constraint(column: &ColumnDef, wanted: ConstrType) -> bool {
    column_constraints(column).any(|c| constraint_type(c) == Some(wanted))
}

pub(crate) fn is_not_null(column: &ColumnDef) -> bool {
    column.is_not_null || has_constraint(column, ConstrType::ConstrNotnull)
}

/// The raw DEFAULT expression of a column definition, if any.
pub(crate) fn default_expr(column: &ColumnDef) -> Option<&Node> {
    column_constraints(column)
        .find(|c| constraint_type(c) == Some(ConstrType::ConstrDefault))
        .and_then(|c| c.raw_expr.as_deref())
        .or(column.raw_default.as_deref())
}

/// Strictly syntactic constant test: a literal, or a typecast directly
/// wrapping a literal. Deeper nesting is deliberately non-constant.
pub(crate) fn is_constant_expr(expr: &Node) -> bool {
    match expr.node.as_ref() {
        Some(NodeEnum::AConst(_)) => true,
        Some(NodeEnum::TypeCast(cast)) => matches!(
            cast.arg.as_deref().and_then(|arg| arg.node.as_ref()),
            Some(NodeEnum::AConst(_))
        ),
        _ => false,
    }
}

fn node_string(node: &Node) -> Option<&str> {
    match node.node.as_ref() {
        Some(NodeEnum::String(value)) => Some(value.sval.as_str()),
        _ => None,
    }
}

/// Unqualified lowercase type name (`pg_catalog.varchar` → `varchar`).
pub(crate) fn type_name_last(type_name: &TypeName) -> String {
    type_name
        .names
        .iter()
        .filter_map(node_string)
        .next_back()
        .unwrap_or_default()
        .to_lowercase()
}

pub(crate) fn type_mod_count(type_name: &TypeName) -> usize {
    type_name.typmods.len()
}

/// Render a type name with its modifiers for recipe text, e.g. `varchar(20)`.
pub(crate) fn render_type(type_name: &TypeName) -> String {
    let base = type_name_last(type_name);
    if type_name.typmods.is_empty() {
        return base;
    }
    let mods: Vec<String> = type_name
        .typmods
        .iter()
        .filter_map(a_const_int)
        .map(|v| v.to_string())
        .collect();
    if mods.is_empty() {
        base
    } else {
        format!("{}({})", base, mods.join(","))
    }
}

pub(crate) fn a_const_int(node: &Node) -> Option<i64> {
    match node.node.as_ref() {
        Some(NodeEnum::AConst(constant)) => match constant.val.as_ref() {
            Some(pg_query::protobuf::a_const::Val::Ival(value)) => Some(i64::from(value.ival)),
            _ => None,
        },
        _ => None,
    }
}

/// Names of the objects of a DROP statement. Each object is either a
/// qualified-name list or a bare string; parts join with `.`.
pub(crate) fn object_names(objects: &[Node]) -> Vec<String> {
    objects
        .iter()
        .filter_map(|object| match object.node.as_ref() {
            Some(NodeEnum::List(list)) => {
                let parts: Vec<&str> = list.items.iter().filter_map(node_string).collect();
                (!parts.is_empty()).then(|| parts.join("."))
            }
            Some(NodeEnum::String(value)) => Some(value.sval.clone()),
            _ => None,
        })
        .collect()
}

/// The unqualified table part of a possibly qualified object name.
pub(crate) fn unqualified(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

pub(crate) fn def_elem_named<'a>(options: &'a [Node], name: &str) -> Option<&'a DefElem> {
    options.iter().find_map(|node| match node.node.as_ref() {
        Some(NodeEnum::DefElem(elem)) if elem.defname.eq_ignore_ascii_case(name) => Some(elem),
        _ => None,
    })
}

/// Column names listed in a table constraint (`UNIQUE (a, b)`).
pub(crate) fn constraint_keys(constraint: &Constraint) -> Vec<String> {
    constraint
        .keys
        .iter()
        .filter_map(node_string)
        .map(str::to_string)
        .collect()
}

pub(crate) const SERIAL_FAMILY: &[&str] = &[
    "serial",
    "serial2",
    "serial4",
    "serial8",
    "smallserial",
    "bigserial",
];

pub(crate) const INT_FAMILY: &[&str] = &["int2", "int4", "integer", "smallint"];
