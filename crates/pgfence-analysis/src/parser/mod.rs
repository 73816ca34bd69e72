//! PostgreSQL grammar adapter.
//!
//! Wraps `pg_query` (the real PostgreSQL parser) and slices the source text
//! into byte-accurate per-statement fragments, attaching any inline
//! suppression directives found next to each statement.

mod preview;
mod suppression;

pub use preview::preview;
pub use suppression::SUPPRESS_ALL;

use pg_query::protobuf::RawStmt;
use pg_query::NodeEnum;
use pgfence_core::errors::ParseError;

/// One parsed statement. Created by the parser, read-only thereafter.
#[derive(Debug, Clone)]
pub struct ParsedStatement {
    /// Trimmed statement text, trailing semicolon stripped.
    pub sql: String,
    /// Grammar tag of the top-level node, e.g. `AlterTableStmt`.
    pub kind: &'static str,
    /// The AST body.
    pub node: NodeEnum,
    /// 1-based line of the statement start in the source file.
    pub line: usize,
    /// Rule ids suppressed for this statement; `"*"` suppresses everything.
    pub suppressed_rules: Vec<String>,
}

impl ParsedStatement {
    /// Whether a finding with this rule id is suppressed on this statement.
    pub fn suppresses(&self, rule_id: &str) -> bool {
        self.suppressed_rules
            .iter()
            .any(|id| id == SUPPRESS_ALL || id == rule_id)
    }
}

/// Parse a whole migration file into its ordered statement list.
///
/// Empty (or comment-only) SQL yields an empty list; a grammar rejection is a
/// fail-fast error.
pub fn parse_sql(path: &str, sql: &str) -> Result<Vec<ParsedStatement>, ParseError> {
    if sql.trim().is_empty() {
        return Ok(Vec::new());
    }

    let parsed = pg_query::parse(sql).map_err(|err| ParseError::Syntax {
        path: path.to_string(),
        message: err.to_string(),
    })?;

    let raw_statements = &parsed.protobuf.stmts;
    let mut statements = Vec::with_capacity(raw_statements.len());
    let mut previous_end = 0usize;

    for (index, raw) in raw_statements.iter().enumerate() {
        let node = raw
            .stmt
            .as_ref()
            .and_then(|stmt| stmt.node.as_ref())
            .ok_or_else(|| ParseError::MissingNode {
                path: path.to_string(),
                index,
            })?;

        let start = start_offset(raw);
        let end = end_offset(sql, raw_statements, index, start);
        let fragment = sql.get(start..end).unwrap_or(sql);
        let text = fragment.trim().trim_end_matches(';').trim_end();

        // The directive lookback region is bounded by the previous statement
        // so a comment cannot bleed past the statement it precedes.
        let gap = sql.get(previous_end..start).unwrap_or("");
        let suppressed_rules = suppression::directives_for(text, gap);

        statements.push(ParsedStatement {
            sql: text.to_string(),
            kind: node_tag(node),
            node: node.clone(),
            line: offset_to_line(sql, start + leading_whitespace_len(fragment)),
            suppressed_rules,
        });
        previous_end = end;
    }

    Ok(statements)
}

fn start_offset(raw: &RawStmt) -> usize {
    usize::try_from(raw.stmt_location).unwrap_or(0)
}

fn end_offset(sql: &str, statements: &[RawStmt], index: usize, start: usize) -> usize {
    if let Ok(len) = usize::try_from(statements[index].stmt_len) {
        if len > 0 {
            return start.saturating_add(len).min(sql.len());
        }
    }

    if let Some(next) = statements.get(index + 1) {
        if let Ok(next_start) = usize::try_from(next.stmt_location) {
            if next_start > start {
                return next_start.min(sql.len());
            }
        }
    }

    sql.len()
}

fn leading_whitespace_len(fragment: &str) -> usize {
    fragment
        .char_indices()
        .find_map(|(index, ch)| (!ch.is_whitespace()).then_some(index))
        .unwrap_or(fragment.len())
}

fn offset_to_line(sql: &str, offset: usize) -> usize {
    let end = offset.min(sql.len());
    1 + sql.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count()
}

/// Grammar tag for the statement kinds the pipeline distinguishes.
pub fn node_tag(node: &NodeEnum) -> &'static str {
    match node {
        NodeEnum::AlterTableStmt(_) => "AlterTableStmt",
        NodeEnum::CreateStmt(_) => "CreateStmt",
        NodeEnum::IndexStmt(_) => "IndexStmt",
        NodeEnum::DropStmt(_) => "DropStmt",
        NodeEnum::TruncateStmt(_) => "TruncateStmt",
        NodeEnum::RenameStmt(_) => "RenameStmt",
        NodeEnum::DeleteStmt(_) => "DeleteStmt",
        NodeEnum::UpdateStmt(_) => "UpdateStmt",
        NodeEnum::InsertStmt(_) => "InsertStmt",
        NodeEnum::SelectStmt(_) => "SelectStmt",
        NodeEnum::VacuumStmt(_) => "VacuumStmt",
        NodeEnum::ReindexStmt(_) => "ReindexStmt",
        NodeEnum::RefreshMatViewStmt(_) => "RefreshMatViewStmt",
        NodeEnum::AlterEnumStmt(_) => "AlterEnumStmt",
        NodeEnum::CreateTrigStmt(_) => "CreateTrigStmt",
        NodeEnum::VariableSetStmt(_) => "VariableSetStmt",
        NodeEnum::TransactionStmt(_) => "TransactionStmt",
        NodeEnum::CreateSeqStmt(_) => "CreateSeqStmt",
        NodeEnum::CreateEnumStmt(_) => "CreateEnumStmt",
        NodeEnum::CreateFunctionStmt(_) => "CreateFunctionStmt",
        NodeEnum::DoStmt(_) => "DoStmt",
        NodeEnum::CommentStmt(_) => "CommentStmt",
        NodeEnum::GrantStmt(_) => "GrantStmt",
        NodeEnum::ViewStmt(_) => "ViewStmt",
        NodeEnum::CreateTableAsStmt(_) => "CreateTableAsStmt",
        NodeEnum::CopyStmt(_) => "CopyStmt",
        _ => "Other",
    }
}
