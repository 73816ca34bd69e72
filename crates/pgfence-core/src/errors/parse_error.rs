//! SQL parser errors.

use super::error_code::{self, PgfenceErrorCode};

/// Errors from the PostgreSQL grammar adapter. Parse failures are fail-fast:
/// a file that does not parse produces no partial results.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("SQL syntax error in {path}: {message}")]
    Syntax { path: String, message: String },

    #[error("statement {index} in {path} has no parse node")]
    MissingNode { path: String, index: usize },
}

impl PgfenceErrorCode for ParseError {
    fn error_code(&self) -> &'static str {
        error_code::PARSE_ERROR
    }
}
