//! Raw SQL extractor, shared by the sql, prisma, and drizzle formats.

use super::Extraction;

/// The file body is the SQL; strip a UTF-8 byte-order mark if present.
pub(crate) fn extract(source: &str) -> Extraction {
    Extraction {
        sql: source.strip_prefix('\u{feff}').unwrap_or(source).to_string(),
        warnings: Vec::new(),
        auto_commit: false,
    }
}
