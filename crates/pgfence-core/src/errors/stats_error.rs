//! Table-statistics errors.

use std::path::PathBuf;

use super::error_code::{self, PgfenceErrorCode};

/// Errors loading the row-count snapshot used for risk adjustment.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("cannot read stats file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse stats file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("live database introspection is not available in this build (use --stats-file)")]
    DbUnavailable,
}

impl PgfenceErrorCode for StatsError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io { .. } => error_code::IO_ERROR,
            _ => error_code::STATS_ERROR,
        }
    }
}
