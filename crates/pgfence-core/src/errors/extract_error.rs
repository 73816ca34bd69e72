//! Extractor errors.

use std::path::PathBuf;

use super::error_code::{self, PgfenceErrorCode};

/// Errors raised while lifting SQL out of a migration source file.
/// Recoverable extraction issues (dynamic SQL, conditional SQL, missing `up`)
/// are warnings attached to the file result, not errors.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse host source {path}: {message}")]
    HostSyntax { path: PathBuf, message: String },

    #[error("cannot determine migration format for {path}")]
    UnknownFormat { path: PathBuf },
}

impl PgfenceErrorCode for ExtractError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io { .. } => error_code::IO_ERROR,
            Self::HostSyntax { .. } => error_code::EXTRACT_ERROR,
            Self::UnknownFormat { .. } => error_code::UNKNOWN_FORMAT,
        }
    }
}
