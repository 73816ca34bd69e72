//! Configuration errors.

use super::error_code::{self, PgfenceErrorCode};

/// Errors from configuration and argument validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown risk level: {value} (expected safe|low|medium|high|critical)")]
    InvalidRiskLevel { value: String },

    #[error("unknown migration format: {value}")]
    InvalidFormat { value: String },

    #[error("unknown rule id: {rule_id}")]
    UnknownRule { rule_id: String },
}

impl PgfenceErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        error_code::CONFIG_ERROR
    }
}
