//! Plugin registration errors.

use super::error_code::{self, PgfenceErrorCode};

/// Errors rejecting a plugin at registration time. Runtime plugin failures
/// are isolated per statement and never surface as errors.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("plugin `{plugin}` rule id `{rule_id}` must start with `plugin:`")]
    BadRuleId { plugin: String, rule_id: String },

    #[error("plugin `{plugin}` rule id `{rule_id}` collides with an existing rule")]
    DuplicateRuleId { plugin: String, rule_id: String },

    #[error("plugin loading is not available in this build: {path}")]
    LoaderUnavailable { path: String },
}

impl PgfenceErrorCode for PluginError {
    fn error_code(&self) -> &'static str {
        error_code::PLUGIN_ERROR
    }
}
