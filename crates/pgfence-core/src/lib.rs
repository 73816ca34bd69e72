//! Shared data model for the pgfence migration analyzer.
//!
//! Everything downstream of the pipeline consumes these types: lock modes and
//! their conflict semantics, the ordered risk scale, the analyzer
//! configuration, table statistics, schema snapshots, and the error stack.

pub mod config;
pub mod errors;
pub mod lock;
pub mod risk;
pub mod snapshot;
pub mod stats;
pub mod tracing;

pub use config::AnalyzeConfig;
pub use errors::{
    ConfigError, ExtractError, ParseError, PgfenceErrorCode, PluginError, StatsError,
};
pub use lock::{BlockedOps, LockMode};
pub use risk::RiskLevel;
pub use snapshot::SchemaSnapshot;
pub use stats::{StatsSnapshot, TableStats};
