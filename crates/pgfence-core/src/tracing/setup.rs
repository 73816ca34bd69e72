//! Tracing initialization and configuration.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Initialize the pgfence tracing/logging system.
///
/// Reads the `PGFENCE_LOG` environment variable for per-subsystem log levels.
/// Format: `PGFENCE_LOG=pgfence_analysis=debug,pgfence_cli=info`
///
/// Falls back to `pgfence=info` if `PGFENCE_LOG` is not set or is invalid.
///
/// This function is idempotent — calling it multiple times is safe.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env("PGFENCE_LOG").unwrap_or_else(|_| EnvFilter::new("pgfence=info"));

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    });
}
