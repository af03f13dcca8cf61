//! Logging infrastructure
//!
//! Structured logging via `tracing`. Binaries and integration tests call
//! [`init`] once; library code only emits events.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Honors `RUST_LOG` when set, otherwise falls back to the given level for
/// this crate and `info` for everything else. Safe to call more than once;
/// later calls are no-ops.
pub fn init(log_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("redress={log_level},info").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
