//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for binaries and tests
//!
//! # Design Decisions
//! - Uses the tracing crate for structured logging throughout
//! - Log level configurable via `RUST_LOG`; defaults keep this crate
//!   at info

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber. Safe to call more than once;
/// later calls are ignored.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cluster_pool=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
