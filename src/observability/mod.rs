//! Observability subsystem.

pub mod logging;
pub mod metrics;
