//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Manager construction:
//!     Validate config → build pools (unreachable seeds → retry queue)
//!     → start health sweeps
//!
//! Manager shutdown:
//!     Trigger broadcast → sweeps exit → pools drain and close
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
