//! Connection layer.
//!
//! # Data Flow
//! ```text
//! Manager selects a pool
//!     → pool.rs (borrow: pop available / dial / wait)
//!     → raw.rs (opaque transport handle)
//!     → caller runs its operation
//!     → pool.rs (release: requeue / close / replace)
//!     → latency.rs (optional decorator records elapsed time)
//! ```
//!
//! # Design Decisions
//! - Each pool exclusively owns its connections; nothing else closes or
//!   requeues them
//! - The latency decorator composes behind the same capability
//!   interface instead of subclassing the pool

pub mod host;
pub mod latency;
pub mod pool;
pub mod raw;

pub use host::{Credentials, Host, InvalidHost};
pub use latency::LatencyAwarePool;
pub use pool::{ConnectionPool, HostPool, Lease};
pub use raw::{Connector, RawConnection};
