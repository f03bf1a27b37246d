//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Manager gathers live pools (minus suspended hosts)
//!     → Apply selection strategy:
//!         - round_robin.rs (rotate an atomic counter)
//!         - least_active.rs (shuffle, sort by active count)
//!         - latency_aware.rs (minimum rolling-latency score)
//!     → Return the chosen pool to the failover loop
//! ```
//!
//! # Design Decisions
//! - Selection never fails when every host is excluded: the policy
//!   returns its least-bad pool, and the failover loop, which tracks
//!   the exclusion set itself, decides that the budget is spent
//! - Policies double as pool factories so the latency-aware policy can
//!   wrap new pools in its sampling decorator

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::host::Host;
use crate::connection::pool::{ConnectionPool, HostPool};
use crate::connection::raw::Connector;
use crate::errors::ClassifiedError;

pub mod latency_aware;
pub mod least_active;
pub mod round_robin;

pub use latency_aware::LatencyAware;
pub use least_active::LeastActive;
pub use round_robin::RoundRobin;

/// Strategy for choosing which host's pool serves the next operation.
#[async_trait]
pub trait LoadBalancingPolicy<C: Connector>: Send + Sync {
    /// Pick a pool among `pools`, avoiding hosts in `exclude` where
    /// possible. Returns `None` only when `pools` is empty; with every
    /// host excluded some pool is still returned.
    fn select(
        &self,
        pools: &[Arc<dyn ConnectionPool<C::Conn>>],
        exclude: &HashSet<Host>,
    ) -> Option<Arc<dyn ConnectionPool<C::Conn>>>;

    /// Build the pool this policy wants to balance over.
    async fn make_pool(
        &self,
        host: Host,
        connector: C,
    ) -> Result<Arc<dyn ConnectionPool<C::Conn>>, ClassifiedError> {
        Ok(Arc::new(HostPool::new(host, connector).await?))
    }
}
