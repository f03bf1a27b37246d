//! Host health subsystem.
//!
//! # Data Flow
//! ```text
//! Failover loop observes a transport error
//!     → supervisor.mark_down(host)
//!     → retry.rs (queue + immediate probe + periodic sweep)
//!     → directory.restore_host on recovery
//!
//! Failover loop observes an operation timeout
//!     → supervisor.record_timeout(host)
//!     → timeout_tracker.rs (sliding window → suspension)
//!     → selection excludes suspended hosts until the sweep expires them
//! ```
//!
//! # Design Decisions
//! - Both sweeps are plain tasks cancelled as a unit by the manager's
//!   shutdown broadcast, not detached daemon threads
//! - The supervisor talks to the manager through the `HostDirectory`
//!   seam, so it never holds the manager itself

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::schema::{RetryConfig, TimeoutTrackerConfig};
use crate::connection::host::Host;
use crate::connection::raw::Connector;
use crate::lifecycle::Shutdown;

pub mod retry;
pub mod timeout_tracker;

pub use retry::DownedHostRetryService;
pub use timeout_tracker::HostTimeoutTracker;

/// The manager-side surface the health supervisor drives.
#[async_trait]
pub trait HostDirectory: Send + Sync + 'static {
    /// Bring a recovered host back into the live set. Returns false
    /// when the host is already live or its pool could not be built.
    async fn restore_host(&self, host: Host) -> bool;

    /// Whether the live set currently contains the host.
    fn knows_host(&self, host: &Host) -> bool;
}

/// Owns the downed-host retry queue and the timeout suspension tracker,
/// plus the background tasks that sweep them.
pub struct HostHealthSupervisor<C: Connector> {
    retry: Arc<DownedHostRetryService<C>>,
    tracker: Arc<HostTimeoutTracker>,
}

impl<C: Connector> HostHealthSupervisor<C> {
    pub fn new(
        retry_config: &RetryConfig,
        tracker_config: &TimeoutTrackerConfig,
        connector: C,
        directory: Arc<dyn HostDirectory>,
    ) -> Self {
        Self {
            retry: Arc::new(DownedHostRetryService::new(retry_config, connector, directory)),
            tracker: Arc::new(HostTimeoutTracker::new(tracker_config)),
        }
    }

    /// Spawn both sweep loops; they stop together on the shutdown
    /// signal.
    pub fn start(&self, shutdown: &Shutdown) {
        tokio::spawn(self.retry.clone().run(shutdown.subscribe()));
        tokio::spawn(self.tracker.clone().run(shutdown.subscribe()));
    }

    pub fn mark_down(&self, host: Host) {
        self.retry.add(host);
    }

    /// Record an operation timeout; true when the host is now
    /// suspended.
    pub fn record_timeout(&self, host: &Host) -> bool {
        self.tracker.record_timeout(host)
    }

    pub fn is_suspended(&self, host: &Host) -> bool {
        self.tracker.is_suspended(host)
    }

    pub fn suspended_hosts(&self) -> std::collections::HashSet<Host> {
        self.tracker.suspended_hosts()
    }

    pub fn downed_hosts(&self) -> Vec<Host> {
        self.retry.downed_hosts()
    }

    pub fn host_is_downed(&self, host: &Host) -> bool {
        self.retry.contains(host)
    }

    /// Drop a pending retry-queue entry, if any.
    pub fn remove_downed(&self, host: &Host) -> bool {
        self.retry.remove(host)
    }

    pub fn flush_downed(&self) {
        self.retry.flush()
    }
}
