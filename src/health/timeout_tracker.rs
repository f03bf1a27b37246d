//! Host timeout suspension tracker.
//!
//! # Responsibilities
//! - Keep a sliding window of recent operation timeouts per host
//! - Suspend a host from selection when the window fills inside the
//!   configured duration
//! - Sweep suspensions back to live after the cool-down
//!
//! # Design Decisions
//! - Suspension is temporary and local: the host keeps its pool, it is
//!   just excluded from selection until the cool-down expires
//! - Windows are cleared on unsuspension so one slow burst does not
//!   immediately re-suspend a recovered host

use std::collections::HashSet;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::schema::TimeoutTrackerConfig;
use crate::connection::host::Host;

/// Sliding-window timeout tracker with temporary host suspension.
pub struct HostTimeoutTracker {
    /// Per-host timestamps of recent timeouts, newest at the back.
    windows: DashMap<Host, VecDeque<Instant>>,
    /// Suspended hosts and when they may return.
    suspended: DashMap<Host, Instant>,
    timeout_counter: usize,
    window: Duration,
    suspension: Duration,
    sweep_interval: Duration,
}

impl HostTimeoutTracker {
    pub fn new(config: &TimeoutTrackerConfig) -> Self {
        Self {
            windows: DashMap::new(),
            suspended: DashMap::new(),
            timeout_counter: config.timeout_counter,
            window: Duration::from_millis(config.window_ms),
            suspension: Duration::from_secs(config.suspension_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
        }
    }

    /// Record one observed operation timeout. Returns true when this
    /// push tripped the window and the host is now suspended.
    pub fn record_timeout(&self, host: &Host) -> bool {
        let now = Instant::now();
        let tripped = {
            let mut window = self.windows.entry(host.clone()).or_default();
            window.push_back(now);
            if window.len() > self.timeout_counter {
                window.pop_front();
            }
            window.len() >= self.timeout_counter
                && window
                    .front()
                    .is_some_and(|oldest| now.duration_since(*oldest) <= self.window)
        };

        if tripped {
            let until = now + self.suspension;
            self.suspended.insert(host.clone(), until);
            tracing::warn!(
                host = %host,
                suspension_secs = self.suspension.as_secs(),
                "host suspended after repeated operation timeouts"
            );
        }
        tripped
    }

    pub fn is_suspended(&self, host: &Host) -> bool {
        self.suspended
            .get(host)
            .is_some_and(|until| Instant::now() < *until)
    }

    /// Hosts currently excluded from selection.
    pub fn suspended_hosts(&self) -> HashSet<Host> {
        let now = Instant::now();
        self.suspended
            .iter()
            .filter(|entry| now < *entry.value())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Move expired suspensions back to live and clear their windows.
    pub fn sweep(&self) {
        let now = Instant::now();
        let expired: Vec<Host> = self
            .suspended
            .iter()
            .filter(|entry| now >= *entry.value())
            .map(|entry| entry.key().clone())
            .collect();
        for host in expired {
            self.suspended.remove(&host);
            self.windows.remove(&host);
            tracing::info!(host = %host, "host suspension expired, back in rotation");
        }
    }

    /// Periodic sweep loop; runs until the shutdown signal.
    pub async fn run(self: std::sync::Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            timeout_counter = self.timeout_counter,
            window_ms = self.window.as_millis() as u64,
            "host timeout tracker started"
        );
        let mut ticker = time::interval(self.sweep_interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = shutdown.recv() => {
                    tracing::info!("host timeout tracker shutting down");
                    break;
                }
            }
        }
    }
}
