//! Downed-host retry service.
//!
//! # Responsibilities
//! - Hold the deduplicated, bounded queue of hosts believed unreachable
//! - Probe queued hosts with a throwaway dial, immediately on enqueue
//!   and on every periodic sweep
//! - Hand recovered hosts back to the manager's live set
//!
//! # Design Decisions
//! - Probes run on the background task, never on a caller's thread
//! - A full queue drops new entries with a warning rather than growing
//!   without bound

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::config::schema::RetryConfig;
use crate::connection::host::Host;
use crate::connection::raw::{Connector, RawConnection};
use crate::errors::classify;
use crate::health::HostDirectory;

/// Background service retrying hosts that were marked down.
pub struct DownedHostRetryService<C: Connector> {
    queue: Mutex<VecDeque<Host>>,
    /// Zero means unbounded.
    capacity: usize,
    retry_delay: Duration,
    connector: C,
    directory: Arc<dyn HostDirectory>,
}

impl<C: Connector> DownedHostRetryService<C> {
    pub fn new(config: &RetryConfig, connector: C, directory: Arc<dyn HostDirectory>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            capacity: config.queue_size,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            connector,
            directory,
        }
    }

    /// Enqueue a downed host and probe it immediately. Duplicates are
    /// ignored; a full queue drops the host until something else frees
    /// a slot.
    pub fn add(self: &Arc<Self>, host: Host) {
        {
            let mut queue = self.queue.lock().expect("retry queue poisoned");
            if queue.contains(&host) {
                return;
            }
            if self.capacity > 0 && queue.len() >= self.capacity {
                tracing::warn!(host = %host, capacity = self.capacity, "downed host queue full, dropping host");
                return;
            }
            queue.push_back(host.clone());
        }
        tracing::info!(host = %host, "host detected as down, added to retry queue");

        // One-shot probe so a transient blip recovers before the next
        // sweep fires.
        let service = self.clone();
        tokio::spawn(async move {
            if service.contains(&host) && service.probe(&host).await {
                service.directory.restore_host(host.clone()).await;
                // Only drop the entry once the manager actually knows
                // the host again.
                if service.directory.knows_host(&host) {
                    service.remove(&host);
                }
            }
        });
    }

    pub fn remove(&self, host: &Host) -> bool {
        let mut queue = self.queue.lock().expect("retry queue poisoned");
        if let Some(idx) = queue.iter().position(|h| h == host) {
            queue.remove(idx);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, host: &Host) -> bool {
        self.queue.lock().expect("retry queue poisoned").contains(host)
    }

    pub fn downed_hosts(&self) -> Vec<Host> {
        self.queue.lock().expect("retry queue poisoned").iter().cloned().collect()
    }

    pub fn flush(&self) {
        self.queue.lock().expect("retry queue poisoned").clear();
        tracing::info!("downed host retry queue flushed");
    }

    /// Dial a throwaway connection to check reachability.
    async fn probe(&self, host: &Host) -> bool {
        match self.connector.open(host).await {
            Ok(mut conn) => {
                conn.close();
                true
            }
            Err(e) => {
                tracing::debug!(host = %host, error = %classify(e), "downed host still appears to be down");
                false
            }
        }
    }

    /// Probe every queued host once.
    async fn sweep(&self) {
        let snapshot = self.downed_hosts();
        if snapshot.is_empty() {
            tracing::debug!("retry sweep fired, nothing to do");
            return;
        }
        for host in snapshot {
            let reachable = self.probe(&host).await;
            tracing::info!(host = %host, reachable, "downed host retry status");
            if reachable {
                self.directory.restore_host(host.clone()).await;
                // Only drop the entry once the manager actually knows
                // the host again.
                if self.directory.knows_host(&host) {
                    self.remove(&host);
                }
            }
        }
    }

    /// Periodic sweep loop; runs until the shutdown signal.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            queue_size = self.capacity,
            retry_delay_secs = self.retry_delay.as_secs(),
            "downed host retry service started"
        );
        let mut ticker = time::interval(self.retry_delay);
        // The first tick fires immediately; the queue is empty at
        // startup so consume it before the loop.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("downed host retry service shutting down");
                    break;
                }
            }
        }
    }
}
