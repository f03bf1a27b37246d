//! Latency-sampling pool decorator.
//!
//! # Responsibilities
//! - Wrap a plain pool and record per-operation elapsed time between
//!   borrow and release into a bounded rolling window
//! - Derive a score from an exponential-tail probability model over the
//!   sample mean, consumed by the latency-aware balancing policy
//!
//! # Design Decisions
//! - Composition over the `ConnectionPool` capability interface, not a
//!   pool subclass; any pool can be decorated
//! - Recording is rate-limited per scoring interval so the window (and
//!   the score recomputation it feeds) stays cheap under load; reading
//!   the score closes the interval and reopens the budget

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::connection::host::Host;
use crate::connection::pool::{ConnectionPool, Lease};
use crate::connection::raw::RawConnection;
use crate::errors::ClassifiedError;

/// Samples kept in the rolling window.
const WINDOW_SIZE: usize = 100;

/// Samples accepted per scoring interval before recording pauses.
const UPDATES_PER_INTERVAL: usize = 1000;

/// Comparison point, in seconds, for the tail-probability model.
const SENTINEL_COMPARE: f64 = 0.768;

/// Decorates a pool with a rolling window of observed per-operation
/// latencies.
pub struct LatencyAwarePool<T: RawConnection> {
    inner: Arc<dyn ConnectionPool<T>>,
    latencies: Mutex<VecDeque<f64>>,
    interval_updates: AtomicUsize,
}

impl<T: RawConnection> LatencyAwarePool<T> {
    pub fn new(inner: Arc<dyn ConnectionPool<T>>) -> Self {
        Self {
            inner,
            latencies: Mutex::new(VecDeque::with_capacity(WINDOW_SIZE)),
            interval_updates: AtomicUsize::new(0),
        }
    }

    /// Record one observed latency, in seconds. Oldest sample is
    /// evicted when the window is full; samples beyond the interval
    /// budget are dropped.
    fn record(&self, seconds: f64) {
        if self.interval_updates.load(Ordering::SeqCst) >= UPDATES_PER_INTERVAL {
            return;
        }
        let mut window = self.latencies.lock().expect("latency window poisoned");
        if window.len() >= WINDOW_SIZE {
            window.pop_front();
        }
        window.push_back(seconds);
        drop(window);
        self.interval_updates.fetch_add(1, Ordering::SeqCst);
    }

    /// Current score; lower means lower apparent latency. Zero when no
    /// samples have been recorded. Computing a score closes the current
    /// interval and reopens the recording budget, so a pool whose score
    /// is consulted keeps sampling fresh latencies.
    pub fn score(&self) -> f64 {
        self.reset_interval();
        let mean = {
            let window = self.latencies.lock().expect("latency window poisoned");
            if window.is_empty() {
                return 0.0;
            }
            window.iter().sum::<f64>() / window.len() as f64
        };
        let probability = 1.0 - (-SENTINEL_COMPARE / mean).exp();
        -probability.log10()
    }

    /// Re-open the recording budget for the next scoring interval.
    pub fn reset_interval(&self) {
        self.interval_updates.store(0, Ordering::SeqCst);
    }

    /// Drop all samples and reset the budget.
    pub fn clear(&self) {
        self.latencies.lock().expect("latency window poisoned").clear();
        self.interval_updates.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl<T: RawConnection> ConnectionPool<T> for LatencyAwarePool<T> {
    fn host(&self) -> &Host {
        self.inner.host()
    }

    async fn borrow(&self) -> Result<Lease<T>, ClassifiedError> {
        // The lease timestamps itself at borrow time.
        self.inner.borrow().await
    }

    async fn release(&self, lease: Lease<T>) {
        self.record(lease.elapsed().as_secs_f64());
        self.inner.release(lease).await;
    }

    fn shutdown(&self) -> Result<(), ClassifiedError> {
        self.inner.shutdown()
    }

    fn num_idle(&self) -> usize {
        self.inner.num_idle()
    }

    fn num_active(&self) -> usize {
        self.inner.num_active()
    }

    fn num_blocked(&self) -> usize {
        self.inner.num_blocked()
    }

    fn max_active(&self) -> usize {
        self.inner.max_active()
    }

    fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    fn latency_score(&self) -> Option<f64> {
        Some(self.score())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::pool::HostPool;
    use crate::connection::raw::test_support::MockConnector;

    async fn decorated() -> LatencyAwarePool<crate::connection::raw::test_support::MockConn> {
        let host = Host::new("127.0.0.1", 9160).with_max_active(6);
        let pool = HostPool::new(host, MockConnector::healthy()).await.unwrap();
        LatencyAwarePool::new(Arc::new(pool))
    }

    #[tokio::test]
    async fn empty_window_scores_zero() {
        let pool = decorated().await;
        assert_eq!(pool.score(), 0.0);
        assert_eq!(pool.latency_score(), Some(0.0));
    }

    #[tokio::test]
    async fn faster_hosts_score_lower() {
        let fast = decorated().await;
        let slow = decorated().await;
        for _ in 0..20 {
            fast.record(0.010);
            slow.record(2.500);
        }
        // Mean well under the sentinel drives the tail probability to 1
        // and the score to 0; the policy prefers the minimum score.
        assert!(fast.score() < slow.score());
        assert!(fast.score() < 1e-6);
    }

    #[tokio::test]
    async fn window_is_bounded() {
        let pool = decorated().await;
        for i in 0..(WINDOW_SIZE + 50) {
            pool.record(i as f64);
        }
        let len = pool.latencies.lock().unwrap().len();
        assert_eq!(len, WINDOW_SIZE);
        // Oldest samples were evicted.
        let oldest = *pool.latencies.lock().unwrap().front().unwrap();
        assert_eq!(oldest, 50.0);
    }

    #[tokio::test]
    async fn interval_budget_limits_recording() {
        let pool = decorated().await;
        pool.interval_updates.store(UPDATES_PER_INTERVAL, Ordering::SeqCst);
        pool.record(1.0);
        assert!(pool.latencies.lock().unwrap().is_empty());

        pool.reset_interval();
        pool.record(1.0);
        assert_eq!(pool.latencies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn slow_burst_after_a_score_read_moves_the_score() {
        let pool = decorated().await;
        for _ in 0..UPDATES_PER_INTERVAL {
            pool.record(0.001);
        }
        // Budget spent: this sample is dropped and the score stays low.
        pool.record(25.0);
        assert!(pool.score() < 1e-6);

        // The score read reopened the budget; a host that turns slow
        // is re-measured instead of coasting on stale samples.
        for _ in 0..WINDOW_SIZE {
            pool.record(25.0);
        }
        assert!(pool.score() > 1.0);
    }

    #[tokio::test]
    async fn release_records_elapsed_time() {
        let pool = decorated().await;
        let lease = pool.borrow().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        pool.release(lease).await;
        let window = pool.latencies.lock().unwrap();
        assert_eq!(window.len(), 1);
        assert!(window[0] >= 0.020);
    }
}
