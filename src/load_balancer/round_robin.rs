//! Round-robin balancing policy.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::host::Host;
use crate::connection::pool::ConnectionPool;
use crate::connection::raw::Connector;
use crate::load_balancer::LoadBalancingPolicy;

/// Bound at which the shared counter wraps back to zero.
const COUNTER_WRAP: usize = 16384;

/// Round-robin selector.
///
/// A single atomic counter rotates through the pool slice; excluded
/// hosts are skipped by scanning forward from the counter's slot.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the counter one tick, wrapping at the bound so it never
    /// grows without limit. Concurrent callers each get a distinct tick.
    fn next_index(&self, len: usize) -> usize {
        let previous = self
            .counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| {
                Some(if c + 1 >= COUNTER_WRAP { 0 } else { c + 1 })
            })
            .unwrap_or(0);
        previous % len
    }
}

#[async_trait]
impl<C: Connector> LoadBalancingPolicy<C> for RoundRobin {
    fn select(
        &self,
        pools: &[Arc<dyn ConnectionPool<C::Conn>>],
        exclude: &HashSet<Host>,
    ) -> Option<Arc<dyn ConnectionPool<C::Conn>>> {
        if pools.is_empty() {
            return None;
        }
        let len = pools.len();
        let start = self.next_index(len);

        for i in 0..len {
            let pool = &pools[(start + i) % len];
            if !exclude.contains(pool.host()) {
                return Some(pool.clone());
            }
        }
        // Every host excluded; hand back the starting slot and let the
        // caller's budget accounting surface the failure.
        Some(pools[start].clone())
    }
}
