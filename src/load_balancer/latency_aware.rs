//! Latency-aware balancing policy.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::host::Host;
use crate::connection::latency::LatencyAwarePool;
use crate::connection::pool::{ConnectionPool, HostPool};
use crate::connection::raw::Connector;
use crate::errors::ClassifiedError;
use crate::load_balancer::LoadBalancingPolicy;

/// Latency-aware selector.
///
/// Builds pools wrapped in the latency-sampling decorator and prefers
/// the pool with the lowest rolling-latency score. Pools without
/// samples score zero, so cold hosts are tried first.
#[derive(Debug, Default)]
pub struct LatencyAware;

impl LatencyAware {
    pub fn new() -> Self {
        Self::default()
    }

    fn best<T: crate::connection::raw::RawConnection>(
        candidates: impl Iterator<Item = Arc<dyn ConnectionPool<T>>>,
    ) -> Option<Arc<dyn ConnectionPool<T>>> {
        candidates.min_by(|a, b| {
            let a = a.latency_score().unwrap_or(0.0);
            let b = b.latency_score().unwrap_or(0.0);
            a.total_cmp(&b)
        })
    }
}

#[async_trait]
impl<C: Connector> LoadBalancingPolicy<C> for LatencyAware {
    fn select(
        &self,
        pools: &[Arc<dyn ConnectionPool<C::Conn>>],
        exclude: &HashSet<Host>,
    ) -> Option<Arc<dyn ConnectionPool<C::Conn>>> {
        if pools.is_empty() {
            return None;
        }
        Self::best(
            pools
                .iter()
                .filter(|pool| !exclude.contains(pool.host()))
                .cloned(),
        )
        // Every host excluded: lowest score is still the best guess.
        .or_else(|| Self::best(pools.iter().cloned()))
    }

    async fn make_pool(
        &self,
        host: Host,
        connector: C,
    ) -> Result<Arc<dyn ConnectionPool<C::Conn>>, ClassifiedError> {
        let inner = HostPool::new(host, connector).await?;
        Ok(Arc::new(LatencyAwarePool::new(Arc::new(inner))))
    }
}
