//! Least-active balancing policy.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;

use crate::connection::host::Host;
use crate::connection::pool::ConnectionPool;
use crate::connection::raw::Connector;
use crate::load_balancer::LoadBalancingPolicy;

/// Least-active selector.
///
/// Shuffles before a stable sort on active count, so hosts tied at the
/// minimum are not always returned in the same order when the cluster
/// is idle.
#[derive(Debug, Default)]
pub struct LeastActive;

impl LeastActive {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<C: Connector> LoadBalancingPolicy<C> for LeastActive {
    fn select(
        &self,
        pools: &[Arc<dyn ConnectionPool<C::Conn>>],
        exclude: &HashSet<Host>,
    ) -> Option<Arc<dyn ConnectionPool<C::Conn>>> {
        if pools.is_empty() {
            return None;
        }
        let mut ordered: Vec<Arc<dyn ConnectionPool<C::Conn>>> = pools.to_vec();
        ordered.shuffle(&mut rand::thread_rng());
        // Stable sort keeps the shuffled order among equal counts.
        ordered.sort_by_key(|pool| pool.num_active());

        ordered
            .iter()
            .find(|pool| !exclude.contains(pool.host()))
            .cloned()
            // Every host excluded: the least-active one is still the
            // least-bad answer.
            .or_else(|| Some(ordered[0].clone()))
    }
}
