//! Cluster connection manager.
//!
//! # Data Flow
//! ```text
//! execute(operation)
//!     → load_balancer (select pool among live, minus suspended/excluded)
//!     → pool.borrow()
//!     → operation body runs against the connection, timed
//!     → success: release, return result
//!     → failure: classify
//!         - Transport: mark host down, release, retry per failover budget
//!         - TimedOut: record in timeout tracker, release, retry per budget
//!         - Unavailable/InvalidRequest/Internal: release, surface
//! ```
//!
//! # Design Decisions
//! - The retry budget is evaluated against the live host set before
//!   each retry, so a set that shrank or grew mid-call is respected
//! - Exhausting the budget surfaces the last classified error; callers
//!   can tell "every host was down" from "the query was invalid"
//! - Transport errors feed the downed-host retry queue; timeouts feed
//!   the suspension tracker. Both remove the host from selection, on
//!   different clocks

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::config::schema::{ClusterConfig, LoadBalancingKind};
use crate::config::validation::validate_config;
use crate::config::ConfigError;
use crate::connection::host::Host;
use crate::connection::pool::ConnectionPool;
use crate::connection::raw::Connector;
use crate::errors::{classify, ClassifiedError};
use crate::health::{HostDirectory, HostHealthSupervisor};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{LatencyAware, LeastActive, LoadBalancingPolicy, RoundRobin};
use crate::observability::metrics;

pub mod failover;
pub mod operation;

pub use failover::FailoverPolicy;
pub use operation::{ConsistencyLevel, ExecutionResult, Operation, OperationType};

/// Live host map plus the selection policy; shared with the health
/// supervisor so recovered hosts can rejoin without going through the
/// public manager handle.
struct ManagerCore<C: Connector + Clone> {
    pools: DashMap<Host, Arc<dyn ConnectionPool<C::Conn>>>,
    policy: Box<dyn LoadBalancingPolicy<C>>,
    connector: C,
}

impl<C: Connector + Clone> ManagerCore<C> {
    fn live_pools(&self) -> Vec<Arc<dyn ConnectionPool<C::Conn>>> {
        self.pools.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Live hosts not yet excluded by the current call.
    fn remaining_candidates(&self, exclude: &HashSet<Host>) -> usize {
        self.pools
            .iter()
            .filter(|entry| !exclude.contains(entry.key()))
            .count()
    }
}

#[async_trait]
impl<C: Connector + Clone> HostDirectory for ManagerCore<C> {
    async fn restore_host(&self, host: Host) -> bool {
        if self.pools.contains_key(&host) {
            return false;
        }
        match self.policy.make_pool(host.clone(), self.connector.clone()).await {
            Ok(pool) => {
                use dashmap::mapref::entry::Entry;
                match self.pools.entry(host.clone()) {
                    Entry::Occupied(_) => {
                        // Lost a race with another restore; drop ours.
                        let _ = pool.shutdown();
                        false
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(pool);
                        metrics::record_host_live(&host.name(), true);
                        tracing::info!(host = %host, "host added to live set");
                        true
                    }
                }
            }
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "unable to build pool for host");
                false
            }
        }
    }

    fn knows_host(&self, host: &Host) -> bool {
        self.pools.contains_key(host)
    }
}

/// Orchestrates pools, selection, health and failover for one cluster.
pub struct ClusterConnectionManager<C: Connector + Clone> {
    name: String,
    core: Arc<ManagerCore<C>>,
    supervisor: HostHealthSupervisor<C>,
    shutdown: Shutdown,
    active: AtomicBool,
}

fn policy_for<C: Connector + Clone>(kind: LoadBalancingKind) -> Box<dyn LoadBalancingPolicy<C>> {
    match kind {
        LoadBalancingKind::RoundRobin => Box::new(RoundRobin::new()),
        LoadBalancingKind::LeastActive => Box::new(LeastActive::new()),
        LoadBalancingKind::LatencyAware => Box::new(LatencyAware::new()),
    }
}

fn resolve_hosts(config: &ClusterConfig) -> Vec<Host> {
    config
        .hosts
        .iter()
        .filter_map(|s| s.parse::<Host>().ok())
        .map(|host| {
            let mut host = host
                .with_max_active(config.pool.max_active)
                .with_max_wait_when_exhausted(Duration::from_millis(
                    config.pool.max_wait_when_exhausted_ms,
                ));
            if let Some(keyspace) = &config.keyspace {
                host = host.with_keyspace(keyspace.clone());
            }
            if let Some(creds) = &config.credentials {
                host = host.with_credentials(creds.username.clone(), creds.password.clone());
            }
            host
        })
        .collect()
}

impl<C: Connector + Clone> ClusterConnectionManager<C> {
    /// Validate the configuration, build a pool per seed host and start
    /// the health sweeps. Seeds that cannot be dialed go straight to
    /// the downed-host queue instead of failing construction.
    pub async fn new(config: ClusterConfig, connector: C) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let core = Arc::new(ManagerCore {
            pools: DashMap::new(),
            policy: policy_for(config.load_balancing),
            connector: connector.clone(),
        });
        let directory: Arc<dyn HostDirectory> = core.clone();
        let supervisor =
            HostHealthSupervisor::new(&config.retry, &config.timeout_tracker, connector, directory);
        let shutdown = Shutdown::new();
        supervisor.start(&shutdown);

        let manager = Self {
            name: config.name.clone(),
            core,
            supervisor,
            shutdown,
            active: AtomicBool::new(true),
        };

        for host in resolve_hosts(&config) {
            if !manager.core.restore_host(host.clone()).await {
                tracing::warn!(host = %host, "seed host unreachable at startup, queued for retry");
                manager.supervisor.mark_down(host);
            }
        }
        tracing::info!(
            cluster = %manager.name,
            live = manager.core.pools.len(),
            "cluster connection manager started"
        );
        Ok(manager)
    }

    /// Run an operation with failover.
    pub async fn execute<T>(
        &self,
        mut op: Operation<T, C::Conn>,
    ) -> Result<ExecutionResult<T>, ClassifiedError> {
        if !self.active.load(Ordering::SeqCst) {
            return Err(ClassifiedError::PoolInactive(format!(
                "manager {} is shut down",
                self.name
            )));
        }

        let op_type = op.op_type.as_str();
        let mut exclude: HashSet<Host> = HashSet::new();
        let mut last_error: Option<ClassifiedError> = None;

        loop {
            // Suspended hosts are skipped for this attempt but do not
            // consume failover budget.
            let mut attempt_exclude = exclude.clone();
            attempt_exclude.extend(self.supervisor.suspended_hosts());

            let pools = self.core.live_pools();
            let Some(pool) = self.core.policy.select(&pools, &attempt_exclude) else {
                return Err(last_error.unwrap_or_else(|| {
                    ClassifiedError::Unavailable("no live hosts in cluster".into())
                }));
            };
            let host = pool.host().clone();

            let mut lease = match pool.borrow().await {
                Ok(lease) => lease,
                Err(e) => {
                    tracing::debug!(host = %host, error = %e, "borrow failed");
                    if e.is_transport_error() {
                        self.mark_down(&host);
                    }
                    exclude.insert(host.clone());
                    last_error = Some(e.clone());
                    if op.failover.allows_retry(exclude.len(), self.core.remaining_candidates(&exclude)) {
                        metrics::record_failover_retry(&host.name());
                        continue;
                    }
                    return Err(e);
                }
            };

            let started = Instant::now();
            let outcome = op.run(lease.conn()).await;
            let exec_time = started.elapsed();

            match outcome {
                Ok(value) => {
                    pool.release(lease).await;
                    metrics::record_operation(op_type, true, exec_time);
                    metrics::record_pool_occupancy(&host.name(), pool.num_idle(), pool.num_active());
                    return Ok(ExecutionResult {
                        value,
                        exec_time,
                        host,
                    });
                }
                Err(raw) => {
                    let err = classify(raw);
                    metrics::record_operation(op_type, false, exec_time);

                    if err.is_transport_error() {
                        // Take the host out before releasing, so the
                        // broken connection is closed and no
                        // replacement is dialed into a dying pool.
                        self.mark_down(&host);
                        pool.release(lease).await;
                    } else if err.has_timed_out() {
                        let suspended = self.supervisor.record_timeout(&host);
                        pool.release(lease).await;
                        if suspended {
                            tracing::debug!(host = %host, "host left rotation after timeout burst");
                        }
                    } else {
                        // Not a host-health problem; surface as-is.
                        pool.release(lease).await;
                        return Err(err);
                    }

                    exclude.insert(host.clone());
                    last_error = Some(err.clone());
                    if op.failover.allows_retry(exclude.len(), self.core.remaining_candidates(&exclude)) {
                        metrics::record_failover_retry(&host.name());
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Bring a host into the live set. Returns false when it is
    /// already known or its pool could not be built.
    pub async fn add_host(&self, host: Host) -> bool {
        self.core.restore_host(host).await
    }

    /// Drop a host: its pool shuts down, checked-out connections close
    /// on release. Also clears any pending retry-queue entry.
    pub fn remove_host(&self, host: &Host) -> bool {
        self.supervisor.remove_downed(host);
        match self.core.pools.remove(host) {
            Some((_, pool)) => {
                if let Err(e) = pool.shutdown() {
                    tracing::debug!(host = %host, error = %e, "pool already inactive on removal");
                }
                metrics::record_host_live(&host.name(), false);
                tracing::info!(host = %host, "host removed");
                true
            }
            None => false,
        }
    }

    /// Take a host out of rotation and hand it to the retry service.
    fn mark_down(&self, host: &Host) {
        if let Some((_, pool)) = self.core.pools.remove(host) {
            if let Err(e) = pool.shutdown() {
                tracing::debug!(host = %host, error = %e, "pool already inactive at mark-down");
            }
            metrics::record_host_live(&host.name(), false);
            tracing::warn!(host = %host, "host marked down");
        }
        self.supervisor.mark_down(host.clone());
    }

    /// Hosts currently in the live set.
    pub fn hosts(&self) -> Vec<Host> {
        self.core.pools.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn downed_hosts(&self) -> Vec<Host> {
        self.supervisor.downed_hosts()
    }

    pub fn suspended_hosts(&self) -> HashSet<Host> {
        self.supervisor.suspended_hosts()
    }

    /// Operational summary: every pool's counters plus the live,
    /// suspended and downed host sets.
    pub fn status_string(&self) -> String {
        let mut pools: Vec<String> = self
            .core
            .pools
            .iter()
            .map(|entry| entry.value().status_string())
            .collect();
        pools.sort();

        let mut suspended: Vec<String> =
            self.suspended_hosts().iter().map(|h| h.name()).collect();
        suspended.sort();
        let downed: Vec<String> = self.downed_hosts().iter().map(|h| h.name()).collect();

        format!(
            "<ClusterConnectionManager>:{{{}}}; Pools: [{}]; Suspended: [{}]; Downed: [{}]",
            self.name,
            pools.join(" | "),
            suspended.join(", "),
            downed.join(", "),
        )
    }

    /// Stop the health sweeps and shut every pool down. A second call
    /// is a usage error, consistent with pool-level shutdown.
    pub fn shutdown(&self) -> Result<(), ClassifiedError> {
        if self
            .active
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ClassifiedError::PoolInactive(format!(
                "shutdown() called on inactive manager {}",
                self.name
            )));
        }
        tracing::info!(cluster = %self.name, "cluster connection manager shutting down");
        self.shutdown.trigger();

        let hosts: Vec<Host> = self.core.pools.iter().map(|e| e.key().clone()).collect();
        for host in hosts {
            if let Some((_, pool)) = self.core.pools.remove(&host) {
                if let Err(e) = pool.shutdown() {
                    tracing::debug!(host = %host, error = %e, "pool already inactive at manager shutdown");
                }
            }
        }
        tracing::info!(cluster = %self.name, "cluster connection manager shut down");
        Ok(())
    }
}

impl<C: Connector + Clone> Drop for ClusterConnectionManager<C> {
    fn drop(&mut self) {
        // Stop background sweeps even if the caller forgot shutdown().
        self.shutdown.trigger();
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use super::*;
    use crate::connection::raw::RawConnection;
    use crate::errors::RawError;

    struct ClusterConn {
        host: String,
        healthy: bool,
    }

    impl RawConnection for ClusterConn {
        fn is_healthy(&self) -> bool {
            self.healthy
        }

        fn close(&mut self) {
            self.healthy = false;
        }
    }

    /// Connector with a per-host refusal switch, so tests can take
    /// individual hosts off the network.
    #[derive(Clone, Default)]
    struct ClusterConnector {
        refused: Arc<Mutex<HashSet<String>>>,
    }

    impl ClusterConnector {
        fn refuse(&self, host: &str) {
            self.refused.lock().unwrap().insert(host.to_string());
        }
    }

    #[async_trait]
    impl Connector for ClusterConnector {
        type Conn = ClusterConn;

        async fn open(&self, host: &Host) -> Result<ClusterConn, RawError> {
            if self.refused.lock().unwrap().contains(&host.name()) {
                return Err(RawError::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )));
            }
            Ok(ClusterConn {
                host: host.name(),
                healthy: true,
            })
        }
    }

    fn config(hosts: &[&str]) -> ClusterConfig {
        ClusterConfig {
            name: "test-cluster".into(),
            hosts: hosts.iter().map(|s| s.to_string()).collect(),
            ..ClusterConfig::default()
        }
    }

    fn broken_pipe() -> RawError {
        RawError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"))
    }

    #[tokio::test]
    async fn try_all_lands_on_the_last_live_host() {
        let connector = ClusterConnector::default();
        let manager = ClusterConnectionManager::new(
            config(&["10.0.0.1:9160", "10.0.0.2:9160", "10.0.0.3:9160"]),
            connector.clone(),
        )
        .await
        .unwrap();

        // Keep failed hosts unreachable so the retry probe cannot
        // restore them mid-test.
        connector.refuse("10.0.0.1:9160");
        connector.refuse("10.0.0.2:9160");

        let op = Operation::read(|conn: &mut ClusterConn| {
            Box::pin(async move {
                if conn.host == "10.0.0.3:9160" {
                    Ok("row")
                } else {
                    Err(broken_pipe())
                }
            })
        })
        .with_failover(FailoverPolicy::OnFailTryAllAvailable);

        let result = manager.execute(op).await.unwrap();
        assert_eq!(result.value, "row");
        assert_eq!(result.host.name(), "10.0.0.3:9160");
        assert_eq!(manager.hosts().len(), 1);
        assert_eq!(manager.downed_hosts().len(), 2);
    }

    #[tokio::test]
    async fn fail_fast_stops_after_one_attempt() {
        let connector = ClusterConnector::default();
        let manager = ClusterConnectionManager::new(
            config(&["10.0.0.1:9160", "10.0.0.2:9160"]),
            connector.clone(),
        )
        .await
        .unwrap();
        connector.refuse("10.0.0.1:9160");
        connector.refuse("10.0.0.2:9160");

        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = attempts.clone();
        let op = Operation::<(), _>::read(move |_conn: &mut ClusterConn| {
            seen.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Err(broken_pipe()) })
        });

        let err = manager.execute(op).await.unwrap_err();
        assert!(err.is_transport_error());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(manager.hosts().len(), 1);
    }

    #[tokio::test]
    async fn invalid_request_surfaces_without_marking_hosts_down() {
        let connector = ClusterConnector::default();
        let manager = ClusterConnectionManager::new(
            config(&["10.0.0.1:9160", "10.0.0.2:9160"]),
            connector,
        )
        .await
        .unwrap();

        let op = Operation::<(), _>::read(|_conn: &mut ClusterConn| {
            Box::pin(async move {
                Err(RawError::InvalidRequest {
                    why: "unconfigured columnfamily".into(),
                })
            })
        })
        .with_failover(FailoverPolicy::OnFailTryAllAvailable);

        let err = manager.execute(op).await.unwrap_err();
        assert!(matches!(err, ClassifiedError::InvalidRequest(_)));
        assert_eq!(manager.hosts().len(), 2);
        assert!(manager.downed_hosts().is_empty());
    }

    #[tokio::test]
    async fn repeated_timeouts_suspend_hosts_without_removing_them() {
        let mut cfg = config(&["10.0.0.1:9160", "10.0.0.2:9160"]);
        cfg.timeout_tracker.timeout_counter = 2;
        cfg.timeout_tracker.window_ms = 60_000;
        cfg.timeout_tracker.suspension_secs = 60;
        let manager = ClusterConnectionManager::new(cfg, ClusterConnector::default())
            .await
            .unwrap();

        for _ in 0..2 {
            let op = Operation::<(), _>::read(|_conn: &mut ClusterConn| {
                Box::pin(async move { Err(RawError::Timeout("no reply".into())) })
            })
            .with_failover(FailoverPolicy::OnFailTryAllAvailable);
            let err = manager.execute(op).await.unwrap_err();
            assert!(err.has_timed_out());
        }

        assert_eq!(manager.suspended_hosts().len(), 2);
        assert_eq!(manager.hosts().len(), 2);
        assert!(manager.downed_hosts().is_empty());
    }

    #[tokio::test]
    async fn shutdown_rejects_execution_and_second_shutdown() {
        let manager = ClusterConnectionManager::new(
            config(&["10.0.0.1:9160"]),
            ClusterConnector::default(),
        )
        .await
        .unwrap();

        manager.shutdown().unwrap();

        let op = Operation::read(|_conn: &mut ClusterConn| Box::pin(async move { Ok(1u32) }));
        let err = manager.execute(op).await.unwrap_err();
        assert!(matches!(err, ClassifiedError::PoolInactive(_)));
        assert!(manager.shutdown().is_err());
        assert!(manager.hosts().is_empty());
    }

    #[tokio::test]
    async fn add_and_remove_host_round_trip() {
        let manager = ClusterConnectionManager::new(
            config(&["10.0.0.1:9160"]),
            ClusterConnector::default(),
        )
        .await
        .unwrap();

        let host: Host = "10.0.0.9:9160".parse().unwrap();
        assert!(manager.add_host(host.clone()).await);
        assert!(!manager.add_host(host.clone()).await);
        assert_eq!(manager.hosts().len(), 2);

        assert!(manager.remove_host(&host));
        assert!(!manager.remove_host(&host));
        assert_eq!(manager.hosts().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_seed_is_queued_not_fatal() {
        let connector = ClusterConnector::default();
        connector.refuse("10.0.0.2:9160");
        let manager = ClusterConnectionManager::new(
            config(&["10.0.0.1:9160", "10.0.0.2:9160"]),
            connector,
        )
        .await
        .unwrap();

        assert_eq!(manager.hosts().len(), 1);
        let downed = manager.downed_hosts();
        assert_eq!(downed.len(), 1);
        assert_eq!(downed[0].name(), "10.0.0.2:9160");
    }

    #[tokio::test]
    async fn status_string_names_every_live_pool() {
        let manager = ClusterConnectionManager::new(
            config(&["10.0.0.1:9160", "10.0.0.2:9160"]),
            ClusterConnector::default(),
        )
        .await
        .unwrap();

        let status = manager.status_string();
        assert!(status.starts_with("<ClusterConnectionManager>:{test-cluster}"));
        assert!(status.contains("10.0.0.1:9160"));
        assert!(status.contains("10.0.0.2:9160"));
        assert!(status.contains("Suspended: []"));
    }
}
