//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files;
//! defaults mirror the upstream driver's tunables.

use serde::{Deserialize, Serialize};

/// Root configuration for one cluster connection manager.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClusterConfig {
    /// Cluster name for logging/metrics.
    pub name: String,

    /// Seed hosts as `address:port` strings.
    pub hosts: Vec<String>,

    /// Keyspace new connections bind to.
    pub keyspace: Option<String>,

    /// Credentials presented when opening connections.
    pub credentials: Option<CredentialsConfig>,

    /// Per-host pool settings.
    pub pool: PoolConfig,

    /// Which balancing policy selects a host per operation.
    pub load_balancing: LoadBalancingKind,

    /// Downed-host retry service settings.
    pub retry: RetryConfig,

    /// Host timeout suspension settings.
    pub timeout_tracker: TimeoutTrackerConfig,
}

/// Credentials block.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    pub username: String,
    pub password: String,
}

/// Per-host pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum concurrent connections per host.
    pub max_active: usize,

    /// How long a borrow may wait on an exhausted pool, in
    /// milliseconds. Zero waits forever.
    pub max_wait_when_exhausted_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_active: 50,
            max_wait_when_exhausted_ms: 0,
        }
    }
}

/// Selection strategy choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancingKind {
    #[default]
    RoundRobin,
    LeastActive,
    LatencyAware,
}

/// Downed-host retry service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Bound on the downed-host queue. Zero means unbounded, which is
    /// permitted but discouraged.
    pub queue_size: usize,

    /// Delay between background retry sweeps, in seconds.
    pub retry_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            queue_size: 128,
            retry_delay_secs: 10,
        }
    }
}

/// Host timeout suspension settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutTrackerConfig {
    /// Timeouts within the window that trigger suspension.
    pub timeout_counter: usize,

    /// Sliding window length, in milliseconds.
    pub window_ms: u64,

    /// How long a suspended host stays out of rotation, in seconds.
    pub suspension_secs: u64,

    /// Delay between unsuspension sweeps, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for TimeoutTrackerConfig {
    fn default() -> Self {
        Self {
            timeout_counter: 10,
            window_ms: 500,
            suspension_secs: 10,
            sweep_interval_secs: 10,
        }
    }
}
