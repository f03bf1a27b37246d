//! Metrics collection.
//!
//! # Metrics
//! - `cluster_pool_operations_total` (counter): operations by type and
//!   outcome
//! - `cluster_pool_operation_duration_seconds` (histogram): latency
//!   distribution by operation type
//! - `cluster_pool_failover_retries_total` (counter): attempts moved to
//!   another host, by the host that failed
//! - `cluster_pool_host_live` (gauge): 1 when a host is in the live
//!   set, 0 when downed
//! - `cluster_pool_idle_connections` / `cluster_pool_active_connections`
//!   (gauges): per-host pool occupancy
//!
//! # Design Decisions
//! - Emission goes through the `metrics` facade; the embedding
//!   application chooses the recorder/exporter

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Record one finished operation attempt chain.
pub fn record_operation(op_type: &'static str, success: bool, duration: Duration) {
    let outcome = if success { "success" } else { "failure" };
    counter!("cluster_pool_operations_total", "type" => op_type, "outcome" => outcome).increment(1);
    histogram!("cluster_pool_operation_duration_seconds", "type" => op_type)
        .record(duration.as_secs_f64());
}

/// Record a failover retry away from a failed host.
pub fn record_failover_retry(host: &str) {
    counter!("cluster_pool_failover_retries_total", "host" => host.to_string()).increment(1);
}

/// Record a host entering or leaving the live set.
pub fn record_host_live(host: &str, live: bool) {
    gauge!("cluster_pool_host_live", "host" => host.to_string()).set(if live { 1.0 } else { 0.0 });
}

/// Record pool occupancy for a host.
pub fn record_pool_occupancy(host: &str, idle: usize, active: usize) {
    gauge!("cluster_pool_idle_connections", "host" => host.to_string()).set(idle as f64);
    gauge!("cluster_pool_active_connections", "host" => host.to_string()).set(active as f64);
}
