//! Shared utilities for integration testing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use cluster_pool::{ClusterConfig, Connector, Host, RawConnection, RawError};

/// A connection carrying its origin host, so operation bodies can
/// behave differently per host.
pub struct ScriptedConn {
    pub host: String,
    healthy: bool,
}

impl RawConnection for ScriptedConn {
    fn is_healthy(&self) -> bool {
        self.healthy
    }

    fn close(&mut self) {
        self.healthy = false;
    }
}

/// Connector with a per-host reachability switch and a dial counter,
/// so tests can take hosts off the network and bring them back.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    refused: Arc<Mutex<HashSet<String>>>,
    dials: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse(&self, host: &str) {
        self.refused.lock().unwrap().insert(host.to_string());
    }

    #[allow(dead_code)]
    pub fn accept(&self, host: &str) {
        self.refused.lock().unwrap().remove(host);
    }

    #[allow(dead_code)]
    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Conn = ScriptedConn;

    async fn open(&self, host: &Host) -> Result<ScriptedConn, RawError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if self.refused.lock().unwrap().contains(&host.name()) {
            return Err(RawError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(ScriptedConn {
            host: host.name(),
            healthy: true,
        })
    }
}

/// Config with small pools and fast sweeps, sized for tests.
pub fn test_config(name: &str, hosts: &[&str]) -> ClusterConfig {
    let mut config = ClusterConfig::default();
    config.name = name.into();
    config.hosts = hosts.iter().map(|s| s.to_string()).collect();
    config.pool.max_active = 4;
    config.pool.max_wait_when_exhausted_ms = 200;
    config.retry.retry_delay_secs = 1;
    config
}
