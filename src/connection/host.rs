//! Cluster host identity.
//!
//! # Responsibilities
//! - Identify one cluster node by address and port
//! - Carry the per-host pool tunables resolved from configuration
//!
//! # Design Decisions
//! - Equality and hashing use address+port only; tunables are payload,
//!   not identity, so a re-added host with new settings still matches
//!   its downed-queue entry
//! - Immutable after construction

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Default bound on concurrent connections per host.
pub const DEFAULT_MAX_ACTIVE: usize = 50;

/// Credentials presented when opening a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// One node of the target cluster.
///
/// Identity is `address:port`; everything else is per-host tuning.
#[derive(Debug, Clone)]
pub struct Host {
    address: String,
    port: u16,
    /// Keyspace to bind new connections to.
    pub keyspace: Option<String>,
    /// Credentials for new connections.
    pub credentials: Option<Credentials>,
    /// Upper bound on concurrent connections in this host's pool.
    pub max_active: usize,
    /// How long a borrow may wait on an exhausted pool. Zero means
    /// wait forever (in shutdown-observing slices).
    pub max_wait_when_exhausted: Duration,
}

impl Host {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            keyspace: None,
            credentials: None,
            max_active: DEFAULT_MAX_ACTIVE,
            max_wait_when_exhausted: Duration::ZERO,
        }
    }

    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_max_active(mut self, max_active: usize) -> Self {
        self.max_active = max_active;
        self
    }

    pub fn with_max_wait_when_exhausted(mut self, max_wait: Duration) -> Self {
        self.max_wait_when_exhausted = max_wait;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `address:port`, used in logs and status output.
    pub fn name(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.port == other.port
    }
}

impl Eq for Host {}

impl Hash for Host {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Error parsing a `address:port` host string.
#[derive(Debug, Error)]
#[error("invalid host '{0}', expected address:port")]
pub struct InvalidHost(pub String);

impl FromStr for Host {
    type Err = InvalidHost;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, port) = s.rsplit_once(':').ok_or_else(|| InvalidHost(s.to_string()))?;
        if address.is_empty() {
            return Err(InvalidHost(s.to_string()));
        }
        let port: u16 = port.parse().map_err(|_| InvalidHost(s.to_string()))?;
        Ok(Host::new(address, port))
    }
}
