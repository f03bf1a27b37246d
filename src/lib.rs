//! Cluster connection pooling and failover library

pub mod config;
pub mod connection;
pub mod errors;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod manager;
pub mod observability;

pub use config::schema::ClusterConfig;
pub use connection::{Connector, ConnectionPool, Host, HostPool, Lease, RawConnection};
pub use errors::{ClassifiedError, RawError};
pub use lifecycle::Shutdown;
pub use manager::{
    ClusterConnectionManager, ConsistencyLevel, ExecutionResult, FailoverPolicy, Operation,
    OperationType,
};
