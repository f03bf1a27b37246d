//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! TOML file → loader.rs (read + parse)
//!     → validation.rs (semantic checks, all errors collected)
//!     → schema.rs types consumed by the manager at construction
//! ```

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ClusterConfig, CredentialsConfig, LoadBalancingKind, PoolConfig, RetryConfig,
    TimeoutTrackerConfig,
};
pub use validation::{validate_config, ValidationError};
