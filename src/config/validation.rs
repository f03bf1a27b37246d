//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check host strings parse and value ranges make sense
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: ClusterConfig → Result<(), Vec<ValidationError>>

use crate::config::schema::ClusterConfig;
use crate::connection::host::Host;

/// One semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration, collecting every problem.
pub fn validate_config(config: &ClusterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.hosts.is_empty() {
        errors.push(ValidationError {
            field: "hosts".into(),
            message: "at least one seed host is required".into(),
        });
    }
    for host in &config.hosts {
        if host.parse::<Host>().is_err() {
            errors.push(ValidationError {
                field: "hosts".into(),
                message: format!("'{}' is not an address:port pair", host),
            });
        }
    }

    if config.pool.max_active == 0 {
        errors.push(ValidationError {
            field: "pool.max_active".into(),
            message: "must be at least 1".into(),
        });
    }

    if config.retry.retry_delay_secs == 0 {
        errors.push(ValidationError {
            field: "retry.retry_delay_secs".into(),
            message: "must be at least 1".into(),
        });
    }

    if config.timeout_tracker.timeout_counter == 0 {
        errors.push(ValidationError {
            field: "timeout_tracker.timeout_counter".into(),
            message: "must be at least 1".into(),
        });
    }
    if config.timeout_tracker.window_ms == 0 {
        errors.push(ValidationError {
            field: "timeout_tracker.window_ms".into(),
            message: "must be greater than zero".into(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
