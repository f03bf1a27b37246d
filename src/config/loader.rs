//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ClusterConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ClusterConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<ClusterConfig, ConfigError> {
    let config: ClusterConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LoadBalancingKind;

    #[test]
    fn parses_a_full_config() {
        let config = parse_config(
            r#"
            name = "orders"
            hosts = ["10.0.0.1:9160", "10.0.0.2:9160"]
            keyspace = "orders_ks"
            load_balancing = "least_active"

            [pool]
            max_active = 20
            max_wait_when_exhausted_ms = 2000

            [retry]
            queue_size = 64
            retry_delay_secs = 5

            [timeout_tracker]
            timeout_counter = 5
            window_ms = 750
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "orders");
        assert_eq!(config.hosts.len(), 2);
        assert_eq!(config.pool.max_active, 20);
        assert_eq!(config.load_balancing, LoadBalancingKind::LeastActive);
        assert_eq!(config.retry.retry_delay_secs, 5);
        assert_eq!(config.timeout_tracker.window_ms, 750);
        // Unset sections keep their defaults.
        assert_eq!(config.timeout_tracker.suspension_secs, 10);
    }

    #[test]
    fn rejects_invalid_values_with_all_errors() {
        let err = parse_config(
            r#"
            hosts = ["bad host"]
            [pool]
            max_active = 0
            "#,
        )
        .unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation failure, got {}", other),
        }
    }
}
