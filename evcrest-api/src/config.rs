//! Gateway Configuration Module
//!
//! Configuration is loaded from environment variables with defaults suited
//! to local development. Numeric values that fail to parse fall back to
//! their defaults; the bind address is validated when it is resolved.

use std::net::SocketAddr;

use crate::error::{ApiError, ApiResult};

const DEFAULT_BIND: &str = "0.0.0.0";
const DEFAULT_PORT: &str = "8080";
const DEFAULT_SERVER_GROUPS: usize = 3;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

// ============================================================================
// GATEWAY CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Host to bind, as given.
    pub bind_host: String,

    /// Port to bind, as given. Checked by [`GatewayConfig::bind_addr`].
    pub port: String,

    /// Number of server groups in the in-process cluster. At least 1.
    pub server_groups: usize,

    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,

    /// Deployment environment name, reported in logs.
    pub environment: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT.to_string(),
            server_groups: DEFAULT_SERVER_GROUPS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            environment: "development".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Create GatewayConfig from environment variables.
    ///
    /// Environment variables:
    /// - `EVCREST_BIND`: Host to bind (default: 0.0.0.0)
    /// - `PORT` or `EVCREST_PORT`: Port to bind, `PORT` wins (default: 8080)
    /// - `EVCREST_SERVER_GROUPS`: Server groups in the cluster (default: 3)
    /// - `EVCREST_MAX_BODY_BYTES`: Request body limit (default: 1048576)
    /// - `EVCREST_ENVIRONMENT`: Environment name (default: development)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_host = lookup("EVCREST_BIND")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.bind_host);

        let port = lookup("PORT")
            .or_else(|| lookup("EVCREST_PORT"))
            .map(|s| s.trim().to_string())
            .unwrap_or(defaults.port);

        let server_groups = lookup("EVCREST_SERVER_GROUPS")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|n| *n >= 1)
            .unwrap_or(defaults.server_groups);

        let max_body_bytes = lookup("EVCREST_MAX_BODY_BYTES")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_body_bytes);

        let environment = lookup("EVCREST_ENVIRONMENT").unwrap_or(defaults.environment);

        Self {
            bind_host,
            port,
            server_groups,
            max_body_bytes,
            environment,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.to_lowercase().as_str(), "production" | "prod")
    }

    /// Resolve host and port into a socket address.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        resolve_bind_addr(&self.bind_host, &self.port)
    }
}

pub fn resolve_bind_addr(host: &str, port: &str) -> ApiResult<SocketAddr> {
    let port = port
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> GatewayConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]);
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(config.bind_host, "0.0.0.0");
        assert_eq!(config.port, "8080");
        assert_eq!(config.server_groups, 3);
        assert_eq!(config.max_body_bytes, 1_048_576);
        assert!(!config.is_production());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("EVCREST_BIND", "127.0.0.1"),
            ("EVCREST_PORT", "9090"),
            ("EVCREST_SERVER_GROUPS", "5"),
            ("EVCREST_MAX_BODY_BYTES", "2048"),
            ("EVCREST_ENVIRONMENT", "production"),
        ]);
        assert_eq!(config.bind_host, "127.0.0.1");
        assert_eq!(config.port, "9090");
        assert_eq!(config.server_groups, 5);
        assert_eq!(config.max_body_bytes, 2048);
        assert!(config.is_production());
    }

    #[test]
    fn test_port_env_wins_over_evcrest_port() {
        let config = config_from(&[("PORT", "7000"), ("EVCREST_PORT", "9090")]);
        assert_eq!(config.port, "7000");
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        let config = config_from(&[
            ("EVCREST_SERVER_GROUPS", "0"),
            ("EVCREST_MAX_BODY_BYTES", "lots"),
        ]);
        assert_eq!(config.server_groups, 3);
        assert_eq!(config.max_body_bytes, 1_048_576);
    }

    #[test]
    fn test_bind_addr_resolution() -> Result<(), String> {
        let addr = config_from(&[("EVCREST_BIND", "127.0.0.1"), ("PORT", "3001")])
            .bind_addr()
            .map_err(|e| e.to_string())?;
        assert_eq!(addr.to_string(), "127.0.0.1:3001");
        Ok(())
    }

    #[test]
    fn test_bind_addr_rejects_bad_input() {
        assert!(resolve_bind_addr("0.0.0.0", "http").is_err());
        assert!(resolve_bind_addr("0.0.0.0", "70000").is_err());
        assert!(resolve_bind_addr("not a host", "80").is_err());
    }
}
