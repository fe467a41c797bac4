//! Top-level [`TrailheadConfig`].

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use trailhead_core::DeploymentMode;

use crate::{ConfigError, LogFormat, LoggingConfig, MetricsSection, SecurityConfig, ServerConfig};

/// Complete Trailhead configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to layer files and environment
/// variables on top of the defaults.
///
/// # Example
///
/// ```
/// use trailhead_config::TrailheadConfig;
/// use trailhead_core::DeploymentMode;
///
/// let config = TrailheadConfig::default();
/// assert_eq!(config.environment, DeploymentMode::Development);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct TrailheadConfig {
    /// Deployment mode threaded into pipeline construction.
    #[serde(default)]
    pub environment: DeploymentMode,

    /// HTTP server section.
    #[serde(default)]
    pub server: ServerConfig,

    /// Anti-forgery settings.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Logging section.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics section.
    #[serde(default)]
    pub metrics: MetricsSection,
}

impl TrailheadConfig {
    /// Development preset: debug logs, pretty output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            environment: DeploymentMode::Development,
            server: ServerConfig {
                http_addr: "127.0.0.1:5000".to_string(),
                shutdown_timeout_secs: 5,
                ..ServerConfig::default()
            },
            logging: LoggingConfig {
                enabled: true,
                level: "debug".to_string(),
                format: LogFormat::Pretty,
            },
            ..Self::default()
        }
    }

    /// Production preset: JSON logs, metrics on.
    #[must_use]
    pub fn production() -> Self {
        Self {
            environment: DeploymentMode::Production,
            logging: LoggingConfig {
                enabled: true,
                level: "info".to_string(),
                format: LogFormat::Json,
            },
            metrics: MetricsSection {
                enabled: true,
                ..MetricsSection::default()
            },
            ..Self::default()
        }
    }

    /// Checks values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;

        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_body_bytes",
                "must be greater than zero",
            ));
        }

        if self.security.csrf_cookie_name.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "security.csrf_cookie_name",
                "must not be empty",
            ));
        }

        if !self.security.cookie_path.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "security.cookie_path",
                format!("must start with '/': {}", self.security.cookie_path),
            ));
        }

        if let Some(name) = self
            .security
            .csrf_header_names
            .iter()
            .find(|name| !is_header_name(name))
        {
            return Err(ConfigError::invalid_value(
                "security.csrf_header_names",
                format!("not a lowercase header name: {name}"),
            ));
        }

        if self.metrics.histogram_buckets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::invalid_value(
                "metrics.histogram_buckets",
                "must be strictly increasing",
            ));
        }

        Ok(())
    }

    /// Parsed bind address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.http_addr.parse().map_err(|_| {
            ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            )
        })
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }

    /// Shutdown timeout as a [`Duration`].
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

fn is_header_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}
