//! Configuration sections.

use serde::{Deserialize, Serialize};

/// HTTP server section.
///
/// # Example
///
/// ```
/// use trailhead_config::ServerConfig;
///
/// let config = ServerConfig {
///     http_addr: "127.0.0.1:5000".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.max_body_bytes, 1024 * 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address, e.g. `"0.0.0.0:5000"`.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Per-request timeout in milliseconds, body read included.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Largest accepted request body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            request_timeout_ms: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Anti-forgery cookie and token settings.
///
/// `Secure` and `SameSite` are not configurable here: they follow the
/// deployment mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    /// Name of the secret cookie.
    #[serde(default = "default_csrf_cookie_name")]
    pub csrf_cookie_name: String,

    /// Request headers searched for the token, in order.
    #[serde(default = "default_csrf_header_names")]
    pub csrf_header_names: Vec<String>,

    /// `Path` attribute of the secret cookie.
    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            csrf_cookie_name: default_csrf_cookie_name(),
            csrf_header_names: default_csrf_header_names(),
            cookie_path: default_cookie_path(),
        }
    }
}

fn default_csrf_cookie_name() -> String {
    "_csrf".to_string()
}

fn default_csrf_header_names() -> Vec<String> {
    ["csrf-token", "xsrf-token", "x-csrf-token", "x-xsrf-token"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines.
    Json,
    /// Human-readable output.
    #[default]
    Pretty,
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// `EnvFilter` directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default)]
    pub enabled: bool,

    /// Histogram buckets for request duration, in seconds.
    #[serde(default = "default_histogram_buckets")]
    pub histogram_buckets: Vec<f64>,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            histogram_buckets: default_histogram_buckets(),
        }
    }
}

fn default_histogram_buckets() -> Vec<f64> {
    vec![
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ]
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, "0.0.0.0:5000");
        assert_eq!(config.shutdown_timeout_secs, 30);
        assert_eq!(config.request_timeout_ms, 30_000);
    }

    #[test]
    fn test_security_defaults() {
        let config = SecurityConfig::default();
        assert_eq!(config.csrf_cookie_name, "_csrf");
        assert_eq!(config.csrf_header_names[0], "csrf-token");
        assert_eq!(config.csrf_header_names.len(), 4);
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let config: SecurityConfig = toml::from_str(r#"csrf_cookie_name = "_trail""#).unwrap();
        assert_eq!(config.csrf_cookie_name, "_trail");
        assert_eq!(config.cookie_path, "/");
    }

    #[test]
    fn test_log_format_serde() {
        let config: LoggingConfig = toml::from_str(r#"format = "json""#).unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.enabled);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<ServerConfig, _> = toml::from_str("port = 5000");
        assert!(result.is_err());
    }

    #[test]
    fn test_metrics_disabled_by_default() {
        assert!(!MetricsSection::default().enabled);
    }
}
