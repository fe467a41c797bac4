//! Structured logging setup.
//!
//! Production logs are JSON lines; development and test logs use the
//! human-readable pretty format. The level string is an `EnvFilter`
//! directive, so `info,trailhead_store=debug` works.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use serde::{Deserialize, Serialize};
use trailhead_core::DeploymentMode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,
    /// `EnvFilter` directive, e.g. `"info"`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Whether to include file/line info.
    pub file_line_info: bool,
    /// Whether to include the target (module path).
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::for_mode(DeploymentMode::default())
    }
}

impl LogConfig {
    /// Human-readable debug output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            file_line_info: true,
            include_target: true,
        }
    }

    /// JSON output at `info`.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Json,
            file_line_info: false,
            include_target: true,
        }
    }

    /// Picks the preset for a deployment mode.
    #[must_use]
    pub fn for_mode(mode: DeploymentMode) -> Self {
        match mode {
            DeploymentMode::Production => Self::production(),
            DeploymentMode::Development | DeploymentMode::Test => Self::development(),
        }
    }
}

/// Installs the global tracing subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;
    let layer = tracing_subscriber::fmt::layer()
        .with_file(config.file_line_info)
        .with_line_number(config.file_line_info)
        .with_target(config.include_target);

    let layer = match config.format {
        LogFormat::Json => layer.json().with_filter(filter).boxed(),
        LogFormat::Pretty => layer.pretty().with_filter(filter).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Parses an `EnvFilter` directive such as `info,trailhead_store=debug`.
pub fn create_env_filter(directive: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(directive)
        .map_err(|e| TelemetryError::InvalidConfig(format!("log level `{directive}`: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_follow_mode() {
        assert_eq!(LogConfig::for_mode(DeploymentMode::Production).format, LogFormat::Json);
        assert_eq!(LogConfig::for_mode(DeploymentMode::Development).format, LogFormat::Pretty);
        assert_eq!(LogConfig::for_mode(DeploymentMode::Test).format, LogFormat::Pretty);
    }

    #[test]
    fn test_env_filter_parsing() {
        assert!(create_env_filter("info,trailhead_store=debug").is_ok());
        assert!(create_env_filter("not a [valid filter").is_err());
    }

    #[test]
    fn test_disabled_logging_is_noop() {
        let config = LogConfig {
            enabled: false,
            ..LogConfig::production()
        };
        assert!(init_logging(&config).is_ok());
    }

    #[test]
    fn test_format_serde() {
        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
    }
}
