//! Telemetry setup failures.

use thiserror::Error;

/// Raised when the log subscriber or the metrics recorder cannot be installed.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The Prometheus recorder was rejected, usually because one is already installed.
    #[error("metrics recorder could not be installed: {0}")]
    MetricsInit(String),

    /// The global subscriber was rejected, usually because one is already installed.
    #[error("log subscriber could not be installed: {0}")]
    LoggingInit(String),

    /// A setting is unusable, such as an unparsable level directive.
    #[error("invalid telemetry setting: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = TelemetryError::MetricsInit("already set".to_string());
        assert_eq!(err.to_string(), "metrics recorder could not be installed: already set");

        let err = TelemetryError::InvalidConfig("bad level".to_string());
        assert_eq!(err.to_string(), "invalid telemetry setting: bad level");
    }
}
