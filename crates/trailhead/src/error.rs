//! Startup errors.

use std::path::PathBuf;

use thiserror::Error;
use trailhead_config::ConfigError;
use trailhead_server::ServerError;
use trailhead_store::StoreError;
use trailhead_telemetry::TelemetryError;

/// Errors that stop the application before or while serving.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging or metrics could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The server failed to bind or serve.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Seeding demo users failed.
    #[error("failed to seed demo users: {0}")]
    Seed(#[from] StoreError),

    /// A bookings snapshot could not be read.
    #[error("failed to read bookings from {path}: {source}")]
    BookingsFile {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A bookings snapshot is not valid JSON.
    #[error("invalid bookings snapshot: {0}")]
    BookingsJson(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_is_transparent() {
        let error = StartupError::from(ConfigError::invalid_value("server.http_addr", "not an address"));
        assert_eq!(
            error.to_string(),
            ConfigError::invalid_value("server.http_addr", "not an address").to_string()
        );
    }

    #[test]
    fn test_bookings_file_message() {
        let error = StartupError::BookingsFile {
            path: PathBuf::from("bookings.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(error.to_string(), "failed to read bookings from bookings.json: missing");
    }
}
