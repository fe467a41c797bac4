//! `GET /health`.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Body of a health response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Always `"ok"` while the process can answer.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Seconds since the server started.
    pub uptime_seconds: u64,
}

/// Liveness reporter.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    service: String,
    version: String,
    started: Instant,
}

impl HealthCheck {
    /// Starts the uptime clock.
    pub fn new(service: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            version: version.into(),
            started: Instant::now(),
        }
    }

    /// Time since construction.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> HealthStatus {
        HealthStatus {
            status: "ok".to_string(),
            service: self.service.clone(),
            version: self.version.clone(),
            uptime_seconds: self.uptime().as_secs(),
        }
    }
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self::new("trailhead", env!("CARGO_PKG_VERSION"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        let status = HealthCheck::new("trailhead", "1.2.3").status();
        assert_eq!(status.status, "ok");
        assert_eq!(status.version, "1.2.3");
        assert_eq!(status.uptime_seconds, 0);
    }

    #[test]
    fn test_serializes() {
        let json = serde_json::to_value(HealthCheck::default().status()).unwrap();
        assert_eq!(json["service"], "trailhead");
        assert!(json["uptime_seconds"].is_u64());
    }
}
