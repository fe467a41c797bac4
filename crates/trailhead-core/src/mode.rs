//! Deployment mode.
//!
//! The mode is read once at startup and threaded explicitly into pipeline
//! construction. Stages never consult the process environment themselves.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// The environment the server is deployed into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// Public deployment: secure cookies, no CORS, redacted traces.
    Production,
    /// Local development.
    #[default]
    Development,
    /// Automated test runs. Behaves like development.
    Test,
}

impl DeploymentMode {
    /// Returns `true` for [`DeploymentMode::Production`].
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a deployment mode string is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown deployment mode `{0}` (expected production, development or test)")]
pub struct ParseModeError(pub String);

impl FromStr for DeploymentMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}
