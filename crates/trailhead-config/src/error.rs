//! Errors raised while assembling a [`TrailheadConfig`](crate::TrailheadConfig).

use std::path::PathBuf;
use thiserror::Error;

/// Anything that stops a configuration from loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The named file does not exist.
    #[error("config file {path} does not exist")]
    FileNotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("could not read config file {path}")]
    Read {
        /// Requested path.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Invalid TOML, or a key the schema does not know.
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid JSON, or a key the schema does not know.
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// A value parsed but failed validation.
    #[error("{field}: {reason}")]
    InvalidValue {
        /// Dotted path, e.g. `server.http_addr`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An override variable carried an unusable value.
    #[error("environment override {var} rejected: {reason}")]
    EnvVar {
        /// Variable name.
        var: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A `.env` file was found but is malformed.
    #[error(".env file could not be loaded: {0}")]
    Dotenv(#[from] dotenvy::Error),

    /// Neither TOML nor JSON.
    #[error("config format `{0}` is not supported (use toml or json)")]
    UnsupportedFormat(String),
}

impl ConfigError {
    /// Missing file.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Unreadable file.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Rejected value.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Rejected override variable.
    pub fn env_var(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvVar {
            var: var.into(),
            reason: reason.into(),
        }
    }
}
