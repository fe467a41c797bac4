//! # Trailhead Telemetry
//!
//! Logging and metrics for the Trailhead booking API.
//!
//! - **Logging**: `tracing-subscriber` with an `EnvFilter`, JSON in
//!   production and pretty output elsewhere
//! - **Metrics**: `metrics` facade with an optional Prometheus recorder
//!
//! ```rust,ignore
//! use trailhead_core::DeploymentMode;
//! use trailhead_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::for_mode(DeploymentMode::Production))?;
//! tracing::info!(port = 5000, "listening");
//! ```

#![doc(html_root_url = "https://docs.rs/trailhead-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use crate::logging::{init_logging, LogConfig, LogFormat};
pub use crate::metrics::{init_metrics, record_error, record_request, MetricsConfig, MetricsRegistry};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
