//! Prometheus metrics.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `trailhead_requests_total` | Counter | `status` | Completed requests |
//! | `trailhead_request_duration_seconds` | Histogram | - | Request latency |
//! | `trailhead_errors_total` | Counter | `kind` | Error responses by error kind |
//!
//! The recording functions are no-ops until a recorder is installed, so
//! library code can call them unconditionally.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Request counter name.
pub const REQUESTS_TOTAL: &str = "trailhead_requests_total";
/// Request latency histogram name.
pub const REQUEST_DURATION_SECONDS: &str = "trailhead_request_duration_seconds";
/// Error counter name.
pub const ERRORS_TOTAL: &str = "trailhead_errors_total";

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus recorder.
    pub enabled: bool,
    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Handle to the installed recorder, used to render `/metrics`.
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    /// Renders all metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Installs the global Prometheus recorder.
///
/// Returns `None` when metrics are disabled.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<Option<MetricsRegistry>> {
    if !config.enabled {
        return Ok(None);
    }
    if config.duration_buckets.is_empty() {
        return Err(TelemetryError::InvalidConfig(
            "duration_buckets must not be empty".to_string(),
        ));
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    register_metric_descriptions();
    Ok(Some(MetricsRegistry { handle }))
}

fn register_metric_descriptions() {
    describe_counter!(REQUESTS_TOTAL, "Total number of HTTP requests processed");
    describe_histogram!(REQUEST_DURATION_SECONDS, "HTTP request duration in seconds");
    describe_counter!(ERRORS_TOTAL, "Error responses by error kind");
}

/// Records a completed request.
pub fn record_request(status_code: u16, duration: Duration) {
    counter!(REQUESTS_TOTAL, "status" => status_code.to_string()).increment(1);
    histogram!(REQUEST_DURATION_SECONDS).record(duration.as_secs_f64());
}

/// Records an error response.
pub fn record_error(kind: &'static str) {
    counter!(ERRORS_TOTAL, "kind" => kind).increment(1);
}
