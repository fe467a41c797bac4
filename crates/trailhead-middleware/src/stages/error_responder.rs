//! Terminal error responder.
//!
//! Logs the raw error, then renders the normalized error as the fixed-shape
//! JSON body. The diagnostic trace is dropped in production.

use crate::context::MiddlewareContext;
use crate::types::{Response, ResponseExt};
use trailhead_core::{AppError, DeploymentMode, NormalizedError};

/// The error responder.
#[derive(Debug, Clone, Copy)]
pub struct ErrorResponder {
    mode: DeploymentMode,
}

impl ErrorResponder {
    /// Creates a responder for the given deployment mode.
    #[must_use]
    pub const fn new(mode: DeploymentMode) -> Self {
        Self { mode }
    }

    /// Returns the deployment mode.
    #[must_use]
    pub const fn mode(&self) -> DeploymentMode {
        self.mode
    }

    /// Builds the error response, consuming the error.
    pub fn respond(
        &self,
        ctx: &MiddlewareContext,
        raw: AppError,
        normalized: NormalizedError,
    ) -> Response {
        tracing::error!(
            request_id = %ctx.request_id(),
            kind = normalized.kind.as_str(),
            status = normalized.status.as_u16(),
            error = ?raw,
            "{}",
            raw
        );
        trailhead_telemetry::record_error(normalized.kind.as_str());

        let status = normalized.status;
        let body = normalized.into_body(self.mode);
        Response::json(status, &body)
    }
}
