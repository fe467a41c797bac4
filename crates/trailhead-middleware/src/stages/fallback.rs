//! Fallback for requests no route claimed.

use crate::{context::MiddlewareContext, types::Request};
use trailhead_core::AppError;

/// Turns an unclaimed request into [`AppError::NotFound`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFoundFallback;

impl NotFoundFallback {
    /// Creates the fallback.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Produces the not-found error for `request`.
    pub fn resolve(&self, ctx: &MiddlewareContext, request: &Request) -> AppError {
        tracing::debug!(
            request_id = %ctx.request_id(),
            method = %request.method(),
            path = %request.uri().path(),
            "no route matched"
        );
        AppError::not_found()
    }
}
