//! Access log stage.
//!
//! Emits one `info` line per request once the rest of the chain has
//! finished, with the method, path, final status and duration. Failed
//! requests are logged with the status the error responder will use.

use crate::{
    context::MiddlewareContext,
    middleware::{BoxFuture, Middleware, Next, StageResult},
    types::Request,
};

/// Request logging middleware.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogMiddleware;

impl RequestLogMiddleware {
    /// Creates the request log stage.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for RequestLogMiddleware {
    fn name(&self) -> &'static str {
        "request_log"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            let method = request.method().clone();
            let path = request
                .uri()
                .path_and_query()
                .map_or_else(|| request.uri().path().to_string(), ToString::to_string);

            let result = next.run(&mut *ctx, request).await;

            let status = match &result {
                Ok(response) => response.status(),
                Err(error) => error.status_code(),
            };
            let elapsed = ctx.elapsed();

            tracing::info!(
                request_id = %ctx.request_id(),
                method = %method,
                path = %path,
                status = status.as_u16(),
                duration_ms = elapsed.as_secs_f64() * 1000.0,
                "{} {} {}",
                method,
                path,
                status.as_u16()
            );
            trailhead_telemetry::record_request(status.as_u16(), elapsed);

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DispatchOutcome, FnDispatcher};
    use crate::stages::NotFoundFallback;
    use crate::types::{Response, ResponseExt};
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;

    #[tokio::test]
    async fn test_passes_result_through() {
        let stage = RequestLogMiddleware::new();
        let dispatcher = FnDispatcher::new(|_ctx, _req| {
            DispatchOutcome::Handled(Response::empty(StatusCode::ACCEPTED))
        });
        let fallback = NotFoundFallback::new();

        let request = http::Request::builder()
            .uri("/api/ping?x=1")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let mut ctx = MiddlewareContext::new();
        let response = stage
            .process(&mut ctx, request, Next::dispatch(&dispatcher, &fallback))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_errors_are_not_swallowed() {
        let stage = RequestLogMiddleware::new();
        let dispatcher = FnDispatcher::new(|_ctx, req| DispatchOutcome::Unclaimed(req));
        let fallback = NotFoundFallback::new();

        let request = http::Request::builder()
            .uri("/missing")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let mut ctx = MiddlewareContext::new();
        let result = stage
            .process(&mut ctx, request, Next::dispatch(&dispatcher, &fallback))
            .await;
        assert!(result.is_err());
    }
}
