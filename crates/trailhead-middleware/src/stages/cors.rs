//! Cross-origin resource sharing stage.
//!
//! Installed only outside production, where the frontend dev server runs on
//! a different origin. CORS headers are queued on the context so they reach
//! error responses as well as handler responses. `OPTIONS` requests are
//! answered here with `204 No Content` and never reach the dispatcher.
//!
//! ```
//! use trailhead_middleware::stages::CorsMiddleware;
//! use http::Method;
//!
//! let cors = CorsMiddleware::builder()
//!     .allow_origin("http://localhost:3000")
//!     .allow_methods([Method::GET, Method::POST])
//!     .allow_credentials(true)
//!     .build();
//! # let _ = cors;
//! ```

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next, StageResult};
use crate::types::{Request, Response, ResponseExt};
use http::{HeaderName, HeaderValue, Method, StatusCode};
use std::collections::HashSet;
use std::time::Duration;

/// CORS header names.
pub mod headers {
    /// `Access-Control-Allow-Origin`.
    pub const ALLOW_ORIGIN: &str = "access-control-allow-origin";
    /// `Access-Control-Allow-Methods`.
    pub const ALLOW_METHODS: &str = "access-control-allow-methods";
    /// `Access-Control-Allow-Headers`.
    pub const ALLOW_HEADERS: &str = "access-control-allow-headers";
    /// `Access-Control-Allow-Credentials`.
    pub const ALLOW_CREDENTIALS: &str = "access-control-allow-credentials";
    /// `Access-Control-Max-Age`.
    pub const MAX_AGE: &str = "access-control-max-age";
    /// `Access-Control-Request-Headers`.
    pub const REQUEST_HEADERS: &str = "access-control-request-headers";
}

/// The set of allowed origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// Any origin (`*`).
    Any,
    /// Only the listed origins, echoed back when matched.
    List(HashSet<String>),
}

impl AllowedOrigins {
    fn header_value(&self, origin: Option<&str>) -> Option<HeaderValue> {
        match self {
            Self::Any => Some(HeaderValue::from_static("*")),
            Self::List(origins) => origin
                .filter(|o| origins.contains(*o))
                .and_then(|o| HeaderValue::from_str(o).ok()),
        }
    }
}

/// CORS middleware.
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    origins: AllowedOrigins,
    methods: Vec<Method>,
    allow_credentials: bool,
    max_age: Option<Duration>,
}

/// Builder for [`CorsMiddleware`].
#[derive(Debug, Clone)]
pub struct CorsBuilder {
    inner: CorsMiddleware,
}

impl Default for CorsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CorsBuilder {
    /// Starts with no allowed origins and the common methods.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: CorsMiddleware {
                origins: AllowedOrigins::List(HashSet::new()),
                methods: vec![
                    Method::GET,
                    Method::HEAD,
                    Method::PUT,
                    Method::PATCH,
                    Method::POST,
                    Method::DELETE,
                ],
                allow_credentials: false,
                max_age: None,
            },
        }
    }

    /// Allows any origin.
    #[must_use]
    pub fn allow_any_origin(mut self) -> Self {
        self.inner.origins = AllowedOrigins::Any;
        self
    }

    /// Adds an allowed origin.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        if let AllowedOrigins::List(origins) = &mut self.inner.origins {
            origins.insert(origin.into());
        }
        self
    }

    /// Sets the allowed methods.
    #[must_use]
    pub fn allow_methods<I>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        self.inner.methods = methods.into_iter().collect();
        self
    }

    /// Sets whether credentials are allowed.
    #[must_use]
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.inner.allow_credentials = allow;
        self
    }

    /// Sets how long browsers may cache a preflight answer.
    #[must_use]
    pub fn max_age(mut self, duration: Duration) -> Self {
        self.inner.max_age = Some(duration);
        self
    }

    /// Builds the middleware.
    #[must_use]
    pub fn build(self) -> CorsMiddleware {
        self.inner
    }
}

impl CorsMiddleware {
    /// Creates a new CORS builder.
    #[must_use]
    pub fn builder() -> CorsBuilder {
        CorsBuilder::new()
    }

    /// Allows any origin with the common methods; requested headers are
    /// reflected back on preflight.
    #[must_use]
    pub fn permissive() -> Self {
        CorsBuilder::new().allow_any_origin().build()
    }

    fn methods_value(&self) -> Option<HeaderValue> {
        let joined = self
            .methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(",");
        HeaderValue::from_str(&joined).ok()
    }

    fn queue_common_headers(&self, ctx: &mut MiddlewareContext, origin: Option<&str>) {
        if let Some(value) = self.origins.header_value(origin) {
            ctx.add_response_header(HeaderName::from_static(headers::ALLOW_ORIGIN), value);
            if matches!(self.origins, AllowedOrigins::List(_)) {
                ctx.add_response_header(http::header::VARY, HeaderValue::from_static("Origin"));
            }
        }
        if self.allow_credentials {
            ctx.add_response_header(
                HeaderName::from_static(headers::ALLOW_CREDENTIALS),
                HeaderValue::from_static("true"),
            );
        }
    }

    fn preflight(&self, ctx: &mut MiddlewareContext, request: &Request) -> Response {
        if let Some(value) = self.methods_value() {
            ctx.add_response_header(HeaderName::from_static(headers::ALLOW_METHODS), value);
        }
        if let Some(requested) = request.headers().get(headers::REQUEST_HEADERS) {
            ctx.add_response_header(
                HeaderName::from_static(headers::ALLOW_HEADERS),
                requested.clone(),
            );
            ctx.add_response_header(
                http::header::VARY,
                HeaderValue::from_static("Access-Control-Request-Headers"),
            );
        }
        if let Some(max_age) = self.max_age {
            if let Ok(value) = HeaderValue::from_str(&max_age.as_secs().to_string()) {
                ctx.add_response_header(HeaderName::from_static(headers::MAX_AGE), value);
            }
        }

        let mut response = Response::empty(StatusCode::NO_CONTENT);
        response
            .headers_mut()
            .insert(http::header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        response
    }
}

impl Middleware for CorsMiddleware {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            let origin = request
                .headers()
                .get(http::header::ORIGIN)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            self.queue_common_headers(ctx, origin.as_deref());

            if request.method() == Method::OPTIONS {
                tracing::debug!(request_id = %ctx.request_id(), "answering CORS preflight");
                return Ok(self.preflight(ctx, &request));
            }

            next.run(ctx, request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DispatchOutcome, FnDispatcher};
    use crate::lifecycle::RequestPhase;
    use crate::stages::NotFoundFallback;
    use bytes::Bytes;
    use trailhead_core::DeploymentMode;
    use http_body_util::Full;

    async fn run(cors: &CorsMiddleware, request: Request) -> (MiddlewareContext, Response) {
        let dispatcher = FnDispatcher::new(|_ctx, _req| {
            DispatchOutcome::Handled(Response::empty(StatusCode::OK))
        });
        let fallback = NotFoundFallback::new();
        let mut ctx = MiddlewareContext::new();
        let mut response = cors
            .process(&mut ctx, request, Next::dispatch(&dispatcher, &fallback))
            .await
            .unwrap();
        ctx.apply_response_headers(response.headers_mut());
        (ctx, response)
    }

    #[tokio::test]
    async fn test_preflight_answered_with_204() {
        let request = http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/users")
            .header(http::header::ORIGIN, "http://localhost:3000")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type,xsrf-token")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let (ctx, response) = run(&CorsMiddleware::permissive(), request).await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers().get(headers::ALLOW_ORIGIN).unwrap(), "*");
        assert_eq!(
            response.headers().get(headers::ALLOW_HEADERS).unwrap(),
            "content-type,xsrf-token"
        );
        assert!(response
            .headers()
            .get(headers::ALLOW_METHODS)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("POST"));
        assert_eq!(ctx.lifecycle().history(), [RequestPhase::Received]);
    }

    #[tokio::test]
    async fn test_preflight_finishes_lifecycle_in_pipeline() {
        let pipeline = crate::pipeline::Pipeline::builder(DeploymentMode::Development)
            .add_policy(CorsMiddleware::permissive())
            .build();
        let request = http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/users")
            .header(http::header::ORIGIN, "http://localhost:3000")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let mut ctx = MiddlewareContext::new();
        let response = pipeline.process(&mut ctx, request).await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(ctx.phase(), RequestPhase::PolicyAnswered);
        assert!(ctx.lifecycle().is_finished());
        assert!(!ctx.lifecycle().faulted());
    }

    #[tokio::test]
    async fn test_simple_request_gets_origin_header() {
        let request = http::Request::builder()
            .uri("/api/users")
            .header(http::header::ORIGIN, "http://localhost:3000")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let (_ctx, response) = run(&CorsMiddleware::permissive(), request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(headers::ALLOW_ORIGIN).unwrap(), "*");
    }

    #[tokio::test]
    async fn test_origin_list_echoes_match_only() {
        let cors = CorsMiddleware::builder()
            .allow_origin("http://localhost:3000")
            .allow_credentials(true)
            .build();

        let allowed = http::Request::builder()
            .uri("/")
            .header(http::header::ORIGIN, "http://localhost:3000")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let (_ctx, response) = run(&cors, allowed).await;
        assert_eq!(
            response.headers().get(headers::ALLOW_ORIGIN).unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(response.headers().get(headers::ALLOW_CREDENTIALS).unwrap(), "true");

        let denied = http::Request::builder()
            .uri("/")
            .header(http::header::ORIGIN, "http://evil.example")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let (_ctx, response) = run(&cors, denied).await;
        assert!(response.headers().get(headers::ALLOW_ORIGIN).is_none());
    }
}
