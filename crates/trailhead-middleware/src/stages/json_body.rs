//! JSON body parsing stage.
//!
//! Requests whose `Content-Type` is `application/json` have their body
//! parsed once and stored as a [`JsonBody`] extension. Other content types
//! and empty bodies pass through untouched. A body that does not parse, or
//! whose top-level value is not an object or array, fails the request with
//! [`AppError::MalformedBody`].

use crate::{
    context::MiddlewareContext,
    middleware::{BoxFuture, Middleware, Next, StageResult},
    types::Request,
};
use bytes::Bytes;
use http::header;
use http_body_util::{BodyExt, Full};
use serde::de::DeserializeOwned;
use serde_json::Value;
use trailhead_core::AppError;

/// A parsed JSON request body.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonBody(pub Value);

impl JsonBody {
    /// Returns a top-level field, if the body is an object.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.as_object().and_then(|map| map.get(name))
    }

    /// Deserializes the body into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        T::deserialize(&self.0).map_err(|e| AppError::malformed_body(e.to_string()))
    }
}

/// JSON body parsing middleware.
#[derive(Debug, Clone, Copy)]
pub struct JsonBodyMiddleware {
    strict: bool,
}

impl Default for JsonBodyMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonBodyMiddleware {
    /// Creates a strict JSON parser (objects and arrays only).
    #[must_use]
    pub const fn new() -> Self {
        Self { strict: true }
    }

    /// Accepts any top-level JSON value, including bare strings and numbers.
    #[must_use]
    pub const fn lenient() -> Self {
        Self { strict: false }
    }

    fn parse(&self, bytes: &[u8]) -> Result<Value, AppError> {
        if self.strict {
            let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
            if !matches!(first, Some(b'{' | b'[')) {
                return Err(AppError::malformed_body(
                    "request body must be a JSON object or array",
                ));
            }
        }
        serde_json::from_slice(bytes).map_err(|e| AppError::malformed_body(e.to_string()))
    }
}

/// Returns `true` if the request declares a JSON body.
pub(crate) fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
}

impl Middleware for JsonBodyMiddleware {
    fn name(&self) -> &'static str {
        "json_body"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            if !is_json(&request) {
                return next.run(ctx, request).await;
            }

            let (parts, body) = request.into_parts();
            let bytes: Bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(never) => match never {},
            };

            if !bytes.iter().all(u8::is_ascii_whitespace) {
                let value = self.parse(&bytes)?;
                ctx.set_extension(JsonBody(value));
            }

            let request = Request::from_parts(parts, Full::new(bytes));
            next.run(ctx, request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DispatchOutcome, FnDispatcher};
    use crate::stages::NotFoundFallback;
    use crate::types::{Response, ResponseExt};
    use http::StatusCode;

    fn request(content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = http::Request::builder().method("POST").uri("/api/users");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        builder.body(Full::new(Bytes::from_static(body.as_bytes()))).unwrap()
    }

    async fn run(request: Request) -> (MiddlewareContext, StageResult) {
        let dispatcher = FnDispatcher::new(|_ctx, _req| {
            DispatchOutcome::Handled(Response::empty(StatusCode::OK))
        });
        let fallback = NotFoundFallback::new();
        let mut ctx = MiddlewareContext::new();
        let result = JsonBodyMiddleware::new()
            .process(&mut ctx, request, Next::dispatch(&dispatcher, &fallback))
            .await;
        (ctx, result)
    }

    #[tokio::test]
    async fn test_parses_json_object() {
        let (ctx, result) = run(request(
            Some("application/json; charset=utf-8"),
            r#"{"email":"a@b.c","_csrf":"tok"}"#,
        ))
        .await;

        assert!(result.is_ok());
        let body = ctx.get_extension::<JsonBody>().unwrap();
        assert_eq!(body.field("_csrf").and_then(Value::as_str), Some("tok"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (_ctx, result) = run(request(Some("application/json"), "{not json")).await;
        let err = result.unwrap_err();
        assert!(matches!(err, AppError::MalformedBody { .. }));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_strict_rejects_bare_values() {
        let (_ctx, result) = run(request(Some("application/json"), "\"hello\"")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_body_has_no_value() {
        let (ctx, result) = run(request(Some("application/json"), "  ")).await;
        assert!(result.is_ok());
        assert!(!ctx.has_extension::<JsonBody>());
    }

    #[tokio::test]
    async fn test_other_content_types_skipped() {
        let (ctx, result) = run(request(Some("text/plain"), "{not json")).await;
        assert!(result.is_ok());
        assert!(!ctx.has_extension::<JsonBody>());
    }

    #[test]
    fn test_lenient_accepts_scalars() {
        let value = JsonBodyMiddleware::lenient().parse(b"42").unwrap();
        assert_eq!(value, Value::from(42));
    }

    #[test]
    fn test_deserialize_into_struct() {
        #[derive(serde::Deserialize)]
        struct SignUp {
            email: String,
        }

        let body = JsonBody(serde_json::json!({"email": "demo@user.demo"}));
        let parsed: SignUp = body.deserialize().unwrap();
        assert_eq!(parsed.email, "demo@user.demo");
    }
}
