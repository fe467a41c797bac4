//! Cookie parsing stage.
//!
//! Parses the `Cookie` header once and stores the [`Cookies`] jar in the
//! context for later stages and dispatchers.

use crate::{
    context::MiddlewareContext,
    cookie::Cookies,
    middleware::{BoxFuture, Middleware, Next, StageResult},
    types::Request,
};

/// Cookie parsing middleware.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieParserMiddleware;

impl CookieParserMiddleware {
    /// Creates the cookie parsing stage.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for CookieParserMiddleware {
    fn name(&self) -> &'static str {
        "cookie_parser"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            let cookies = Cookies::from_headers(request.headers());
            tracing::trace!(count = cookies.len(), "parsed request cookies");
            ctx.set_extension(cookies);
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
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;

    #[tokio::test]
    async fn test_cookies_available_to_dispatcher() {
        let dispatcher = FnDispatcher::new(|ctx: &mut MiddlewareContext, _req| {
            let theme = ctx
                .get_extension::<Cookies>()
                .and_then(|c| c.get("theme"))
                .unwrap_or("none")
                .to_string();
            assert_eq!(theme, "dark");
            DispatchOutcome::Handled(Response::empty(StatusCode::OK))
        });
        let fallback = NotFoundFallback::new();

        let request = http::Request::builder()
            .uri("/")
            .header(http::header::COOKIE, "theme=dark; _csrf=abc")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let mut ctx = MiddlewareContext::new();
        CookieParserMiddleware::new()
            .process(&mut ctx, request, Next::dispatch(&dispatcher, &fallback))
            .await
            .unwrap();

        assert_eq!(ctx.get_extension::<Cookies>().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_no_cookie_header_gives_empty_jar() {
        let dispatcher = FnDispatcher::new(|_ctx, _req| {
            DispatchOutcome::Handled(Response::empty(StatusCode::OK))
        });
        let fallback = NotFoundFallback::new();

        let request = http::Request::builder()
            .uri("/")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let mut ctx = MiddlewareContext::new();
        CookieParserMiddleware::new()
            .process(&mut ctx, request, Next::dispatch(&dispatcher, &fallback))
            .await
            .unwrap();

        assert!(ctx.get_extension::<Cookies>().unwrap().is_empty());
    }
}
