//! The seam between the pipeline and the business routes.
//!
//! Routing of business endpoints lives outside the pipeline. Whatever owns
//! those routes implements [`Dispatcher`] and reports one of three
//! outcomes: it answered, it raised an error, or no route matched.

use crate::context::MiddlewareContext;
use crate::middleware::BoxFuture;
use crate::types::{Request, Response};
use trailhead_core::AppError;

/// What the dispatcher did with a request.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// A route produced a response.
    Handled(Response),
    /// No route claimed the request. The request is handed back so the
    /// fallback can describe it.
    Unclaimed(Request),
    /// A route raised an error.
    Failed(AppError),
}

impl DispatchOutcome {
    /// Returns `true` for [`DispatchOutcome::Handled`].
    #[must_use]
    pub const fn is_handled(&self) -> bool {
        matches!(self, Self::Handled(_))
    }
}

impl From<Result<Response, AppError>> for DispatchOutcome {
    fn from(result: Result<Response, AppError>) -> Self {
        match result {
            Ok(response) => Self::Handled(response),
            Err(error) => Self::Failed(error),
        }
    }
}

/// Routes requests to business handlers.
pub trait Dispatcher: Send + Sync + 'static {
    /// Dispatches a request that passed every policy filter.
    fn dispatch<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
    ) -> BoxFuture<'a, DispatchOutcome>;
}

/// A dispatcher built from a synchronous closure.
///
/// ```
/// use trailhead_middleware::dispatch::{DispatchOutcome, FnDispatcher};
///
/// let nothing_here = FnDispatcher::new(|_ctx, request| DispatchOutcome::Unclaimed(request));
/// # let _ = nothing_here;
/// ```
pub struct FnDispatcher<F> {
    func: F,
}

impl<F> FnDispatcher<F>
where
    F: Fn(&mut MiddlewareContext, Request) -> DispatchOutcome + Send + Sync + 'static,
{
    /// Wraps a closure as a dispatcher.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Dispatcher for FnDispatcher<F>
where
    F: Fn(&mut MiddlewareContext, Request) -> DispatchOutcome + Send + Sync + 'static,
{
    fn dispatch<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
    ) -> BoxFuture<'a, DispatchOutcome> {
        let outcome = (self.func)(ctx, request);
        Box::pin(async move { outcome })
    }
}

/// A dispatcher with no routes at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRoutes;

impl Dispatcher for NoRoutes {
    fn dispatch<'a>(
        &'a self,
        _ctx: &'a mut MiddlewareContext,
        request: Request,
    ) -> BoxFuture<'a, DispatchOutcome> {
        Box::pin(async move { DispatchOutcome::Unclaimed(request) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResponseExt;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;

    fn request() -> Request {
        http::Request::builder()
            .uri("/anything")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[test]
    fn test_from_result() {
        let ok: DispatchOutcome = Ok(Response::empty(StatusCode::OK)).into();
        assert!(ok.is_handled());

        let err: DispatchOutcome = Err(AppError::unclassified("boom")).into();
        assert!(matches!(err, DispatchOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_no_routes_never_claims() {
        let mut ctx = MiddlewareContext::new();
        let outcome = NoRoutes.dispatch(&mut ctx, request()).await;
        match outcome {
            DispatchOutcome::Unclaimed(req) => assert_eq!(req.uri(), "/anything"),
            other => panic!("expected unclaimed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fn_dispatcher_sees_context() {
        let dispatcher = FnDispatcher::new(|ctx: &mut MiddlewareContext, _req| {
            ctx.set_extension(42_u32);
            DispatchOutcome::Handled(Response::empty(StatusCode::NO_CONTENT))
        });

        let mut ctx = MiddlewareContext::new();
        let outcome = dispatcher.dispatch(&mut ctx, request()).await;
        assert!(outcome.is_handled());
        assert_eq!(ctx.get_extension::<u32>(), Some(&42));
    }
}
