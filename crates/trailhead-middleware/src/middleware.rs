//! Core middleware trait and chain types.
//!
//! Every stage implements [`Middleware`]. A stage receives the mutable
//! context, the request, and a [`Next`] handle for the rest of the chain.
//! It returns `Ok(response)` to continue the happy path or `Err(AppError)`
//! to short-circuit to the error classifier and responder.
//!
//! # Example
//!
//! ```
//! use trailhead_middleware::{BoxFuture, Middleware, MiddlewareContext, Next, Request, Response};
//! use trailhead_core::AppError;
//!
//! struct DenyDelete;
//!
//! impl Middleware for DenyDelete {
//!     fn name(&self) -> &'static str {
//!         "deny_delete"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut MiddlewareContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Result<Response, AppError>> {
//!         Box::pin(async move {
//!             if request.method() == http::Method::DELETE {
//!                 return Err(AppError::authorization("deletes are disabled"));
//!             }
//!             next.run(ctx, request).await
//!         })
//!     }
//! }
//! ```

use crate::context::MiddlewareContext;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::lifecycle::RequestPhase;
use crate::stages::NotFoundFallback;
use crate::types::{Request, Response};
use std::future::Future;
use std::pin::Pin;
use trailhead_core::AppError;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of a stage: a response, or an error for the error path.
pub type StageResult = Result<Response, AppError>;

/// The core middleware trait.
///
/// # Invariants
///
/// - A stage calls `next.run()` at most once.
/// - A stage never turns an `Err` from downstream back into `Ok`; recovery
///   belongs to the error classifier and responder alone.
pub trait Middleware: Send + Sync + 'static {
    /// Returns the unique name of this stage, used in logs.
    fn name(&self) -> &'static str;

    /// Processes the request through this stage.
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult>;
}

/// Handle to the remainder of the chain.
///
/// `run` consumes the handle, so the remainder can run at most once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    /// Another stage follows.
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    /// Record a lifecycle phase, then continue.
    Checkpoint {
        phase: RequestPhase,
        next: Box<Next<'a>>,
    },
    /// End of the chain: hand the request to the dispatcher.
    Dispatch {
        dispatcher: &'a dyn Dispatcher,
        fallback: &'a NotFoundFallback,
    },
}

impl<'a> Next<'a> {
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    pub(crate) fn checkpoint(phase: RequestPhase, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Checkpoint {
                phase,
                next: Box::new(next),
            },
        }
    }

    pub(crate) fn dispatch(dispatcher: &'a dyn Dispatcher, fallback: &'a NotFoundFallback) -> Self {
        Self {
            inner: NextInner::Dispatch {
                dispatcher,
                fallback,
            },
        }
    }

    /// Invokes the remainder of the chain.
    pub fn run<'b>(self, ctx: &'b mut MiddlewareContext, request: Request) -> BoxFuture<'b, StageResult>
    where
        'a: 'b,
    {
        Box::pin(async move {
            match self.inner {
                NextInner::Chain { middleware, next } => {
                    middleware.process(ctx, request, *next).await
                }
                NextInner::Checkpoint { phase, next } => {
                    ctx.enter(phase);
                    next.run(ctx, request).await
                }
                NextInner::Dispatch {
                    dispatcher,
                    fallback,
                } => {
                    ctx.enter(RequestPhase::Dispatched);
                    match dispatcher.dispatch(ctx, request).await {
                        DispatchOutcome::Handled(response) => {
                            ctx.enter(RequestPhase::HandlerCompleted);
                            Ok(response)
                        }
                        DispatchOutcome::Unclaimed(request) => Err(fallback.resolve(ctx, &request)),
                        DispatchOutcome::Failed(error) => Err(error),
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::FnDispatcher;
    use crate::types::ResponseExt;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;

    struct Tag(&'static str);

    impl Middleware for Tag {
        fn name(&self) -> &'static str {
            self.0
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut MiddlewareContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, StageResult> {
            Box::pin(async move {
                let mut seen: Vec<&'static str> =
                    ctx.remove_extension().unwrap_or_default();
                seen.push(self.0);
                ctx.set_extension(seen);
                next.run(ctx, request).await
            })
        }
    }

    fn request() -> Request {
        http::Request::builder()
            .uri("/test")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_chain_runs_in_order_then_dispatches() {
        let dispatcher = FnDispatcher::new(|_ctx, _req| {
            DispatchOutcome::Handled(Response::empty(StatusCode::OK))
        });
        let fallback = NotFoundFallback::new();
        let first = Tag("first");
        let second = Tag("second");

        let next = Next::new(&first, Next::new(&second, Next::dispatch(&dispatcher, &fallback)));
        let mut ctx = MiddlewareContext::new();
        let response = next.run(&mut ctx, request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            ctx.get_extension::<Vec<&'static str>>().unwrap(),
            &vec!["first", "second"]
        );
    }

    #[tokio::test]
    async fn test_unclaimed_becomes_not_found() {
        let dispatcher = FnDispatcher::new(|_ctx, req| DispatchOutcome::Unclaimed(req));
        let fallback = NotFoundFallback::new();

        let mut ctx = MiddlewareContext::new();
        let err = Next::dispatch(&dispatcher, &fallback)
            .run(&mut ctx, request())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound));
    }
}
