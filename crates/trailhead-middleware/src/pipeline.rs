//! The request processing pipeline.
//!
//! A pipeline is an ordered list of named stages that cannot change after
//! construction:
//!
//! ```text
//! Request → [ingress normalizers] → [access policy filters] → Dispatcher
//!                                                                 │
//!                                                  unclaimed → NotFound
//!
//! any Err ─────────────→ ErrorClassifier → ErrorResponder → Response
//! ```
//!
//! Stages run strictly in registration order. The first `Err` from any
//! stage, the dispatcher, or the fallback skips everything downstream and
//! goes to the classifier and then the responder, which produce the one
//! and only response for that request.

use crate::context::MiddlewareContext;
use crate::dispatch::Dispatcher;
use crate::lifecycle::RequestPhase;
use crate::middleware::{Middleware, Next};
use crate::stages::{
    CookieParserMiddleware, CorsMiddleware, CsrfMiddleware, CsrfSettings, ErrorClassifier,
    ErrorResponder, JsonBodyMiddleware, NotFoundFallback, RequestLogMiddleware, ResourcePolicy,
    ResourcePolicyMiddleware,
};
use crate::types::{Request, Response};
use http::{HeaderName, HeaderValue};
use std::sync::Arc;
use trailhead_core::{AppError, DeploymentMode, RequestId};

/// Header carrying the request id on every response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A type-erased stage that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The request processing pipeline.
///
/// # Example
///
/// ```
/// use trailhead_core::DeploymentMode;
/// use trailhead_middleware::dispatch::NoRoutes;
/// use trailhead_middleware::stages::CsrfSettings;
/// use trailhead_middleware::Pipeline;
///
/// let mode = DeploymentMode::Production;
/// let pipeline = Pipeline::standard(mode, CsrfSettings::for_mode(mode), NoRoutes);
/// assert!(!pipeline.stage_names().contains(&"cors"));
/// ```
pub struct Pipeline {
    mode: DeploymentMode,
    normalizers: Vec<BoxedMiddleware>,
    policies: Vec<BoxedMiddleware>,
    dispatcher: Arc<dyn Dispatcher>,
    fallback: NotFoundFallback,
    classifier: ErrorClassifier,
    responder: ErrorResponder,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("mode", &self.mode)
            .field("stages", &self.stage_names())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder(mode: DeploymentMode) -> PipelineBuilder {
        PipelineBuilder::new(mode)
    }

    /// Builds the standard stage list for `mode`.
    ///
    /// CORS is installed only outside production; the resource policy and
    /// CSRF stages are always installed.
    #[must_use]
    pub fn standard<D: Dispatcher>(mode: DeploymentMode, csrf: CsrfSettings, dispatcher: D) -> Self {
        let mut builder = Self::builder(mode)
            .add_normalizer(RequestLogMiddleware::new())
            .add_normalizer(CookieParserMiddleware::new())
            .add_normalizer(JsonBodyMiddleware::new());

        if !mode.is_production() {
            builder = builder.add_policy(CorsMiddleware::permissive());
        }

        builder
            .add_policy(ResourcePolicyMiddleware::new(ResourcePolicy::CrossOrigin))
            .add_policy(CsrfMiddleware::new(csrf))
            .dispatcher(dispatcher)
            .build()
    }

    /// Returns the deployment mode the pipeline was built for.
    #[must_use]
    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    /// Processes a request with a fresh context.
    ///
    /// A valid incoming `x-request-id` header is reused.
    pub async fn handle(&self, request: Request) -> Response {
        let incoming = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok());
        let mut ctx = MiddlewareContext::with_request_id(RequestId::from_header_or_new(incoming));
        self.process(&mut ctx, request).await
    }

    /// Processes a request through every stage.
    ///
    /// Always returns exactly one response; errors are turned into the JSON
    /// error body here. A response produced by a stage before dispatch ends
    /// the lifecycle in [`RequestPhase::PolicyAnswered`].
    pub async fn process(&self, ctx: &mut MiddlewareContext, request: Request) -> Response {
        let result = self.build_chain().run(&mut *ctx, request).await;

        let mut response = match result {
            Ok(response) => {
                if !ctx.lifecycle().is_finished() {
                    ctx.enter(RequestPhase::PolicyAnswered);
                }
                response
            }
            Err(error) => self.respond_to_error(ctx, error),
        };

        ctx.apply_response_headers(response.headers_mut());
        if let Ok(value) = HeaderValue::from_str(&ctx.request_id().to_string()) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }
        response
    }

    fn respond_to_error(&self, ctx: &mut MiddlewareContext, error: AppError) -> Response {
        ctx.enter(RequestPhase::Faulted);
        let normalized = self.classifier.classify(&error);
        ctx.enter(RequestPhase::Classified);
        let response = self.responder.respond(ctx, error, normalized);
        ctx.enter(RequestPhase::Responded);
        response
    }

    fn build_chain(&self) -> Next<'_> {
        let mut next = Next::dispatch(self.dispatcher.as_ref(), &self.fallback);

        next = Next::checkpoint(RequestPhase::PolicyChecked, next);
        for middleware in self.policies.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }

        next = Next::checkpoint(RequestPhase::Normalized, next);
        for middleware in self.normalizers.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }

        next
    }

    /// Returns the names of all stages in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.normalizers
            .iter()
            .chain(self.policies.iter())
            .map(|mw| mw.name())
            .chain([
                Stage::Dispatch.name(),
                Stage::NotFound.name(),
                Stage::ErrorClassifier.name(),
                Stage::ErrorResponder.name(),
            ])
            .collect()
    }

    /// Returns the number of registered normalizer and policy stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.normalizers.len() + self.policies.len()
    }
}

/// Builder for constructing a [`Pipeline`].
pub struct PipelineBuilder {
    mode: DeploymentMode,
    normalizers: Vec<BoxedMiddleware>,
    policies: Vec<BoxedMiddleware>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new(mode: DeploymentMode) -> Self {
        Self {
            mode,
            normalizers: Vec::new(),
            policies: Vec::new(),
            dispatcher: None,
        }
    }

    /// Appends an ingress normalizer.
    #[must_use]
    pub fn add_normalizer<M: Middleware>(mut self, middleware: M) -> Self {
        self.normalizers.push(Arc::new(middleware));
        self
    }

    /// Appends an access policy filter.
    #[must_use]
    pub fn add_policy<M: Middleware>(mut self, middleware: M) -> Self {
        self.policies.push(Arc::new(middleware));
        self
    }

    /// Sets the dispatcher. Without one, every request is unclaimed.
    #[must_use]
    pub fn dispatcher<D: Dispatcher>(mut self, dispatcher: D) -> Self {
        self.dispatcher = Some(Arc::new(dispatcher));
        self
    }

    /// Sets a shared dispatcher.
    #[must_use]
    pub fn shared_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            mode: self.mode,
            normalizers: self.normalizers,
            policies: self.policies,
            dispatcher: self
                .dispatcher
                .unwrap_or_else(|| Arc::new(crate::dispatch::NoRoutes)),
            fallback: NotFoundFallback::new(),
            classifier: ErrorClassifier::new(),
            responder: ErrorResponder::new(self.mode),
        }
    }
}

/// The named stages of the standard pipeline, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Access log line.
    RequestLog = 1,
    /// `Cookie` header parsing.
    CookieParser = 2,
    /// JSON body parsing.
    JsonBody = 3,
    /// CORS (non-production only).
    Cors = 4,
    /// `Cross-Origin-Resource-Policy`.
    ResourcePolicy = 5,
    /// Anti-forgery check.
    Csrf = 6,
    /// Hand-off to the business routes.
    Dispatch = 7,
    /// NotFound for unclaimed requests.
    NotFound = 8,
    /// Error enrichment.
    ErrorClassifier = 9,
    /// Error response.
    ErrorResponder = 10,
}

/// Which part of the pipeline a stage belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageGroup {
    /// Side-effecting preprocessors.
    IngressNormalizer,
    /// Filters that may reject a request.
    AccessPolicy,
    /// Business routing.
    Dispatch,
    /// The error path.
    ErrorPath,
}

impl Stage {
    /// Returns the stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RequestLog => "request_log",
            Self::CookieParser => "cookie_parser",
            Self::JsonBody => "json_body",
            Self::Cors => "cors",
            Self::ResourcePolicy => "resource_policy",
            Self::Csrf => "csrf",
            Self::Dispatch => "dispatch",
            Self::NotFound => "not_found",
            Self::ErrorClassifier => "error_classifier",
            Self::ErrorResponder => "error_responder",
        }
    }

    /// Returns the group the stage belongs to.
    #[must_use]
    pub const fn group(self) -> StageGroup {
        match self {
            Self::RequestLog | Self::CookieParser | Self::JsonBody => StageGroup::IngressNormalizer,
            Self::Cors | Self::ResourcePolicy | Self::Csrf => StageGroup::AccessPolicy,
            Self::Dispatch | Self::NotFound => StageGroup::Dispatch,
            Self::ErrorClassifier | Self::ErrorResponder => StageGroup::ErrorPath,
        }
    }

    /// Returns all stages in order.
    #[must_use]
    pub const fn all() -> [Stage; 10] {
        [
            Self::RequestLog,
            Self::CookieParser,
            Self::JsonBody,
            Self::Cors,
            Self::ResourcePolicy,
            Self::Csrf,
            Self::Dispatch,
            Self::NotFound,
            Self::ErrorClassifier,
            Self::ErrorResponder,
        ]
    }

    /// Returns the stages installed for `mode`, in order.
    #[must_use]
    pub fn for_mode(mode: DeploymentMode) -> Vec<Stage> {
        Self::all()
            .into_iter()
            .filter(|stage| !(mode.is_production() && *stage == Self::Cors))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DispatchOutcome, FnDispatcher, NoRoutes};
    use crate::middleware::{BoxFuture, StageResult};
    use crate::types::ResponseExt;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;

    struct Recorder {
        name: &'static str,
        order: Arc<std::sync::Mutex<Vec<&'static str>>>,
    }

    impl Middleware for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut MiddlewareContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, StageResult> {
            Box::pin(async move {
                self.order.lock().unwrap().push(self.name);
                next.run(ctx, request).await
            })
        }
    }

    struct Reject;

    impl Middleware for Reject {
        fn name(&self) -> &'static str {
            "reject"
        }

        fn process<'a>(
            &'a self,
            _ctx: &'a mut MiddlewareContext,
            _request: Request,
            _next: Next<'a>,
        ) -> BoxFuture<'a, StageResult> {
            Box::pin(async move { Err(AppError::authorization("denied")) })
        }
    }

    fn request() -> Request {
        http::Request::builder()
            .uri("/test")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_stages_run_in_registration_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder(DeploymentMode::Test)
            .add_normalizer(Recorder { name: "n1", order: order.clone() })
            .add_normalizer(Recorder { name: "n2", order: order.clone() })
            .add_policy(Recorder { name: "p1", order: order.clone() })
            .dispatcher(FnDispatcher::new(|_ctx, _req| {
                DispatchOutcome::Handled(Response::empty(StatusCode::OK))
            }))
            .build();

        let mut ctx = MiddlewareContext::new();
        let response = pipeline.process(&mut ctx, request()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*order.lock().unwrap(), vec!["n1", "n2", "p1"]);
        assert_eq!(
            ctx.lifecycle().history(),
            &[
                RequestPhase::Received,
                RequestPhase::Normalized,
                RequestPhase::PolicyChecked,
                RequestPhase::Dispatched,
                RequestPhase::HandlerCompleted,
            ]
        );
    }

    #[tokio::test]
    async fn test_policy_error_skips_dispatch() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let dispatched = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = dispatched.clone();

        let pipeline = Pipeline::builder(DeploymentMode::Production)
            .add_policy(Reject)
            .add_policy(Recorder { name: "after", order: order.clone() })
            .dispatcher(FnDispatcher::new(move |_ctx, _req| {
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
                DispatchOutcome::Handled(Response::empty(StatusCode::OK))
            }))
            .build();

        let mut ctx = MiddlewareContext::new();
        let response = pipeline.process(&mut ctx, request()).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(order.lock().unwrap().is_empty());
        assert!(!dispatched.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(
            ctx.lifecycle().history(),
            &[
                RequestPhase::Received,
                RequestPhase::Normalized,
                RequestPhase::Faulted,
                RequestPhase::Classified,
                RequestPhase::Responded,
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_not_found() {
        let pipeline = Pipeline::builder(DeploymentMode::Development).build();
        let mut ctx = MiddlewareContext::new();
        let response = pipeline.process(&mut ctx, request()).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert!(ctx.lifecycle().faulted());
    }

    #[tokio::test]
    async fn test_handle_reuses_request_id_header() {
        let pipeline = Pipeline::builder(DeploymentMode::Test).dispatcher(NoRoutes).build();
        let id = RequestId::new().to_string();
        let request = http::Request::builder()
            .uri("/")
            .header(REQUEST_ID_HEADER, id.as_str())
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = pipeline.handle(request).await;
        assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), id.as_str());
    }

    #[test]
    fn test_standard_stage_names() {
        let dev = Pipeline::standard(
            DeploymentMode::Development,
            CsrfSettings::for_mode(DeploymentMode::Development),
            NoRoutes,
        );
        let expected: Vec<_> = Stage::for_mode(DeploymentMode::Development)
            .into_iter()
            .map(Stage::name)
            .collect();
        assert_eq!(dev.stage_names(), expected);

        let prod = Pipeline::standard(
            DeploymentMode::Production,
            CsrfSettings::for_mode(DeploymentMode::Production),
            NoRoutes,
        );
        assert!(!prod.stage_names().contains(&"cors"));
        assert_eq!(prod.stage_count(), 5);
    }

    #[test]
    fn test_stage_groups() {
        assert_eq!(Stage::JsonBody.group(), StageGroup::IngressNormalizer);
        assert_eq!(Stage::Csrf.group(), StageGroup::AccessPolicy);
        assert_eq!(Stage::NotFound.group(), StageGroup::Dispatch);
        assert_eq!(Stage::ErrorResponder.group(), StageGroup::ErrorPath);
        assert!(Stage::Cors < Stage::Csrf);
    }
}
