//! A method + path route table that plugs into the pipeline as its
//! [`Dispatcher`].
//!
//! Paths use `{name}` segments for parameters. A path that matches with
//! the wrong method is left unclaimed, so it ends in the not-found
//! fallback like any other unknown route.
//!
//! ```
//! use http::Method;
//! use trailhead_middleware::{BoxFuture, MiddlewareContext, Request, Response, ResponseExt, StageResult};
//! use trailhead_server::{PathParams, RouteTable};
//!
//! fn ping<'a>(_ctx: &'a mut MiddlewareContext, _req: Request, _params: PathParams) -> BoxFuture<'a, StageResult> {
//!     Box::pin(async { Ok(Response::json(http::StatusCode::OK, &"pong")) })
//! }
//!
//! let routes = RouteTable::new().route(Method::GET, "/api/ping", ping);
//! assert_eq!(routes.len(), 1);
//! ```

use std::sync::Arc;

use http::Method;
use trailhead_middleware::{
    BoxFuture, DispatchOutcome, Dispatcher, MiddlewareContext, Request, StageResult,
};

/// Parameters captured from `{name}` segments, in path order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    /// Looks a parameter up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Number of captured parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterates `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A business endpoint.
pub trait RouteHandler: Send + Sync + 'static {
    /// Handles a request whose method and path matched.
    fn call<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        params: PathParams,
    ) -> BoxFuture<'a, StageResult>;
}

impl<F> RouteHandler for F
where
    F: for<'a> Fn(&'a mut MiddlewareContext, Request, PathParams) -> BoxFuture<'a, StageResult>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        params: PathParams,
    ) -> BoxFuture<'a, StageResult> {
        self(ctx, request, params)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

struct Route {
    method: Method,
    pattern: String,
    segments: Vec<Segment>,
    handler: Arc<dyn RouteHandler>,
}

impl Route {
    fn parse(pattern: &str) -> Vec<Segment> {
        pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect()
    }

    fn match_path(&self, path: &str) -> Option<PathParams> {
        let actual: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if actual.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::default();
        for (segment, value) in self.segments.iter().zip(actual) {
            match segment {
                Segment::Literal(expected) if expected == value => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    let value = urlencoding::decode(value)
                        .map_or_else(|_| value.to_string(), |decoded| decoded.into_owned());
                    params.params.push((name.clone(), value));
                }
            }
        }
        Some(params)
    }
}

/// Ordered routes; the first match wins.
#[derive(Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|r| format!("{} {}", r.method, r.pattern)))
            .finish()
    }
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route.
    #[must_use]
    pub fn route<H: RouteHandler>(mut self, method: Method, pattern: &str, handler: H) -> Self {
        self.routes.push(Route {
            method,
            pattern: pattern.to_string(),
            segments: Route::parse(pattern),
            handler: Arc::new(handler),
        });
        self
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn find(&self, method: &Method, path: &str) -> Option<(&Route, PathParams)> {
        self.routes
            .iter()
            .filter(|route| route.method == method)
            .find_map(|route| route.match_path(path).map(|params| (route, params)))
    }
}

impl Dispatcher for RouteTable {
    fn dispatch<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
    ) -> BoxFuture<'a, DispatchOutcome> {
        Box::pin(async move {
            let Some((route, params)) = self.find(request.method(), request.uri().path()) else {
                return DispatchOutcome::Unclaimed(request);
            };

            tracing::debug!(route = %route.pattern, "route matched");
            route.handler.call(ctx, request, params).await.into()
        })
    }
}
