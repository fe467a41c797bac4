//! Middleware context types.
//!
//! The [`MiddlewareContext`] carries request-scoped state through the
//! pipeline: the request id, the lifecycle state machine, typed extensions
//! written by earlier stages, and response headers that stages want on the
//! final response whichever path produced it.

use crate::cookie::SetCookie;
use crate::lifecycle::{LifecycleError, RequestLifecycle, RequestPhase};
use http::{header, HeaderName, HeaderValue};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::Instant;
use trailhead_core::RequestId;

/// Context that flows through the middleware pipeline.
///
/// Nothing in here is shared between requests; a fresh context is created
/// for every request.
///
/// # Example
///
/// ```
/// use trailhead_middleware::context::MiddlewareContext;
///
/// #[derive(Debug, PartialEq)]
/// struct SessionUser(u64);
///
/// let mut ctx = MiddlewareContext::new();
/// ctx.set_extension(SessionUser(7));
/// assert_eq!(ctx.get_extension::<SessionUser>(), Some(&SessionUser(7)));
/// ```
#[derive(Debug)]
pub struct MiddlewareContext {
    request_id: RequestId,
    started_at: Instant,
    lifecycle: RequestLifecycle,
    /// Headers applied to whichever response ends the request.
    response_headers: Vec<(HeaderName, HeaderValue)>,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl MiddlewareContext {
    /// Creates a new middleware context with a fresh request ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context with a specific request ID.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            started_at: Instant::now(),
            lifecycle: RequestLifecycle::new(),
            response_headers: Vec::new(),
            extensions: HashMap::new(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns when the request started processing.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Returns the request lifecycle.
    #[must_use]
    pub fn lifecycle(&self) -> &RequestLifecycle {
        &self.lifecycle
    }

    /// Returns the current request phase.
    #[must_use]
    pub fn phase(&self) -> RequestPhase {
        self.lifecycle.phase()
    }

    /// Advances the request lifecycle.
    pub fn advance(&mut self, phase: RequestPhase) -> Result<(), LifecycleError> {
        self.lifecycle.advance(phase)
    }

    /// Advances the request lifecycle, logging an illegal transition
    /// instead of failing the request.
    pub(crate) fn enter(&mut self, phase: RequestPhase) {
        if let Err(e) = self.lifecycle.advance(phase) {
            tracing::warn!(request_id = %self.request_id, error = %e, "request lifecycle violation");
        }
    }

    /// Queues a header for the final response.
    ///
    /// Handlers win: a queued header is only applied if the response does
    /// not already carry it.
    pub fn add_response_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response_headers.push((name, value));
    }

    /// Queues a `Set-Cookie` header for the final response.
    ///
    /// Cookies are always appended, never merged.
    pub fn set_cookie(&mut self, cookie: &SetCookie) {
        match HeaderValue::from_str(&cookie.to_header_value()) {
            Ok(value) => self.response_headers.push((header::SET_COOKIE, value)),
            Err(e) => tracing::warn!(cookie = cookie.name(), error = %e, "dropping invalid cookie"),
        }
    }

    /// Returns the queued response headers.
    #[must_use]
    pub fn response_headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.response_headers
    }

    /// Writes the queued headers into `headers`.
    pub fn apply_response_headers(&mut self, headers: &mut http::HeaderMap) {
        for (name, value) in self.response_headers.drain(..) {
            if name == header::SET_COOKIE {
                headers.append(name, value);
            } else if !headers.contains_key(&name) {
                headers.insert(name, value);
            }
        }
    }

    /// Stores a typed extension value.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Checks if an extension of the given type exists.
    #[must_use]
    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<T>())
    }
}

impl Default for MiddlewareContext {
    fn default() -> Self {
        Self::new()
    }
}
