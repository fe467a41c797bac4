//! Resource-sharing policy headers.
//!
//! Always installed. Queues `Cross-Origin-Resource-Policy` on every
//! response, together with a small baseline of hardening headers.

use crate::{
    context::MiddlewareContext,
    middleware::{BoxFuture, Middleware, Next, StageResult},
    types::Request,
};
use http::{HeaderName, HeaderValue};

/// Header name for the resource policy.
pub const RESOURCE_POLICY_HEADER: &str = "cross-origin-resource-policy";

/// Value of the `Cross-Origin-Resource-Policy` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourcePolicy {
    /// Same-origin only.
    SameOrigin,
    /// Same-site only.
    SameSite,
    /// Any origin may load the resource.
    #[default]
    CrossOrigin,
}

impl ResourcePolicy {
    /// Returns the header value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SameOrigin => "same-origin",
            Self::SameSite => "same-site",
            Self::CrossOrigin => "cross-origin",
        }
    }
}

const HARDENING_HEADERS: [(&str, &str); 5] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-dns-prefetch-control", "off"),
    ("referrer-policy", "no-referrer"),
    ("cross-origin-opener-policy", "same-origin"),
];

/// Resource policy middleware.
#[derive(Debug, Clone, Copy)]
pub struct ResourcePolicyMiddleware {
    policy: ResourcePolicy,
    hardening: bool,
}

impl Default for ResourcePolicyMiddleware {
    fn default() -> Self {
        Self::new(ResourcePolicy::CrossOrigin)
    }
}

impl ResourcePolicyMiddleware {
    /// Creates the stage with the given policy and the hardening headers.
    #[must_use]
    pub const fn new(policy: ResourcePolicy) -> Self {
        Self {
            policy,
            hardening: true,
        }
    }

    /// Emits only the resource policy header.
    #[must_use]
    pub const fn without_hardening(mut self) -> Self {
        self.hardening = false;
        self
    }

    /// Returns the configured policy.
    #[must_use]
    pub const fn policy(&self) -> ResourcePolicy {
        self.policy
    }
}

impl Middleware for ResourcePolicyMiddleware {
    fn name(&self) -> &'static str {
        "resource_policy"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            ctx.add_response_header(
                HeaderName::from_static(RESOURCE_POLICY_HEADER),
                HeaderValue::from_static(self.policy.as_str()),
            );
            if self.hardening {
                for (name, value) in HARDENING_HEADERS {
                    ctx.add_response_header(
                        HeaderName::from_static(name),
                        HeaderValue::from_static(value),
                    );
                }
            }
            next.run(ctx, request).await
        })
    }
}
