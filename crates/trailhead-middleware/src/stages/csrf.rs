//! Anti-forgery (CSRF) protection.
//!
//! A per-client secret lives in an `HttpOnly` cookie. Tokens are derived
//! from the secret as `salt-digest`, where `digest` is the URL-safe base64
//! SHA-256 of `salt-secret`. Any request whose method is not in the ignore
//! list (`GET`, `HEAD`, `OPTIONS`) must present a token that verifies
//! against the secret, or it fails with an authorization error before it
//! reaches the dispatcher.
//!
//! The token is looked up, in order, in the `_csrf` field of a JSON body,
//! the `_csrf` query parameter, then the `csrf-token`, `xsrf-token`,
//! `x-csrf-token` and `x-xsrf-token` headers.

use crate::{
    context::MiddlewareContext,
    cookie::{Cookies, SameSite, SetCookie},
    middleware::{BoxFuture, Middleware, Next, StageResult},
    stages::json_body::JsonBody,
    types::Request,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use http::Method;
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use trailhead_core::{AppError, DeploymentMode};

/// Message carried by every CSRF rejection.
pub const INVALID_TOKEN_MESSAGE: &str = "invalid csrf token";

/// Body and query field that may carry the token.
pub const TOKEN_FIELD: &str = "_csrf";

const SECRET_BYTES: usize = 18;
const SALT_CHARS: usize = 8;

/// Mints and verifies tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsrfTokens;

impl CsrfTokens {
    /// Generates a new random secret.
    #[must_use]
    pub fn create_secret(&self) -> String {
        let mut bytes = [0u8; SECRET_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Derives a fresh token from `secret`.
    #[must_use]
    pub fn create_token(&self, secret: &str) -> String {
        let salt: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SALT_CHARS)
            .map(char::from)
            .collect();
        Self::tokenize(&salt, secret)
    }

    /// Checks `token` against `secret` in constant time.
    #[must_use]
    pub fn verify(&self, secret: &str, token: &str) -> bool {
        let Some((salt, _)) = token.split_once('-') else {
            return false;
        };
        let expected = Self::tokenize(salt, secret);
        expected.as_bytes().ct_eq(token.as_bytes()).into()
    }

    fn tokenize(salt: &str, secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(b"-");
        hasher.update(secret.as_bytes());
        format!("{salt}-{}", URL_SAFE_NO_PAD.encode(hasher.finalize()))
    }
}

/// Per-request access to the client's secret, so dispatchers can mint
/// tokens (for example, to restore the token cookie on page load).
#[derive(Debug, Clone)]
pub struct CsrfHandle {
    secret: String,
}

impl CsrfHandle {
    /// Mints a token bound to this client's secret.
    #[must_use]
    pub fn token(&self) -> String {
        CsrfTokens.create_token(&self.secret)
    }

    /// Returns `true` if `token` is valid for this client.
    #[must_use]
    pub fn verify(&self, token: &str) -> bool {
        CsrfTokens.verify(&self.secret, token)
    }
}

/// Settings for the CSRF stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfSettings {
    /// Name of the secret cookie.
    pub cookie_name: String,
    /// `Path` of the secret cookie.
    pub cookie_path: String,
    /// Whether the secret cookie is `Secure`.
    pub secure: bool,
    /// `SameSite` attribute of the secret cookie.
    pub same_site: Option<SameSite>,
    /// Headers searched for the token, in order.
    pub header_names: Vec<String>,
    /// Methods that do not need a token.
    pub ignore_methods: Vec<Method>,
}

impl CsrfSettings {
    /// Default settings for a deployment mode: the cookie is `Secure` and
    /// `SameSite=Lax` only in production.
    #[must_use]
    pub fn for_mode(mode: DeploymentMode) -> Self {
        let production = mode.is_production();
        Self {
            cookie_name: TOKEN_FIELD.to_string(),
            cookie_path: "/".to_string(),
            secure: production,
            same_site: production.then_some(SameSite::Lax),
            header_names: ["csrf-token", "xsrf-token", "x-csrf-token", "x-xsrf-token"]
                .into_iter()
                .map(String::from)
                .collect(),
            ignore_methods: vec![Method::GET, Method::HEAD, Method::OPTIONS],
        }
    }

    /// Overrides the secret cookie name.
    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Overrides the secret cookie path.
    #[must_use]
    pub fn with_cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = path.into();
        self
    }

    /// Overrides the token header names.
    #[must_use]
    pub fn with_header_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header_names = names.into_iter().map(|n| n.into().to_ascii_lowercase()).collect();
        self
    }

    fn secret_cookie(&self, secret: &str) -> SetCookie {
        SetCookie::new(&self.cookie_name, secret)
            .path(&self.cookie_path)
            .http_only(true)
            .secure(self.secure)
            .maybe_same_site(self.same_site)
    }
}

/// CSRF middleware.
#[derive(Debug, Clone)]
pub struct CsrfMiddleware {
    settings: CsrfSettings,
}

impl CsrfMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new(settings: CsrfSettings) -> Self {
        Self { settings }
    }

    /// Creates the stage with the defaults for `mode`.
    #[must_use]
    pub fn for_mode(mode: DeploymentMode) -> Self {
        Self::new(CsrfSettings::for_mode(mode))
    }

    /// Returns the settings.
    #[must_use]
    pub fn settings(&self) -> &CsrfSettings {
        &self.settings
    }

    fn find_token(&self, ctx: &MiddlewareContext, request: &Request) -> Option<String> {
        let from_body = ctx
            .get_extension::<JsonBody>()
            .and_then(|body| body.field(TOKEN_FIELD))
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string);

        let from_query = || {
            request.uri().query().and_then(|query| {
                query.split('&').find_map(|pair| {
                    let (key, value) = pair.split_once('=')?;
                    (key == TOKEN_FIELD)
                        .then(|| urlencoding::decode(value).ok().map(|v| v.into_owned()))
                        .flatten()
                })
            })
        };

        let from_headers = || {
            self.settings.header_names.iter().find_map(|name| {
                request
                    .headers()
                    .get(name.as_str())
                    .and_then(|v| v.to_str().ok())
                    .map(ToString::to_string)
            })
        };

        from_body
            .filter(|t| !t.is_empty())
            .or_else(|| from_query().filter(|t| !t.is_empty()))
            .or_else(|| from_headers().filter(|t| !t.is_empty()))
    }
}

impl Middleware for CsrfMiddleware {
    fn name(&self) -> &'static str {
        "csrf"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            let existing = match ctx.get_extension::<Cookies>() {
                Some(cookies) => cookies.get(&self.settings.cookie_name).map(ToString::to_string),
                None => Cookies::from_headers(request.headers())
                    .get(&self.settings.cookie_name)
                    .map(ToString::to_string),
            }
            .filter(|s| !s.is_empty());

            let secret = match existing {
                Some(secret) => secret,
                None => {
                    let secret = CsrfTokens.create_secret();
                    ctx.set_cookie(&self.settings.secret_cookie(&secret));
                    tracing::debug!(request_id = %ctx.request_id(), "issued csrf secret");
                    secret
                }
            };

            if !self.settings.ignore_methods.contains(request.method()) {
                let valid = self
                    .find_token(ctx, &request)
                    .is_some_and(|token| CsrfTokens.verify(&secret, &token));
                if !valid {
                    tracing::warn!(
                        request_id = %ctx.request_id(),
                        method = %request.method(),
                        path = %request.uri().path(),
                        "rejected request with missing or invalid csrf token"
                    );
                    return Err(AppError::authorization(INVALID_TOKEN_MESSAGE));
                }
            }

            ctx.set_extension(CsrfHandle { secret });
            next.run(ctx, request).await
        })
    }
}
