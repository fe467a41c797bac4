//! In-memory client that drives a [`Server`] without binding a socket.

use std::collections::BTreeMap;
use std::sync::Arc;

use http::{header, Method};
use parking_lot::Mutex;
use trailhead_middleware::stages::CsrfTokens;
use trailhead_middleware::Pipeline;
use trailhead_server::{Server, ServerSettings};

use crate::error::TestError;
use crate::request::TestRequestBuilder;
use crate::response::{cookie_name, TestResponse};

const DEFAULT_CSRF_COOKIE: &str = "_csrf";

/// Sends requests through [`Server::handle`], so built-in endpoints, the
/// body limit and the whole pipeline behave as they would over a socket.
///
/// The client keeps a cookie jar: every `Set-Cookie` on a response is
/// stored, and stored cookies are sent on later requests that do not set
/// their own `Cookie` header. A cookie set with `Max-Age=0` is dropped.
///
/// ```
/// # tokio_test::block_on(async {
/// use trailhead_core::DeploymentMode;
/// use trailhead_middleware::{stages::CsrfSettings, NoRoutes, Pipeline};
/// use trailhead_test::TestClient;
///
/// let mode = DeploymentMode::Production;
/// let pipeline = Pipeline::standard(mode, CsrfSettings::for_mode(mode), NoRoutes);
/// let client = TestClient::from_pipeline(pipeline);
///
/// let response = client.get("/nowhere").send().await;
/// assert_eq!(response.status_code(), 404);
/// assert!(client.cookie("_csrf").is_some());
/// # });
/// ```
#[must_use]
pub struct TestClient {
    server: Arc<Server>,
    jar: Mutex<BTreeMap<String, String>>,
    default_headers: Vec<(String, String)>,
    csrf_cookie: String,
}

impl TestClient {
    /// Wraps a configured server.
    pub fn new(server: Server) -> Self {
        Self {
            server: Arc::new(server),
            jar: Mutex::new(BTreeMap::new()),
            default_headers: Vec::new(),
            csrf_cookie: DEFAULT_CSRF_COOKIE.to_string(),
        }
    }

    /// Wraps a pipeline in a server with default settings.
    pub fn from_pipeline(pipeline: Pipeline) -> Self {
        Self::new(Server::new(pipeline, ServerSettings::default()))
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Sets the name of the cookie holding the anti-forgery secret.
    pub fn with_csrf_cookie(mut self, name: impl Into<String>) -> Self {
        self.csrf_cookie = name.into();
        self
    }

    /// Returns the wrapped server.
    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Returns a stored cookie value, percent-decoded.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.jar.lock().get(name).map(|raw| {
            urlencoding::decode(raw).map_or_else(|_| raw.clone(), std::borrow::Cow::into_owned)
        })
    }

    /// Stores a cookie as if a response had set it.
    pub fn set_cookie(&self, name: impl Into<String>, value: impl AsRef<str>) {
        self.jar
            .lock()
            .insert(name.into(), urlencoding::encode(value.as_ref()).into_owned());
    }

    /// Empties the cookie jar.
    pub fn clear_cookies(&self) {
        self.jar.lock().clear();
    }

    /// Mints a token from the stored anti-forgery secret.
    ///
    /// Returns `None` until a response has issued the secret cookie.
    pub fn csrf_token(&self) -> Option<String> {
        self.cookie(&self.csrf_cookie)
            .map(|secret| CsrfTokens.create_token(&secret))
    }

    /// Starts a GET request.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// Starts a POST request.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// Starts a PUT request.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PUT, uri)
    }

    /// Starts a PATCH request.
    pub fn patch(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PATCH, uri)
    }

    /// Starts a DELETE request.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Starts an OPTIONS request.
    pub fn options(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::OPTIONS, uri)
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        let mut builder = TestRequestBuilder::new(method, uri);
        for (name, value) in &self.default_headers {
            builder = builder.header(name, value);
        }
        TestClientRequest {
            client: self,
            builder,
        }
    }

    async fn send_internal(&self, builder: TestRequestBuilder) -> Result<TestResponse, TestError> {
        let builder = match self.cookie_header() {
            Some(cookies) if !builder.has_header(header::COOKIE.as_str()) => {
                builder.header(header::COOKIE.as_str(), cookies)
            }
            _ => builder,
        };

        let request = builder.build()?;
        let response = TestResponse::from_http(self.server.handle(request).await).await?;
        self.absorb_cookies(&response);
        Ok(response)
    }

    fn cookie_header(&self) -> Option<String> {
        let jar = self.jar.lock();
        if jar.is_empty() {
            return None;
        }
        Some(
            jar.iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    fn absorb_cookies(&self, response: &TestResponse) {
        let mut jar = self.jar.lock();
        for line in response.header_all(header::SET_COOKIE) {
            let Some(name) = cookie_name(line) else {
                continue;
            };
            let expired = line
                .split(';')
                .skip(1)
                .any(|attr| attr.trim().eq_ignore_ascii_case("max-age=0"));
            if expired {
                jar.remove(name);
                continue;
            }
            let value = line
                .split(';')
                .next()
                .and_then(|pair| pair.split_once('='))
                .map_or("", |(_, value)| value.trim());
            jar.insert(name.to_string(), value.to_string());
        }
    }
}

impl std::fmt::Debug for TestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClient")
            .field("server", &self.server)
            .field("cookies", &self.jar.lock().len())
            .finish_non_exhaustive()
    }
}

/// A request builder bound to a [`TestClient`].
#[must_use]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl TestClientRequest<'_> {
    /// Appends a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets the `Content-Type` header.
    pub fn content_type(mut self, content_type: impl AsRef<str>) -> Self {
        self.builder = self.builder.content_type(content_type);
        self
    }

    /// Sends an anti-forgery token header.
    pub fn csrf_token(mut self, token: impl AsRef<str>) -> Self {
        self.builder = self.builder.csrf_token(token);
        self
    }

    /// Mints a token from the client's stored secret and sends it.
    ///
    /// Without a stored secret no header is added.
    pub fn with_csrf(self) -> Self {
        match self.client.csrf_token() {
            Some(token) => self.csrf_token(token),
            None => self,
        }
    }

    /// Appends a query parameter.
    pub fn query(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.query(name, value);
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<bytes::Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets a JSON body.
    pub fn json<T: serde::Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sends the request.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(e) => panic!("test request failed: {e}"),
        }
    }

    /// Sends the request, reporting build and read failures.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        self.client.send_internal(self.builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use serde_json::json;
    use trailhead_core::DeploymentMode;
    use trailhead_middleware::stages::{CsrfSettings, JsonBody};
    use trailhead_middleware::{DispatchOutcome, FnDispatcher, Response, ResponseExt};

    fn echo_client(mode: DeploymentMode) -> TestClient {
        let dispatcher = FnDispatcher::new(|ctx, request| {
            if request.uri().path() != "/api/echo" {
                return DispatchOutcome::Unclaimed(request);
            }
            let body = ctx
                .get_extension::<JsonBody>()
                .map_or(serde_json::Value::Null, |body| body.0.clone());
            DispatchOutcome::Handled(Response::json(StatusCode::OK, &body))
        });
        TestClient::from_pipeline(Pipeline::standard(mode, CsrfSettings::for_mode(mode), dispatcher))
    }

    #[tokio::test]
    async fn test_health_is_answered() {
        let client = echo_client(DeploymentMode::Development);
        let response = client.get("/health").send().await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.json_value().unwrap()["status"], "ok");
    }

    #[tokio::test]
    async fn test_jar_keeps_csrf_secret() {
        let client = echo_client(DeploymentMode::Production);
        assert!(client.csrf_token().is_none());

        let first = client.get("/api/echo").send().await;
        assert!(first.set_cookie("_csrf").is_some());
        let secret = client.cookie("_csrf").unwrap();

        let second = client.get("/api/echo").send().await;
        assert!(second.set_cookie("_csrf").is_none());
        assert_eq!(client.cookie("_csrf").unwrap(), secret);
    }

    #[tokio::test]
    async fn test_post_with_minted_token() {
        let client = echo_client(DeploymentMode::Production);
        client.get("/api/echo").send().await;

        let response = client
            .post("/api/echo")
            .with_csrf()
            .json(&json!({ "campsite": 3 }))
            .send()
            .await;
        response
            .assert_status(StatusCode::OK)
            .assert_json_field("/campsite", &json!(3));
    }

    #[tokio::test]
    async fn test_post_without_token_is_forbidden() {
        let client = echo_client(DeploymentMode::Production);
        client.get("/api/echo").send().await;

        let response = client.post("/api/echo").json(&json!({})).send().await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_explicit_cookie_header_wins() {
        let client = echo_client(DeploymentMode::Production);
        client.set_cookie("_csrf", "stale");

        let response = client
            .get("/api/echo")
            .header("cookie", "theme=dark")
            .send()
            .await;
        // No secret was sent, so a fresh one is issued and replaces the stale one.
        assert!(response.set_cookie("_csrf").is_some());
        assert_ne!(client.cookie("_csrf").as_deref(), Some("stale"));
    }

    #[tokio::test]
    async fn test_clear_cookies() {
        let client = echo_client(DeploymentMode::Development);
        client.get("/api/echo").send().await;
        client.clear_cookies();
        assert!(client.cookie("_csrf").is_none());
    }

    #[tokio::test]
    async fn test_try_send_reports_bad_header() {
        let client = echo_client(DeploymentMode::Development);
        let result = client.get("/").header("bad header", "x").try_send().await;
        assert!(matches!(result, Err(TestError::InvalidHeader(_))));
    }
}
