//! Request construction for the test client.

use bytes::Bytes;
use http::{header, HeaderName, HeaderValue, Method};
use http_body_util::Full;
use serde::Serialize;
use trailhead_middleware::Request;

use crate::error::TestError;

/// Header the test builder uses for anti-forgery tokens.
pub const CSRF_TOKEN_HEADER: &str = "csrf-token";

/// Entry points for building requests without a client.
///
/// ```
/// use trailhead_test::TestRequest;
///
/// let request = TestRequest::post("/api/users")
///     .json(&serde_json::json!({ "username": "camper" }))
///     .build()
///     .unwrap();
/// assert_eq!(request.method(), http::Method::POST);
/// assert_eq!(request.headers()["content-type"], "application/json");
/// ```
pub struct TestRequest;

impl TestRequest {
    /// Starts a GET request.
    pub fn get(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, uri)
    }

    /// Starts a POST request.
    pub fn post(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, uri)
    }

    /// Starts a PUT request.
    pub fn put(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PUT, uri)
    }

    /// Starts a PATCH request.
    pub fn patch(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PATCH, uri)
    }

    /// Starts a DELETE request.
    pub fn delete(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::DELETE, uri)
    }

    /// Starts an OPTIONS request.
    pub fn options(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::OPTIONS, uri)
    }

    /// Starts a HEAD request.
    pub fn head(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::HEAD, uri)
    }
}

/// Fluent builder for a pipeline [`Request`].
///
/// Errors (bad header names, unserializable JSON) are held until
/// [`build`](Self::build) so calls can be chained freely.
#[derive(Debug)]
#[must_use]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    query: Vec<(String, String)>,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Starts a request with any method.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Bytes::new(),
            error: None,
        }
    }

    /// Returns the method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Appends a header. Repeated names are all sent.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = HeaderName::from_bytes(name.as_ref().as_bytes());
        let value = HeaderValue::from_str(value.as_ref());
        match (name, value) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            (Err(e), _) => self.fail(TestError::InvalidHeader(e.to_string())),
            (_, Err(e)) => self.fail(TestError::InvalidHeader(e.to_string())),
        }
        self
    }

    /// Whether a header with this name has been set.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers
            .iter()
            .any(|(key, _)| key.as_str().eq_ignore_ascii_case(name))
    }

    /// Sets the `Content-Type` header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Sends an anti-forgery token in the `csrf-token` header.
    pub fn csrf_token(self, token: impl AsRef<str>) -> Self {
        self.header(CSRF_TOKEN_HEADER, token)
    }

    /// Appends a percent-encoded query parameter.
    pub fn query(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.query
            .push((name.as_ref().to_string(), value.as_ref().to_string()));
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serializes `value` as the body and sets `Content-Type: application/json`.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.body = Bytes::from(bytes);
                self.content_type("application/json")
            }
            Err(e) => {
                self.fail(TestError::Json(e));
                self
            }
        }
    }

    /// Assembles the request.
    pub fn build(self) -> Result<Request, TestError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let uri = self.full_uri();
        let mut request = http::Request::builder()
            .method(self.method)
            .uri(uri.as_str())
            .body(Full::new(self.body))
            .map_err(|e| TestError::RequestBuild(e.to_string()))?;

        let headers = request.headers_mut();
        for (name, value) in self.headers {
            headers.append(name, value);
        }

        Ok(request)
    }

    fn full_uri(&self) -> String {
        if self.query.is_empty() {
            return self.uri.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(name, value)| {
                format!("{}={}", urlencoding::encode(name), urlencoding::encode(value))
            })
            .collect::<Vec<_>>()
            .join("&");
        let separator = if self.uri.contains('?') { '&' } else { '?' };
        format!("{}{separator}{query}", self.uri)
    }

    fn fail(&mut self, error: TestError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_has_empty_body() {
        let request = TestRequest::get("/health").build().unwrap();
        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.uri().path(), "/health");
    }

    #[test]
    fn test_json_sets_content_type() {
        let request = TestRequest::post("/api/users")
            .json(&json!({ "email": "camper@trail.dev" }))
            .build()
            .unwrap();
        assert_eq!(request.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_query_is_encoded() {
        let request = TestRequest::post("/api/users")
            .query("_csrf", "a b/c")
            .build()
            .unwrap();
        assert_eq!(request.uri().query(), Some("_csrf=a%20b%2Fc"));
    }

    #[test]
    fn test_query_appends_to_existing() {
        let request = TestRequest::get("/search?q=lake")
            .query("page", "2")
            .build()
            .unwrap();
        assert_eq!(request.uri().query(), Some("q=lake&page=2"));
    }

    #[test]
    fn test_csrf_token_header() {
        let builder = TestRequest::delete("/api/bookings/1").csrf_token("tok");
        assert!(builder.has_header("CSRF-Token"));
        let request = builder.build().unwrap();
        assert_eq!(request.headers()[CSRF_TOKEN_HEADER], "tok");
    }

    #[test]
    fn test_invalid_header_is_reported_on_build() {
        let result = TestRequest::get("/").header("bad header", "x").build();
        assert!(matches!(result, Err(TestError::InvalidHeader(_))));
    }

    #[test]
    fn test_repeated_headers_are_kept() {
        let request = TestRequest::get("/")
            .header("cookie", "a=1")
            .header("cookie", "b=2")
            .build()
            .unwrap();
        assert_eq!(request.headers().get_all("cookie").iter().count(), 2);
    }
}
