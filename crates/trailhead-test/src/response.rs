//! Collected responses and assertion helpers.

use std::fmt;

use bytes::Bytes;
use http::{header, HeaderMap, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use trailhead_core::ErrorBody;

use crate::error::TestError;

/// A response with its body fully read.
#[derive(Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Collects an HTTP response.
    pub async fn from_http<B>(response: http::Response<B>) -> Result<Self, TestError>
    where
        B: BodyExt,
        B::Error: fmt::Display,
    {
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| TestError::BodyRead(e.to_string()))?
            .to_bytes();

        Ok(Self::new(parts.status, parts.headers, body))
    }

    /// Builds a response from raw parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns the status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status as a number.
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns all headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the first value of a header, if it is valid text.
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|value| value.to_str().ok())
    }

    /// Returns every value of a header, in order.
    pub fn header_all(&self, name: impl AsRef<str>) -> Vec<&str> {
        self.headers
            .get_all(name.as_ref())
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect()
    }

    /// Returns the raw `Set-Cookie` line for a cookie name.
    pub fn set_cookie(&self, name: &str) -> Option<&str> {
        self.header_all(header::SET_COOKIE)
            .into_iter()
            .find(|line| cookie_name(line) == Some(name))
    }

    /// Returns the `Content-Type` header.
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE)
    }

    /// Returns the raw body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as UTF-8 text.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec()).map_err(|e| TestError::BodyRead(e.to_string()))
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Parses the body as an untyped JSON value.
    pub fn json_value(&self) -> Result<serde_json::Value, TestError> {
        self.json()
    }

    /// Parses the body as the uniform error body.
    pub fn error_body(&self) -> Result<ErrorBody, TestError> {
        self.json()
    }

    /// Asserts the status.
    ///
    /// # Panics
    ///
    /// Panics on mismatch, printing the body.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "expected status {expected}, got {} with body {}",
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts that a header is present with an exact value.
    ///
    /// # Panics
    ///
    /// Panics if the header is missing or differs.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let actual = self
            .header_str(name)
            .unwrap_or_else(|| panic!("header '{name}' not found"));
        assert_eq!(actual, expected.as_ref(), "header '{name}'");
        self
    }

    /// Asserts a JSON value at a JSON pointer such as `/errors/0`.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON or the pointer does not match.
    pub fn assert_json_field(&self, pointer: &str, expected: &serde_json::Value) -> &Self {
        let json = self.json_value().expect("body should be valid JSON");
        let actual = json
            .pointer(pointer)
            .unwrap_or_else(|| panic!("JSON pointer '{pointer}' not found in {json}"));
        assert_eq!(actual, expected, "JSON field '{pointer}'");
        self
    }

    /// Asserts an error response: its status and its `title`.
    ///
    /// # Panics
    ///
    /// Panics if the body is not an error body or either part differs.
    pub fn assert_error(&self, status: StatusCode, title: &str) -> &Self {
        self.assert_status(status);
        let body = self.error_body().expect("body should be an error body");
        assert_eq!(body.title, title, "error title");
        self
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &String::from_utf8_lossy(&self.body))
            .finish()
    }
}

pub(crate) fn cookie_name(set_cookie: &str) -> Option<&str> {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(name, _)| name.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;

    fn response(status: StatusCode, body: &str) -> TestResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("_csrf=s3cret; Path=/; HttpOnly"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("XSRF-TOKEN=tok; Path=/"));
        TestResponse::new(status, headers, Bytes::from(body.to_string()))
    }

    #[test]
    fn test_set_cookie_lookup() {
        let res = response(StatusCode::OK, "{}");
        assert_eq!(res.header_all(header::SET_COOKIE).len(), 2);
        assert_eq!(res.set_cookie("XSRF-TOKEN"), Some("XSRF-TOKEN=tok; Path=/"));
        assert!(res.set_cookie("_csrf").unwrap().contains("HttpOnly"));
        assert!(res.set_cookie("session").is_none());
    }

    #[test]
    fn test_error_body() {
        let res = response(
            StatusCode::NOT_FOUND,
            r#"{"title":"Resource Not Found","message":"m","errors":["e"],"stack":null}"#,
        );
        res.assert_error(StatusCode::NOT_FOUND, "Resource Not Found")
            .assert_json_field("/errors/0", &json!("e"))
            .assert_json_field("/stack", &json!(null));
    }

    #[test]
    fn test_text_and_json() {
        let res = response(StatusCode::OK, r#"{"id":1}"#);
        assert_eq!(res.text().unwrap(), r#"{"id":1}"#);
        assert_eq!(res.json_value().unwrap()["id"], 1);
        assert_eq!(res.content_type(), Some("application/json"));
    }

    #[test]
    #[should_panic(expected = "expected status 200 OK")]
    fn test_assert_status_panics() {
        response(StatusCode::FORBIDDEN, "{}").assert_status(StatusCode::OK);
    }

    #[test]
    fn test_cookie_name() {
        assert_eq!(cookie_name("a=b; Path=/"), Some("a"));
        assert_eq!(cookie_name("novalue"), None);
    }
}
