//! Common types used throughout the middleware pipeline.

use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use http_body_util::Full;
use serde::Serialize;

/// The HTTP request type used in the middleware pipeline.
///
/// This is a standard `http::Request` with a `Full<Bytes>` body.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type used in the middleware pipeline.
///
/// This is a standard `http::Response` with a `Full<Bytes>` body.
pub type Response = http::Response<Full<Bytes>>;

/// Content type sent with every JSON body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Body sent when a response value cannot be serialized.
///
/// Same shape as every other error body.
pub const UNSERIALIZABLE_BODY: &str = r#"{"title":"Server Error","message":"response body could not be serialized","errors":null,"stack":null}"#;

/// Extension trait for building responses without fallible builders.
pub trait ResponseExt {
    /// Creates a JSON response with the given status.
    ///
    /// A value that fails to serialize is logged and replaced with
    /// [`UNSERIALIZABLE_BODY`]; the status is kept.
    fn json<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Response;

    /// Creates an empty response with the given status.
    fn empty(status: StatusCode) -> Response;
}

impl ResponseExt for Response {
    fn json<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Response {
        let bytes = match serde_json::to_vec(body) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    status = status.as_u16(),
                    "failed to serialize response body"
                );
                Bytes::from_static(UNSERIALIZABLE_BODY.as_bytes())
            }
        };
        let mut response = http::Response::new(Full::new(bytes));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSON_CONTENT_TYPE),
        );
        response
    }

    fn empty(status: StatusCode) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        response
    }
}
