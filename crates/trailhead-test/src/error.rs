//! Test error types.

use thiserror::Error;

/// Errors that can occur while building requests or reading responses.
#[derive(Debug, Error)]
pub enum TestError {
    /// The request could not be assembled.
    #[error("request build error: {0}")]
    RequestBuild(String),

    /// A header name or value was rejected.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The response body could not be collected or decoded.
    #[error("body read error: {0}")]
    BodyRead(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let error = TestError::InvalidHeader("bad\nname".to_string());
        assert_eq!(error.to_string(), "invalid header: bad\nname");
    }

    #[test]
    fn test_json_source() {
        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = TestError::from(json);
        assert!(std::error::Error::source(&error).is_some());
    }
}
