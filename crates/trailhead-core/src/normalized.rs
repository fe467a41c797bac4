//! The uniform error contract sent to clients.
//!
//! A [`NormalizedError`] is built once per faulted request by the error
//! classifier and consumed by value by the error responder, which turns it
//! into an [`ErrorBody`]. Consuming it by value is what guarantees a single
//! response per request.

use crate::error::{AppError, ErrorKind};
use crate::mode::DeploymentMode;
use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Title used when nothing more specific is known.
pub const DEFAULT_TITLE: &str = "Server Error";

/// An error enriched with everything the responder needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedError {
    /// HTTP status of the response.
    pub status: StatusCode,
    /// Short display title.
    pub title: String,
    /// Human-readable message.
    pub message: String,
    /// Ordered list of detail messages, if any.
    pub errors: Option<Vec<String>>,
    /// Diagnostic trace. Always captured, redacted at response time.
    pub stack: Option<String>,
    /// The kind of the originating error.
    pub kind: ErrorKind,
}

impl NormalizedError {
    /// Creates a normalized error with the default status and title.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            title: DEFAULT_TITLE.to_string(),
            message: message.into(),
            errors: None,
            stack: None,
            kind: ErrorKind::Unclassified,
        }
    }

    /// Starts from an [`AppError`], copying its status, message and trace.
    ///
    /// Titles and detail lists are filled in by the classifier.
    #[must_use]
    pub fn from_app_error(error: &AppError) -> Self {
        Self {
            status: error.status_code(),
            title: DEFAULT_TITLE.to_string(),
            message: error.to_string(),
            errors: None,
            stack: Some(error.diagnostic_trace()),
            kind: error.kind(),
        }
    }

    /// Sets the status code.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Sets the display title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the detail message list.
    #[must_use]
    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Converts into the wire body, dropping the trace in production.
    #[must_use]
    pub fn into_body(self, mode: DeploymentMode) -> ErrorBody {
        ErrorBody {
            title: self.title,
            message: self.message,
            errors: self.errors,
            stack: if mode.is_production() { None } else { self.stack },
        }
    }
}

/// The JSON body of every error response.
///
/// All four keys are always present; absent values serialize as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short display title.
    pub title: String,
    /// Human-readable message.
    pub message: String,
    /// Ordered detail messages.
    pub errors: Option<Vec<String>>,
    /// Diagnostic trace, `null` in production.
    pub stack: Option<String>,
}
