//! Error types for Trailhead.
//!
//! [`AppError`] is the single error type that flows through the request
//! pipeline. It is a closed set of variants, each carrying only the fields
//! it needs, so the classifier and responder can match on it exhaustively.
//!
//! | Variant | Status | Raised by |
//! |---|---|---|
//! | `NotFound` | 404 | Fallback handler for unclaimed requests |
//! | `Validation` | 400 | Persistence-layer constraint violations |
//! | `Authorization` | 403 | Anti-forgery token mismatch |
//! | `MalformedBody` | 400 | JSON body parser |
//! | `Unclassified` | 500 | Anything else |

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use thiserror::Error;

/// Result type alias using [`AppError`].
pub type AppResult<T> = Result<T, AppError>;

/// Message carried by every not-found error.
pub(crate) const NOT_FOUND_MESSAGE: &str = "The requested resource couldn't be found.";

/// Discriminant of an [`AppError`], used for metrics labels and titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No route claimed the request.
    NotFound,
    /// Persistence-layer validation failure.
    Validation,
    /// Anti-forgery token missing or invalid.
    Authorization,
    /// Request body could not be parsed.
    MalformedBody,
    /// Any other failure.
    Unclassified,
}

impl ErrorKind {
    /// Returns the default HTTP status code for this kind.
    #[must_use]
    pub const fn default_status_code(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Validation | Self::MalformedBody => StatusCode::BAD_REQUEST,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::Unclassified => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the label used in metrics and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Authorization => "authorization",
            Self::MalformedBody => "malformed_body",
            Self::Unclassified => "unclassified",
        }
    }

    /// Returns the error type name printed at the head of a diagnostic trace.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::NotFound => "NotFoundError",
            Self::Validation => "ValidationError",
            Self::Authorization => "AuthorizationError",
            Self::MalformedBody => "MalformedBodyError",
            Self::Unclassified => "UnclassifiedError",
        }
    }
}

/// A single field-level constraint violation reported by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// The offending field (column) name.
    pub field: String,
    /// Human-readable message, e.g. `"username must be unique"`.
    pub message: String,
}

impl FieldViolation {
    /// Creates a new field violation.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a uniqueness violation for a field.
    #[must_use]
    pub fn unique(field: impl Into<String>) -> Self {
        let field = field.into();
        let message = format!("{field} must be unique");
        Self { field, message }
    }
}

/// Standard error type for Trailhead.
///
/// # Example
///
/// ```
/// use trailhead_core::{AppError, ErrorKind, FieldViolation};
///
/// let error = AppError::validation(
///     "Validation error",
///     vec![FieldViolation::unique("username")],
/// );
/// assert_eq!(error.kind(), ErrorKind::Validation);
/// assert_eq!(error.status_code().as_u16(), 400);
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// No upstream stage produced a response.
    #[error("The requested resource couldn't be found.")]
    NotFound,

    /// A persistence-layer validation failure.
    ///
    /// `fields` preserves the order in which the store reported the
    /// violations and is never empty when built through
    /// [`AppError::validation`].
    #[error("{message}")]
    Validation {
        /// Summary message from the persistence layer.
        message: String,
        /// Per-field violations, in reporting order.
        fields: Vec<FieldViolation>,
    },

    /// Anti-forgery token missing or invalid.
    #[error("{message}")]
    Authorization {
        /// Human-readable error message.
        message: String,
    },

    /// The request body could not be parsed.
    #[error("{message}")]
    MalformedBody {
        /// Parser error message.
        message: String,
    },

    /// Any other failure.
    #[error("{message}")]
    Unclassified {
        /// Human-readable error message.
        message: String,
        /// The underlying error (never sent to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl AppError {
    /// Creates a not found error.
    #[must_use]
    pub const fn not_found() -> Self {
        Self::NotFound
    }

    /// Creates a validation error from per-field violations.
    ///
    /// An empty violation list is replaced by a single violation carrying
    /// the summary message, so a validation error always has at least one
    /// message to show.
    #[must_use]
    pub fn validation(message: impl Into<String>, fields: Vec<FieldViolation>) -> Self {
        let message = message.into();
        let fields = if fields.is_empty() {
            vec![FieldViolation::new("", message.clone())]
        } else {
            fields
        };
        Self::Validation { message, fields }
    }

    /// Creates an authorization error.
    #[must_use]
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// Creates a malformed body error.
    #[must_use]
    pub fn malformed_body(message: impl Into<String>) -> Self {
        Self::MalformedBody {
            message: message.into(),
        }
    }

    /// Creates an unclassified error.
    #[must_use]
    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::Unclassified {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an unclassified error wrapping an underlying cause.
    pub fn unclassified_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Unclassified {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Authorization { .. } => ErrorKind::Authorization,
            Self::MalformedBody { .. } => ErrorKind::MalformedBody,
            Self::Unclassified { .. } => ErrorKind::Unclassified,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.kind().default_status_code()
    }

    /// Renders the error and its `source()` chain as a diagnostic trace.
    ///
    /// The first line is `<TypeName>: <message>`, followed by one
    /// `caused by:` line per underlying error.
    #[must_use]
    pub fn diagnostic_trace(&self) -> String {
        let mut trace = format!("{}: {}", self.kind().type_name(), self);

        if let Self::Validation { fields, .. } = self {
            for violation in fields {
                let _ = write!(trace, "\n    at field `{}`: {}", violation.field, violation.message);
            }
        }

        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            let _ = write!(trace, "\n    caused by: {cause}");
            source = cause.source();
        }

        trace
    }
}
