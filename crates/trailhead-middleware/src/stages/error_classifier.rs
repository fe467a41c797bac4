//! Error classification.
//!
//! Enriches an [`AppError`] with a display title and a normalized list of
//! detail messages. Classification is total: every error maps to a
//! [`NormalizedError`] and nothing here can fail.
//!
//! | Error | Title | `errors` |
//! |---|---|---|
//! | `NotFound` | `Resource Not Found` | one fixed message |
//! | `Validation` | `Validation error` | one entry per field violation, in order |
//! | `Authorization` | `Authorization error` | none |
//! | `MalformedBody` | `Bad Request` | none |
//! | `Unclassified` | `Server Error` | none |

use trailhead_core::{AppError, NormalizedError, DEFAULT_TITLE};

/// Title for unclaimed requests.
pub const NOT_FOUND_TITLE: &str = "Resource Not Found";
/// Detail message for unclaimed requests.
pub const NOT_FOUND_DETAIL: &str = "The requested resource couldn't be found";
/// Title for persistence validation failures.
pub const VALIDATION_TITLE: &str = "Validation error";
/// Title for anti-forgery failures.
pub const AUTHORIZATION_TITLE: &str = "Authorization error";
/// Title for unparsable bodies.
pub const MALFORMED_BODY_TITLE: &str = "Bad Request";

/// The error classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Creates the classifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Classifies an error.
    #[must_use]
    pub fn classify(&self, error: &AppError) -> NormalizedError {
        let normalized = NormalizedError::from_app_error(error);

        match error {
            AppError::NotFound => normalized
                .with_title(NOT_FOUND_TITLE)
                .with_errors(vec![NOT_FOUND_DETAIL.to_string()]),
            AppError::Validation { fields, .. } => normalized
                .with_title(VALIDATION_TITLE)
                .with_errors(fields.iter().map(|f| f.message.clone()).collect()),
            AppError::Authorization { .. } => normalized.with_title(AUTHORIZATION_TITLE),
            AppError::MalformedBody { .. } => normalized.with_title(MALFORMED_BODY_TITLE),
            AppError::Unclassified { .. } => normalized.with_title(DEFAULT_TITLE),
        }
    }
}
