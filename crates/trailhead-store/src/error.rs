//! Store error types.

use thiserror::Error;
use trailhead_core::{AppError, FieldViolation};

/// Summary message of every constraint failure.
pub const VALIDATION_MESSAGE: &str = "Validation error";

/// Errors raised by a [`UserStore`](crate::UserStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// One or more unique columns already hold the value.
    ///
    /// `violations` lists every violated column of the offending row, in
    /// column order.
    #[error("Validation error")]
    UniqueViolation {
        /// Violated columns.
        violations: Vec<FieldViolation>,
    },

    /// A column value failed a model constraint.
    #[error("Validation error")]
    InvalidRecord {
        /// Failed constraints, in column order.
        violations: Vec<FieldViolation>,
    },

    /// Password hashing failed.
    #[error("failed to hash password: {0}")]
    PasswordHash(String),
}

impl StoreError {
    /// Per-field violations, empty for non-constraint errors.
    #[must_use]
    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            Self::UniqueViolation { violations } | Self::InvalidRecord { violations } => violations,
            Self::PasswordHash(_) => &[],
        }
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::UniqueViolation { violations }
            | StoreError::InvalidRecord { violations } => {
                AppError::validation(VALIDATION_MESSAGE, violations)
            }
            other @ StoreError::PasswordHash(_) => {
                AppError::unclassified_with_source("could not store user", other)
            }
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use trailhead_core::ErrorKind;

    #[test]
    fn test_unique_violation_becomes_validation() {
        let error = StoreError::UniqueViolation {
            violations: vec![FieldViolation::unique("username"), FieldViolation::unique("email")],
        };
        let app: AppError = error.into();

        assert_eq!(app.kind(), ErrorKind::Validation);
        assert_eq!(app.to_string(), "Validation error");
        match app {
            AppError::Validation { fields, .. } => {
                assert_eq!(fields[0].message, "username must be unique");
                assert_eq!(fields[1].message, "email must be unique");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_hash_failure_is_unclassified() {
        let app: AppError = StoreError::PasswordHash("bad params".into()).into();
        assert_eq!(app.kind(), ErrorKind::Unclassified);
        assert!(app.diagnostic_trace().contains("bad params"));
    }
}
