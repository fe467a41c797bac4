//! User rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trailhead_core::FieldViolation;

/// Row payload for an insert: what a sign-up or a seeder provides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Unique email address.
    pub email: String,
    /// Unique display name.
    pub username: String,
    /// Argon2 PHC string.
    pub hashed_password: String,
}

impl UserRecord {
    /// Creates a record from an already hashed password.
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        hashed_password: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            username: username.into(),
            hashed_password: hashed_password.into(),
        }
    }

    /// Checks the column constraints, returning every failure in column order.
    #[must_use]
    pub fn check(&self) -> Vec<FieldViolation> {
        let mut violations = Vec::new();

        let len = self.username.chars().count();
        if !(4..=30).contains(&len) {
            violations.push(FieldViolation::new(
                "username",
                "username must be between 4 and 30 characters",
            ));
        } else if self.username.contains('@') {
            violations.push(FieldViolation::new("username", "username cannot be an email"));
        }

        let len = self.email.chars().count();
        if !(3..=256).contains(&len) || !looks_like_email(&self.email) {
            violations.push(FieldViolation::new("email", "email must be a valid email"));
        }

        if self.hashed_password.is_empty() {
            violations.push(FieldViolation::new("hashedPassword", "hashedPassword cannot be empty"));
        }

        violations
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

/// A stored user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Primary key, assigned by the store.
    pub id: u64,
    /// Unique email address.
    pub email: String,
    /// Unique display name.
    pub username: String,
    /// Never serialized.
    #[serde(skip_serializing)]
    pub hashed_password: String,
    /// Insert time.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Checks a plaintext password against the stored hash.
    #[must_use]
    pub fn verify_password(&self, password: &str) -> bool {
        crate::password::verify_password(password, &self.hashed_password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_record() {
        let record = UserRecord::new("demo@user.demo", "Demo", "$argon2id$x");
        assert!(record.check().is_empty());
    }

    #[test]
    fn test_every_violation_reported() {
        let record = UserRecord::new("nope", "ab", "");
        let fields: Vec<_> = record.check().into_iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["username", "email", "hashedPassword"]);
    }

    #[test]
    fn test_username_cannot_be_email() {
        let record = UserRecord::new("a@b.co", "a@b.co", "hash");
        assert_eq!(record.check()[0].message, "username cannot be an email");
    }

    #[test]
    fn test_hash_not_serialized() {
        let user = User {
            id: 1,
            email: "demo@user.demo".into(),
            username: "Demo".into(),
            hashed_password: "secret".into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("hashedPassword").is_none());
        assert_eq!(json["username"], "Demo");
    }
}
