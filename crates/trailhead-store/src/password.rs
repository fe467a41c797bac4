//! Argon2id password hashing.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;

use crate::error::{StoreError, StoreResult};

/// Hashes a password into a PHC string.
pub fn hash_password(password: &str) -> StoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::PasswordHash(e.to_string()))
}

/// Checks a password against a PHC string. Unparsable hashes never match.
#[must_use]
pub fn verify_password(password: &str, hashed: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hashed) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("password").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("password", &hash));
        assert!(!verify_password("password2", &hash));
    }

    #[test]
    fn test_salted() {
        let a = hash_password("password").unwrap();
        let b = hash_password("password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_hash() {
        assert!(!verify_password("password", "not-a-hash"));
    }
}
