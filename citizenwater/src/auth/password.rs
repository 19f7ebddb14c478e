//! Password hashing and verification using Argon2
//!
//! Uses the argon2id variant with default parameters.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::types::ServiceError;

/// Shortest accepted password
pub const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password using Argon2id
///
/// Returns the PHC-formatted hash string that includes the salt and parameters.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::Auth(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored PHC hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, ServiceError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| ServiceError::Auth(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("river-sample-2026").unwrap();
        assert!(hash.starts_with("$argon2id"));

        assert!(verify_password("river-sample-2026", &hash).unwrap());
        assert!(!verify_password("lake-sample-2026", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash() {
        assert!(verify_password("password", "plaintext").is_err());
    }
}
