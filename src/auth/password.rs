//! Email format, password policy and Argon2 password hashing.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;
use regex::Regex;

use super::AuthError;
use crate::config::SecurityConfig;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex compiles"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_number: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_number: true,
        }
    }
}

impl PasswordPolicy {
    pub fn from_config(security: &SecurityConfig) -> Self {
        Self {
            min_length: security.password_min_length,
            ..Self::default()
        }
    }

    pub fn validate(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.min_length {
            return Err(AuthError::WeakPassword(format!(
                "Password must be at least {} characters",
                self.min_length
            )));
        }

        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err(AuthError::WeakPassword(
                "Password must contain at least one uppercase letter".to_string(),
            ));
        }

        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            return Err(AuthError::WeakPassword(
                "Password must contain at least one lowercase letter".to_string(),
            ));
        }

        if self.require_number && !password.chars().any(|c| c.is_numeric()) {
            return Err(AuthError::WeakPassword(
                "Password must contain at least one number".to_string(),
            ));
        }

        Ok(())
    }
}

/// Argon2id hash in PHC string form.
pub fn hash_password_blocking(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// False for a mismatch or an unparsable stored hash.
pub fn verify_password_blocking(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub async fn hash_password(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password_blocking(&password))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
}

pub async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password_blocking(&password, &hash))
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_format() {
        assert!(is_valid_email("u1@test.com"));
        assert!(!is_valid_email("u1test.com"));
        assert!(!is_valid_email("u1@test"));
        assert!(!is_valid_email("u 1@test.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn policy_requires_length_and_mixed_classes() {
        let policy = PasswordPolicy::default();
        assert!(policy.validate("Strong1Pass").is_ok());
        assert!(policy.validate("Sh0rt").is_err());
        assert!(policy.validate("alllowercase1").is_err());
        assert!(policy.validate("ALLUPPERCASE1").is_err());
        assert!(policy.validate("NoDigitsHere").is_err());
    }

    #[test]
    fn hash_round_trip() {
        let hash = hash_password_blocking("Strong1Pass").unwrap();
        assert_ne!(hash, "Strong1Pass");
        assert!(verify_password_blocking("Strong1Pass", &hash));
        assert!(!verify_password_blocking("strong1pass", &hash));
        assert!(!verify_password_blocking("Strong1Pass", "plaintext"));
    }

    #[tokio::test]
    async fn async_helpers_match_blocking() {
        let hash = hash_password("Testing".to_string()).await.unwrap();
        assert!(verify_password("Testing".to_string(), hash).await);
    }
}
