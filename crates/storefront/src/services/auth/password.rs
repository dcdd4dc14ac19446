//! Password hashing with Argon2id.
//!
//! Hashes are stored in PHC string format, so verification reads the
//! algorithm, parameters and salt from the stored hash rather than from
//! configuration. Raising the cost only affects new hashes.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};

use super::AuthError;
use crate::config::PasswordHashConfig;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hashed once per hasher so unknown-account checks cost the same as real ones.
const DUMMY_PASSWORD: &str = "sick-fits-no-such-account";

/// Hashes and verifies passwords.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
    dummy_hash: String,
}

impl PasswordHasher {
    /// Create a hasher with the configured cost.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordHash` if the parameters are out of range.
    pub fn new(config: &PasswordHashConfig) -> Result<Self, AuthError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| {
            tracing::error!(error = %e, "invalid argon2 parameters");
            AuthError::PasswordHash
        })?;
        let mut hasher = Self {
            params,
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash_blocking(DUMMY_PASSWORD)?;
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordHash` if hashing fails.
    pub fn hash_blocking(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| AuthError::PasswordHash)
    }

    /// Check a password against a stored hash.
    ///
    /// A malformed stored hash never matches.
    #[must_use]
    pub fn verify_blocking(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            tracing::warn!("stored password hash is malformed");
            return false;
        };
        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// [`hash_blocking`](Self::hash_blocking) on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordHash` if hashing fails or the task panics.
    pub async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash_blocking(&password))
            .await
            .map_err(|_| AuthError::PasswordHash)?
    }

    /// Run a verification that always fails, at the configured cost.
    ///
    /// Used when there is no stored hash to check against.
    pub async fn verify_dummy(&self, password: &str) -> bool {
        let hash = self.dummy_hash.clone();
        self.verify(password, &hash).await
    }

    /// [`verify_blocking`](Self::verify_blocking) on the blocking thread pool.
    pub async fn verify(&self, password: &str, hash: &str) -> bool {
        let hasher = self.clone();
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || hasher.verify_blocking(&password, &hash))
            .await
            .unwrap_or(false)
    }
}

/// Validate password meets requirements.
pub(crate) fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Cheapest parameters argon2 accepts.
    pub(crate) fn fast_hasher() -> PasswordHasher {
        PasswordHasher::new(&PasswordHashConfig {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_hash_then_verify() {
        let hasher = fast_hasher();
        let hash = hasher.hash_blocking("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify_blocking("correct horse", &hash));
        assert!(!hasher.verify_blocking("battery staple", &hash));
    }

    #[test]
    fn test_same_password_different_salt() {
        let hasher = fast_hasher();
        let a = hasher.hash_blocking("password1").unwrap();
        let b = hasher.hash_blocking("password1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_fails_closed() {
        let hasher = fast_hasher();
        assert!(!hasher.verify_blocking("anything", "not-a-phc-string"));
        assert!(!hasher.verify_blocking("anything", ""));
    }

    #[test]
    fn test_verify_uses_params_from_hash() {
        let weak = fast_hasher();
        let hash = weak.hash_blocking("password1").unwrap();
        let stronger = PasswordHasher::new(&PasswordHashConfig {
            memory_kib: 16,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        assert!(stronger.verify_blocking("password1", &hash));
    }

    #[test]
    fn test_rejects_invalid_params() {
        let result = PasswordHasher::new(&PasswordHashConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(matches!(result, Err(AuthError::PasswordHash)));
    }

    #[tokio::test]
    async fn test_dummy_verify_uses_configured_cost() {
        let hasher = fast_hasher();
        assert!(hasher.dummy_hash.starts_with("$argon2id$v=19$m=8,t=1,p=1$"));
        assert!(!hasher.verify_dummy("hunter2hunter2").await);
    }

    #[tokio::test]
    async fn test_async_wrappers() {
        let hasher = fast_hasher();
        let hash = hasher.hash("hunter2hunter2").await.unwrap();
        assert!(hasher.verify("hunter2hunter2", &hash).await);
        assert!(!hasher.verify("hunter3hunter3", &hash).await);
    }

    #[test]
    fn test_validate_password_length() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("longenough").is_ok());
    }
}
