//! Signed session tokens.
//!
//! A token is `<payload>.<signature>` where `payload` is the base64url
//! (unpadded) JSON `{"userId": n}` and `signature` is the hex HMAC-SHA256 of
//! the encoded payload under the application secret. Tokens carry no expiry
//! and are not tracked server side; rotating the secret invalidates all of
//! them.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use sick_fits_core::UserId;

type HmacSha256 = Hmac<Sha256>;

/// Why a token was rejected.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Not of the form `payload.signature`.
    #[error("malformed token")]
    Malformed,

    /// Signature does not match the payload.
    #[error("invalid token signature")]
    BadSignature,

    /// Signature is fine but the payload isn't a session claim.
    #[error("invalid token payload")]
    BadPayload,

    /// The secret can't key an HMAC.
    #[error("invalid signing key")]
    InvalidKey,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Claims {
    user_id: UserId,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct SessionTokens {
    mac: HmacSha256,
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("mac", &"[REDACTED]")
            .finish()
    }
}

impl SessionTokens {
    /// Create a token service keyed by `secret`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidKey` if the secret can't key an HMAC.
    pub fn new(secret: &SecretString) -> Result<Self, TokenError> {
        let mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|_| TokenError::InvalidKey)?;
        Ok(Self { mac })
    }

    /// Issue a token naming `user_id`.
    #[must_use]
    pub fn issue(&self, user_id: UserId) -> String {
        // Serializing a struct with one integer field cannot fail.
        let json = serde_json::to_vec(&Claims { user_id }).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = self.sign(&payload);
        format!("{payload}.{signature}")
    }

    /// Verify a token and return the user it names.
    ///
    /// # Errors
    ///
    /// Returns a `TokenError` if the token is malformed, its signature does
    /// not match, or its payload is not exactly `{"userId": n}`.
    pub fn verify(&self, token: &str) -> Result<UserId, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        if payload.is_empty() || signature.is_empty() {
            return Err(TokenError::Malformed);
        }

        if !constant_time_compare(&self.sign(payload), signature) {
            return Err(TokenError::BadSignature);
        }

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::BadPayload)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| TokenError::BadPayload)?;
        Ok(claims.user_id)
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
