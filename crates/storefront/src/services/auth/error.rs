//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::context::Unauthenticated;
use crate::services::email::EmailError;
use crate::services::permissions::Forbidden;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] sick_fits_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid email or password")]
    InvalidCredentials,

    /// User not found.
    #[error("no user found for that email")]
    UserNotFound,

    /// User already exists.
    #[error("an account with that email already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Password and confirmation differ.
    #[error("your passwords don't match")]
    PasswordMismatch,

    /// Reset token unknown, already used, or expired.
    #[error("this token is either invalid or expired")]
    TokenInvalidOrExpired,

    /// Caller is not signed in.
    #[error(transparent)]
    Unauthenticated(#[from] Unauthenticated),

    /// Caller fails a permission gate.
    #[error(transparent)]
    Forbidden(#[from] Forbidden),

    /// Reset email could not be sent.
    #[error("email error: {0}")]
    Mail(#[from] EmailError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
