//! Password reset token lifecycle.
//!
//! A reset token is 20 random bytes, hex encoded, stored on the user with an
//! expiry one hour out. Requesting a new token replaces any previous one.
//! Consuming a token sets the new password and clears the token in a single
//! conditional write, so a token works at most once.

use chrono::Duration;
use rand::RngCore;
use secrecy::SecretString;

use sick_fits_core::Email;

use super::{AuthError, AuthService};
use crate::db::RepositoryError;
use crate::models::{PendingReset, User, UserPatch};
use crate::services::email::MailMessage;

/// How long a reset token is honored.
pub const RESET_TOKEN_TTL: Duration = Duration::hours(1);

/// Random bytes per reset token.
const RESET_TOKEN_BYTES: usize = 20;

/// Generate a fresh reset token.
#[must_use]
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl AuthService<'_> {
    /// Issue a reset token for `email` and mail the reset link.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if no account uses the email.
    /// Returns `AuthError::Mail` if the email can't be rendered or sent; the
    /// user's previous reset state is restored in that case.
    #[tracing::instrument(skip(self))]
    pub async fn request_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let token = generate_reset_token();
        let expires_at = self.clock.now() + RESET_TOKEN_TTL;
        let reset_url = self.reset_url(&token);
        let message = MailMessage::password_reset(user.email.as_str(), &user.name, &reset_url)?;

        self.set_reset(
            &user,
            Some(PendingReset {
                token: SecretString::from(token),
                expires_at,
            }),
        )
        .await?;

        if let Err(e) = self.mailer.send(message).await {
            tracing::error!(user_id = %user.id, error = %e, "reset email failed, restoring previous token");
            self.set_reset(&user, user.reset.clone()).await?;
            return Err(e.into());
        }

        tracing::info!(user_id = %user.id, %expires_at, "password reset requested");
        Ok(())
    }

    async fn set_reset(&self, user: &User, reset: Option<PendingReset>) -> Result<(), AuthError> {
        self.store
            .update_user(
                user.id,
                UserPatch {
                    reset: Some(reset),
                    ..UserPatch::default()
                },
            )
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })?;
        Ok(())
    }

    /// Replace the password of the user holding `reset_token`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordMismatch` if the passwords differ.
    /// Returns `AuthError::TokenInvalidOrExpired` if the token is unknown,
    /// already used, or older than [`RESET_TOKEN_TTL`].
    #[tracing::instrument(skip_all)]
    pub async fn reset_password(
        &self,
        password: &str,
        confirm_password: &str,
        reset_token: &str,
    ) -> Result<User, AuthError> {
        if password != confirm_password {
            return Err(AuthError::PasswordMismatch);
        }

        let now = self.clock.now();
        if self
            .store
            .find_user_by_reset_token(reset_token, now)
            .await?
            .is_none()
        {
            tracing::warn!("reset attempted with invalid or expired token");
            return Err(AuthError::TokenInvalidOrExpired);
        }

        let password_hash = self.hasher.hash(password).await?;
        let user = self
            .store
            .consume_reset_token(reset_token, now, &password_hash)
            .await?
            .ok_or(AuthError::TokenInvalidOrExpired)?;

        tracing::info!(user_id = %user.id, "password reset");
        Ok(user)
    }

    fn reset_url(&self, token: &str) -> String {
        format!(
            "{}/reset?resetToken={token}",
            self.frontend_url.as_str().trim_end_matches('/')
        )
    }
}
