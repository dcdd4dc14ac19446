//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`.
//! Every error response has the body `{"error": "<message>"}`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::commerce::CommerceError;
use crate::services::payments::PaymentError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Item, cart, or checkout operation failed.
    #[error("Commerce error: {0}")]
    Commerce(#[from] CommerceError),

    /// Request body or path could not be parsed.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

const INTERNAL_MESSAGE: &str = "Internal server error";

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::Unauthenticated(_) => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::PasswordMismatch
                | AuthError::TokenInvalidOrExpired => StatusCode::BAD_REQUEST,
                AuthError::Mail(_) | AuthError::PasswordHash | AuthError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Commerce(err) => match err {
                CommerceError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
                CommerceError::Forbidden(_) => StatusCode::FORBIDDEN,
                CommerceError::ItemNotFound | CommerceError::CartItemNotFound => {
                    StatusCode::NOT_FOUND
                }
                CommerceError::EmptyCart | CommerceError::InvalidPrice(_) => {
                    StatusCode::BAD_REQUEST
                }
                CommerceError::Payment(_) => StatusCode::PAYMENT_REQUIRED,
                CommerceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Whether this error should be reported to Sentry.
    fn is_reportable(&self) -> bool {
        match self {
            Self::Commerce(CommerceError::Payment(
                PaymentError::Declined(_) | PaymentError::InvalidAmount(_),
            )) => false,
            Self::Commerce(CommerceError::Payment(_)) => true,
            _ => self.status().is_server_error(),
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        if self.status().is_server_error() {
            return INTERNAL_MESSAGE.to_string();
        }
        match self {
            Self::Auth(err) => err.to_string(),
            Self::Commerce(CommerceError::Payment(PaymentError::Declined(msg))) => msg.clone(),
            Self::Commerce(CommerceError::Payment(_)) => "Payment failed".to_string(),
            Self::Commerce(err) => err.to_string(),
            Self::BadRequest(msg) => msg.clone(),
            Self::Database(_) => INTERNAL_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_reportable() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let status = self.status();
        let body = Json(json!({ "error": self.public_message() }));
        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on signout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;
    use crate::services::context::Unauthenticated;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_of(err: AppError) -> serde_json::Value {
        let bytes = to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("missing field `email`".to_string());
        assert_eq!(err.to_string(), "Bad request: missing field `email`");
    }

    #[test]
    fn test_auth_status_codes() {
        assert_eq!(
            get_status(AuthError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AuthError::Unauthenticated(Unauthenticated).into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AuthError::UserAlreadyExists.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AuthError::TokenInvalidOrExpired.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AuthError::PasswordMismatch.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(AuthError::UserNotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(AuthError::PasswordHash.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_commerce_status_codes() {
        assert_eq!(
            get_status(CommerceError::Forbidden("no".to_string()).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(CommerceError::ItemNotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CommerceError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CommerceError::Payment(PaymentError::Declined("no".to_string())).into()),
            StatusCode::PAYMENT_REQUIRED
        );
    }

    #[test]
    fn test_generic_status_codes() {
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(RepositoryError::NotFound.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_body_is_json_error() {
        let body = body_of(AuthError::PasswordMismatch.into()).await;
        assert_eq!(body["error"], "your passwords don't match");
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let body = body_of(AppError::Database(RepositoryError::DataCorruption(
            "row 7 is broken".to_string(),
        )))
        .await;
        assert_eq!(body["error"], INTERNAL_MESSAGE);
    }
}
