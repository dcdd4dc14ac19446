//! User management commands.
//!
//! Bootstraps the first administrator, who can then manage permissions
//! through the API.

use sick_fits_core::{Email, PermissionError, PermissionSet};
use sick_fits_storefront::db::{self, DataStore, PgStore, RepositoryError};
use sick_fits_storefront::models::UserPatch;

/// Errors that can occur during user operations.
#[derive(Debug, thiserror::Error)]
pub enum UserCommandError {
    #[error("Missing environment variable: STOREFRONT_DATABASE_URL or DATABASE_URL")]
    MissingDatabaseUrl,

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error(transparent)]
    InvalidPermission(#[from] PermissionError),

    #[error("No user with email: {0}")]
    UserNotFound(String),

    #[error("Database connection error: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Replace the permissions of the user with `email`.
///
/// # Errors
///
/// Returns `UserCommandError` for an unknown label or email, or a database failure.
pub async fn set_permissions(email: &str, labels: &[String]) -> Result<(), UserCommandError> {
    let permissions = PermissionSet::parse_labels(labels)?;
    let email = Email::parse(email).map_err(|_| UserCommandError::InvalidEmail(email.to_owned()))?;

    let database_url = super::database_url().ok_or(UserCommandError::MissingDatabaseUrl)?;
    let store = PgStore::new(db::create_pool(&database_url).await?);

    let user = store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| UserCommandError::UserNotFound(email.to_string()))?;

    let user = store
        .update_user(
            user.id,
            UserPatch {
                permissions: Some(permissions),
                ..UserPatch::default()
            },
        )
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, permissions = %user.permissions, "Permissions updated");
    Ok(())
}
