//! User repository for database operations.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

use sick_fits_core::{Email, PermissionSet, UserId};

use super::{RepositoryError, conflict_or_database};
use crate::models::{NewUser, PendingReset, User, UserPatch};

/// Row type for `storefront.user`.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: Email,
    name: String,
    password_hash: String,
    permissions: PermissionSet,
    reset_token: Option<String>,
    reset_token_expiry: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let reset = match (r.reset_token, r.reset_token_expiry) {
            (Some(token), Some(expires_at)) => Some(PendingReset {
                token: SecretString::from(token),
                expires_at,
            }),
            (None, None) => None,
            _ => {
                return Err(RepositoryError::DataCorruption(format!(
                    "user {} has a reset token without expiry (or vice versa)",
                    r.id
                )));
            }
        };

        Ok(Self {
            id: r.id,
            email: r.email,
            name: r.name,
            permissions: r.permissions,
            password_hash: SecretString::from(r.password_hash),
            reset,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name, password_hash, permissions,
                   reset_token, reset_token_expiry, created_at, updated_at
            FROM storefront.user
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their (lowercased) email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name, password_hash, permissions,
                   reset_token, reset_token_expiry, created_at, updated_at
            FROM storefront.user
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get the user holding a reset token that expires at or after `valid_at`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_reset_token(
        &self,
        token: &str,
        valid_at: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name, password_hash, permissions,
                   reset_token, reset_token_expiry, created_at, updated_at
            FROM storefront.user
            WHERE reset_token = $1 AND reset_token_expiry >= $2
            ORDER BY id
            LIMIT 1
            ",
        )
        .bind(token)
        .bind(valid_at)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// List all users, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name, password_hash, permissions,
                   reset_token, reset_token_expiry, created_at, updated_at
            FROM storefront.user
            ORDER BY id
            ",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO storefront.user (email, name, password_hash, permissions)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, name, password_hash, permissions,
                      reset_token, reset_token_expiry, created_at, updated_at
            ",
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.permissions)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "email"))?;

        User::try_from(row)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update(&self, id: UserId, patch: &UserPatch) -> Result<User, RepositoryError> {
        let replace_reset = patch.reset.is_some();
        let (reset_token, reset_token_expiry) = match patch.reset.as_ref().and_then(Option::as_ref)
        {
            Some(reset) => (
                Some(reset.token.expose_secret().to_owned()),
                Some(reset.expires_at),
            ),
            None => (None, None),
        };

        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE storefront.user
            SET name = COALESCE($2, name),
                password_hash = COALESCE($3, password_hash),
                permissions = COALESCE($4, permissions),
                reset_token = CASE WHEN $5 THEN $6 ELSE reset_token END,
                reset_token_expiry = CASE WHEN $5 THEN $7 ELSE reset_token_expiry END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, name, password_hash, permissions,
                      reset_token, reset_token_expiry, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.password_hash.as_deref())
        .bind(patch.permissions.as_ref())
        .bind(replace_reset)
        .bind(reset_token)
        .bind(reset_token_expiry)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "reset token"))?;

        row.map(User::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Set a new password and clear the reset token, but only if `token` is
    /// still held and unexpired at `valid_at`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn consume_reset_token(
        &self,
        token: &str,
        valid_at: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE storefront.user
            SET password_hash = $3,
                reset_token = NULL,
                reset_token_expiry = NULL,
                updated_at = NOW()
            WHERE reset_token = $1 AND reset_token_expiry >= $2
            RETURNING id, email, name, password_hash, permissions,
                      reset_token, reset_token_expiry, created_at, updated_at
            ",
        )
        .bind(token)
        .bind(valid_at)
        .bind(password_hash)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }
}
