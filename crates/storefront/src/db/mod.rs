//! Data store for the storefront.
//!
//! Services talk to persistence only through the [`DataStore`] trait. Two
//! implementations exist:
//!
//! - [`PgStore`] - `PostgreSQL` via sqlx, split into per-table repositories
//! - [`MemoryStore`] - in-process tables, used by tests and local runs
//!
//! # Database: `sick_fits`
//!
//! ## Tables (schema `storefront`)
//!
//! - `user` - Accounts, password hashes, permissions, pending reset tokens
//! - `item` - Items for sale, owned by a user
//! - `cart_item` - Cart rows, unique per (user, item)
//! - `order` / `order_item` - Completed orders with item snapshots
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p sick-fits-cli -- migrate
//! ```

pub mod cart;
pub mod items;
pub mod memory;
pub mod orders;
pub mod postgres;
pub mod users;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use sick_fits_core::{CartItemId, Email, ItemId, UserId};

use crate::models::{
    Cart, CartItem, Item, ItemPatch, NewItem, NewOrder, NewUser, Order, User, UserPatch,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors from data store operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Persistence operations the storefront needs.
///
/// Single-row writes are atomic. Operations that must not race
/// ([`add_or_increment_cart_item`](Self::add_or_increment_cart_item),
/// [`consume_reset_token`](Self::consume_reset_token),
/// [`create_order`](Self::create_order)) are atomic as a whole.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;

    // Users

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// Find the user holding `token` whose reset expiry is at or after `valid_at`.
    async fn find_user_by_reset_token(
        &self,
        token: &str,
        valid_at: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError>;

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError>;

    /// Returns `RepositoryError::Conflict` if the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    async fn update_user(&self, id: UserId, patch: UserPatch) -> Result<User, RepositoryError>;

    /// Replace the password of the user holding a still-valid `token` and
    /// clear the token and its expiry in the same write.
    ///
    /// Returns `None` if no user holds the token or it has expired; a token
    /// can therefore be consumed at most once.
    async fn consume_reset_token(
        &self,
        token: &str,
        valid_at: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<User>, RepositoryError>;

    // Items

    async fn find_item(&self, id: ItemId) -> Result<Option<Item>, RepositoryError>;

    async fn create_item(&self, owner: UserId, item: NewItem) -> Result<Item, RepositoryError>;

    /// Returns `RepositoryError::NotFound` if the item doesn't exist.
    async fn update_item(&self, id: ItemId, patch: ItemPatch) -> Result<Item, RepositoryError>;

    /// Delete an item and any cart rows pointing at it.
    ///
    /// Returns `RepositoryError::NotFound` if the item doesn't exist.
    async fn delete_item(&self, id: ItemId) -> Result<Item, RepositoryError>;

    // Cart

    async fn find_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError>;

    /// Insert a (user, item) row with quantity 1, or increment an existing
    /// row's quantity by exactly 1, as one atomic operation.
    async fn add_or_increment_cart_item(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<CartItem, RepositoryError>;

    /// Returns `RepositoryError::NotFound` if the row doesn't exist.
    async fn delete_cart_item(&self, id: CartItemId) -> Result<CartItem, RepositoryError>;

    async fn list_cart(&self, user_id: UserId) -> Result<Cart, RepositoryError>;

    // Orders

    /// Insert the order and its items and remove the consumed quantities from
    /// the cart in one transaction. A row whose quantity grew after pricing
    /// keeps the extra units.
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique-constraint violation to `RepositoryError::Conflict`.
pub(crate) fn conflict_or_database(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Map a foreign-key violation (the referenced row is gone) to
/// `RepositoryError::NotFound`.
pub(crate) fn missing_or_database(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::NotFound;
    }
    RepositoryError::Database(e)
}

/// Convert a stored quantity to the domain type.
pub(crate) fn quantity_from_db(quantity: i32) -> Result<u32, RepositoryError> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or_else(|| RepositoryError::DataCorruption(format!("invalid quantity: {quantity}")))
}

/// Convert a domain quantity for storage.
pub(crate) fn quantity_to_db(quantity: u32) -> Result<i32, RepositoryError> {
    i32::try_from(quantity)
        .map_err(|_| RepositoryError::DataCorruption(format!("quantity too large: {quantity}")))
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::error::Error as StdError;

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    #[derive(Debug, Error)]
    #[error("{message}")]
    struct FakeDbError {
        message: &'static str,
        kind: ErrorKind,
    }

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            self.message
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            None
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.kind {
                ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
                ErrorKind::ForeignKeyViolation => ErrorKind::ForeignKeyViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn db_error(kind: ErrorKind) -> sqlx::Error {
        sqlx::Error::Database(Box::new(FakeDbError {
            message: "constraint failed",
            kind,
        }))
    }

    #[test]
    fn test_foreign_key_violation_is_not_found() {
        assert!(matches!(
            missing_or_database(db_error(ErrorKind::ForeignKeyViolation)),
            RepositoryError::NotFound
        ));
        assert!(matches!(
            missing_or_database(db_error(ErrorKind::Other)),
            RepositoryError::Database(_)
        ));
    }

    #[test]
    fn test_unique_violation_is_conflict() {
        assert!(matches!(
            conflict_or_database(db_error(ErrorKind::UniqueViolation), "email"),
            RepositoryError::Conflict(_)
        ));
        assert!(matches!(
            conflict_or_database(sqlx::Error::RowNotFound, "email"),
            RepositoryError::Database(_)
        ));
    }

    #[test]
    fn test_quantity_conversions() {
        assert_eq!(quantity_from_db(3).unwrap_or_default(), 3);
        assert!(quantity_from_db(0).is_err());
        assert!(quantity_from_db(-1).is_err());
        assert!(quantity_to_db(u32::MAX).is_err());
    }
}
