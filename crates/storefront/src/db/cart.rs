//! Cart repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use sick_fits_core::{CartItemId, ItemId, Price, UserId};

use super::{RepositoryError, missing_or_database, quantity_from_db};
use crate::models::{Cart, CartItem, CartLine, Item};

/// Row type for `storefront.cart_item`.
#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: CartItemId,
    user_id: UserId,
    item_id: ItemId,
    quantity: i32,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(r: CartItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            item_id: r.item_id,
            quantity: quantity_from_db(r.quantity)?,
        })
    }
}

/// Row type for a cart row joined with its item.
#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: CartItemId,
    quantity: i32,
    item_id: ItemId,
    owner_id: UserId,
    title: String,
    description: String,
    price: Price,
    image: Option<String>,
    large_image: Option<String>,
    item_created_at: DateTime<Utc>,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(r: CartLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            quantity: quantity_from_db(r.quantity)?,
            item: Item {
                id: r.item_id,
                owner: r.owner_id,
                title: r.title,
                description: r.description,
                price: r.price,
                image: r.image,
                large_image: r.large_image,
                created_at: r.item_created_at,
            },
        })
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a cart row by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT id, user_id, item_id, quantity
            FROM storefront.cart_item
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(CartItem::try_from).transpose()
    }

    /// Insert a row with quantity 1 or bump an existing row by 1.
    ///
    /// Relies on the `(user_id, item_id)` unique constraint so concurrent
    /// adds serialize in the database instead of racing a read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item was deleted first.
    /// Returns `RepositoryError::Database` if the upsert fails otherwise.
    pub async fn add_or_increment(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<CartItem, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            INSERT INTO storefront.cart_item AS cart_item (user_id, item_id, quantity)
            VALUES ($1, $2, 1)
            ON CONFLICT (user_id, item_id)
            DO UPDATE SET quantity = cart_item.quantity + 1
            RETURNING id, user_id, item_id, quantity
            ",
        )
        .bind(user_id)
        .bind(item_id)
        .fetch_one(self.pool)
        .await
        .map_err(missing_or_database)?;

        CartItem::try_from(row)
    }

    /// Delete a cart row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the row doesn't exist.
    pub async fn delete(&self, id: CartItemId) -> Result<CartItem, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            DELETE FROM storefront.cart_item
            WHERE id = $1
            RETURNING id, user_id, item_id, quantity
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(CartItem::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Get a user's cart with item details, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT c.id, c.quantity,
                   i.id AS item_id, i.user_id AS owner_id, i.title, i.description,
                   i.price, i.image, i.large_image, i.created_at AS item_created_at
            FROM storefront.cart_item c
            JOIN storefront.item i ON i.id = c.item_id
            WHERE c.user_id = $1
            ORDER BY c.id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let lines = rows
            .into_iter()
            .map(CartLine::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Cart::new(lines))
    }
}
