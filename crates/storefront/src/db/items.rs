//! Item repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use sick_fits_core::{ItemId, Price, UserId};

use super::RepositoryError;
use crate::models::{Item, ItemPatch, NewItem};

/// Row type for `storefront.item`.
#[derive(sqlx::FromRow)]
struct ItemRow {
    id: ItemId,
    user_id: UserId,
    title: String,
    description: String,
    price: Price,
    image: Option<String>,
    large_image: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(r: ItemRow) -> Self {
        Self {
            id: r.id,
            owner: r.user_id,
            title: r.title,
            description: r.description,
            price: r.price,
            image: r.image,
            large_image: r.large_image,
            created_at: r.created_at,
        }
    }
}

/// Repository for item database operations.
pub struct ItemRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ItemRepository<'a> {
    /// Create a new item repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an item by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        let row = sqlx::query_as::<_, ItemRow>(
            r"
            SELECT id, user_id, title, description, price, image, large_image, created_at
            FROM storefront.item
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Item::from))
    }

    /// Create an item owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, owner: UserId, item: &NewItem) -> Result<Item, RepositoryError> {
        let row = sqlx::query_as::<_, ItemRow>(
            r"
            INSERT INTO storefront.item (user_id, title, description, price, image, large_image)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, title, description, price, image, large_image, created_at
            ",
        )
        .bind(owner)
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.price)
        .bind(item.image.as_deref())
        .bind(item.large_image.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Apply a partial update. The owner column is never written.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item doesn't exist.
    pub async fn update(&self, id: ItemId, patch: &ItemPatch) -> Result<Item, RepositoryError> {
        let row = sqlx::query_as::<_, ItemRow>(
            r"
            UPDATE storefront.item
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                image = COALESCE($5, image),
                large_image = COALESCE($6, large_image)
            WHERE id = $1
            RETURNING id, user_id, title, description, price, image, large_image, created_at
            ",
        )
        .bind(id)
        .bind(patch.title.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.price)
        .bind(patch.image.as_deref())
        .bind(patch.large_image.as_deref())
        .fetch_optional(self.pool)
        .await?;

        row.map(Item::from).ok_or(RepositoryError::NotFound)
    }

    /// Delete an item. Cart rows referencing it cascade.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item doesn't exist.
    pub async fn delete(&self, id: ItemId) -> Result<Item, RepositoryError> {
        let row = sqlx::query_as::<_, ItemRow>(
            r"
            DELETE FROM storefront.item
            WHERE id = $1
            RETURNING id, user_id, title, description, price, image, large_image, created_at
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Item::from).ok_or(RepositoryError::NotFound)
    }
}
