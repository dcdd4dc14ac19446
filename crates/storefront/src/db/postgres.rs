//! `PostgreSQL` implementation of [`DataStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use sick_fits_core::{CartItemId, Email, ItemId, UserId};

use super::cart::CartRepository;
use super::items::ItemRepository;
use super::orders::OrderRepository;
use super::users::UserRepository;
use super::{DataStore, RepositoryError};
use crate::models::{
    Cart, CartItem, Item, ItemPatch, NewItem, NewOrder, NewUser, Order, User, UserPatch,
};

/// Data store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataStore for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(&self.pool).get_by_id(id).await
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(&self.pool).get_by_email(email).await
    }

    async fn find_user_by_reset_token(
        &self,
        token: &str,
        valid_at: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(&self.pool)
            .get_by_reset_token(token, valid_at)
            .await
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        UserRepository::new(&self.pool).list().await
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        UserRepository::new(&self.pool).create(&user).await
    }

    async fn update_user(&self, id: UserId, patch: UserPatch) -> Result<User, RepositoryError> {
        UserRepository::new(&self.pool).update(id, &patch).await
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        valid_at: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(&self.pool)
            .consume_reset_token(token, valid_at, password_hash)
            .await
    }

    async fn find_item(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        ItemRepository::new(&self.pool).get(id).await
    }

    async fn create_item(&self, owner: UserId, item: NewItem) -> Result<Item, RepositoryError> {
        ItemRepository::new(&self.pool).create(owner, &item).await
    }

    async fn update_item(&self, id: ItemId, patch: ItemPatch) -> Result<Item, RepositoryError> {
        ItemRepository::new(&self.pool).update(id, &patch).await
    }

    async fn delete_item(&self, id: ItemId) -> Result<Item, RepositoryError> {
        ItemRepository::new(&self.pool).delete(id).await
    }

    async fn find_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError> {
        CartRepository::new(&self.pool).get(id).await
    }

    async fn add_or_increment_cart_item(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<CartItem, RepositoryError> {
        CartRepository::new(&self.pool)
            .add_or_increment(user_id, item_id)
            .await
    }

    async fn delete_cart_item(&self, id: CartItemId) -> Result<CartItem, RepositoryError> {
        CartRepository::new(&self.pool).delete(id).await
    }

    async fn list_cart(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        CartRepository::new(&self.pool).list(user_id).await
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        OrderRepository::new(&self.pool).create(&order).await
    }
}
