//! In-memory implementation of [`DataStore`].
//!
//! All tables live behind one mutex, so every trait method is a single
//! critical section. Uniqueness and cascade rules mirror the `PostgreSQL`
//! schema.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

use sick_fits_core::{CartItemId, Email, ItemId, OrderId, OrderItemId, UserId};

use super::{DataStore, RepositoryError};
use crate::models::{
    Cart, CartItem, CartLine, Item, ItemPatch, NewItem, NewOrder, NewUser, Order, OrderItem,
    User, UserPatch,
};

#[derive(Default)]
struct Tables {
    next_id: i32,
    users: BTreeMap<i32, User>,
    items: BTreeMap<i32, Item>,
    cart: BTreeMap<i32, CartItem>,
    orders: BTreeMap<i32, Order>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn reset_token_taken(&self, token: &str, except: UserId) -> bool {
        self.users.values().any(|u| {
            u.id != except
                && u.reset
                    .as_ref()
                    .is_some_and(|r| r.token.expose_secret() == token)
        })
    }

    fn user_with_valid_token(&self, token: &str, valid_at: DateTime<Utc>) -> Option<i32> {
        self.users
            .iter()
            .find(|(_, u)| {
                u.reset.as_ref().is_some_and(|r| {
                    r.token.expose_secret() == token && r.expires_at >= valid_at
                })
            })
            .map(|(id, _)| *id)
    }
}

/// Data store holding everything in process memory.
///
/// Used by tests and for running the server without a database.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.tables.lock().await.users.get(&id.as_i32()).cloned())
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| &u.email == email).cloned())
    }

    async fn find_user_by_reset_token(
        &self,
        token: &str,
        valid_at: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .user_with_valid_token(token, valid_at)
            .and_then(|id| tables.users.get(&id).cloned()))
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self.tables.lock().await.users.values().cloned().collect())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let id = tables.next_id();
        let now = Utc::now();
        let created = User {
            id: UserId::new(id),
            email: user.email,
            name: user.name,
            permissions: user.permissions,
            password_hash: SecretString::from(user.password_hash),
            reset: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(id, created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: UserId, patch: UserPatch) -> Result<User, RepositoryError> {
        let mut tables = self.tables.lock().await;

        if let Some(Some(reset)) = &patch.reset
            && tables.reset_token_taken(reset.token.expose_secret(), id)
        {
            return Err(RepositoryError::Conflict(
                "reset token already exists".to_owned(),
            ));
        }

        let user = tables
            .users
            .get_mut(&id.as_i32())
            .ok_or(RepositoryError::NotFound)?;

        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(hash) = patch.password_hash {
            user.password_hash = SecretString::from(hash);
        }
        if let Some(permissions) = patch.permissions {
            user.permissions = permissions;
        }
        if let Some(reset) = patch.reset {
            user.reset = reset;
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        valid_at: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let Some(id) = tables.user_with_valid_token(token, valid_at) else {
            return Ok(None);
        };
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };

        user.password_hash = SecretString::from(password_hash.to_owned());
        user.reset = None;
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn find_item(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        Ok(self.tables.lock().await.items.get(&id.as_i32()).cloned())
    }

    async fn create_item(&self, owner: UserId, item: NewItem) -> Result<Item, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&owner.as_i32()) {
            return Err(RepositoryError::Conflict(format!("owner {owner} does not exist")));
        }

        let id = tables.next_id();
        let created = Item {
            id: ItemId::new(id),
            owner,
            title: item.title,
            description: item.description,
            price: item.price,
            image: item.image,
            large_image: item.large_image,
            created_at: Utc::now(),
        };
        tables.items.insert(id, created.clone());
        Ok(created)
    }

    async fn update_item(&self, id: ItemId, patch: ItemPatch) -> Result<Item, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let item = tables
            .items
            .get_mut(&id.as_i32())
            .ok_or(RepositoryError::NotFound)?;
        patch.apply(item);
        Ok(item.clone())
    }

    async fn delete_item(&self, id: ItemId) -> Result<Item, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let item = tables
            .items
            .remove(&id.as_i32())
            .ok_or(RepositoryError::NotFound)?;
        tables.cart.retain(|_, row| row.item_id != id);
        Ok(item)
    }

    async fn find_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError> {
        Ok(self.tables.lock().await.cart.get(&id.as_i32()).cloned())
    }

    async fn add_or_increment_cart_item(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<CartItem, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if !tables.items.contains_key(&item_id.as_i32()) {
            return Err(RepositoryError::NotFound);
        }

        if let Some(row) = tables
            .cart
            .values_mut()
            .find(|row| row.user_id == user_id && row.item_id == item_id)
        {
            row.quantity += 1;
            return Ok(row.clone());
        }

        let id = tables.next_id();
        let row = CartItem {
            id: CartItemId::new(id),
            user_id,
            item_id,
            quantity: 1,
        };
        tables.cart.insert(id, row.clone());
        Ok(row)
    }

    async fn delete_cart_item(&self, id: CartItemId) -> Result<CartItem, RepositoryError> {
        self.tables
            .lock()
            .await
            .cart
            .remove(&id.as_i32())
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_cart(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let tables = self.tables.lock().await;
        let lines = tables
            .cart
            .values()
            .filter(|row| row.user_id == user_id)
            .map(|row| {
                let item = tables.items.get(&row.item_id.as_i32()).cloned().ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "cart row {} points at missing item {}",
                        row.id, row.item_id
                    ))
                })?;
                Ok(CartLine {
                    id: row.id,
                    quantity: row.quantity,
                    item,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;
        Ok(Cart::new(lines))
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tables = self.tables.lock().await;

        let id = tables.next_id();
        let items = order
            .items
            .into_iter()
            .map(|item| OrderItem {
                id: OrderItemId::new(tables.next_id()),
                title: item.title,
                description: item.description,
                price: item.price,
                image: item.image,
                large_image: item.large_image,
                quantity: item.quantity,
            })
            .collect();

        let created = Order {
            id: OrderId::new(id),
            user_id: order.user_id,
            total: order.total,
            charge: order.charge,
            items,
            created_at: Utc::now(),
        };

        for consumed in &order.consumed {
            let key = consumed.id.as_i32();
            let Some(row) = tables.cart.get_mut(&key) else {
                continue;
            };
            if row.user_id != order.user_id {
                continue;
            }
            if row.quantity > consumed.quantity {
                row.quantity -= consumed.quantity;
            } else {
                tables.cart.remove(&key);
            }
        }
        tables.orders.insert(id, created.clone());
        Ok(created)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use sick_fits_core::{PermissionSet, Price};

    use super::*;
    use crate::models::{ConsumedCartItem, NewOrderItem, PendingReset};

    async fn seed_user(store: &MemoryStore, email: &str) -> User {
        store
            .create_user(NewUser {
                email: Email::parse(email).unwrap(),
                name: "Wes".to_owned(),
                password_hash: "hash".to_owned(),
                permissions: PermissionSet::default(),
            })
            .await
            .unwrap()
    }

    async fn seed_item(store: &MemoryStore, owner: UserId, cents: i64) -> Item {
        store
            .create_item(
                owner,
                NewItem {
                    title: "Hoodie".to_owned(),
                    description: "Warm".to_owned(),
                    price: Price::from_minor_units(cents).unwrap(),
                    image: None,
                    large_image: None,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_email_is_unique() {
        let store = MemoryStore::new();
        seed_user(&store, "a@example.com").await;
        let result = store
            .create_user(NewUser {
                email: Email::parse("A@example.com").unwrap(),
                name: "Other".to_owned(),
                password_hash: "hash".to_owned(),
                permissions: PermissionSet::default(),
            })
            .await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_add_twice_increments_single_row() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a@example.com").await;
        let item = seed_item(&store, user.id, 1000).await;

        let first = store.add_or_increment_cart_item(user.id, item.id).await.unwrap();
        let second = store.add_or_increment_cart_item(user.id, item.id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 2);
        assert_eq!(store.list_cart(user.id).await.unwrap().lines.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_lose_nothing() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "a@example.com").await;
        let item = seed_item(&store, user.id, 1000).await;

        let handles: Vec<_> = (0..25)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.add_or_increment_cart_item(user.id, item.id).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let cart = store.list_cart(user.id).await.unwrap();
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 25);
    }

    #[tokio::test]
    async fn test_delete_item_cascades_cart_rows() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a@example.com").await;
        let item = seed_item(&store, user.id, 1000).await;
        let row = store.add_or_increment_cart_item(user.id, item.id).await.unwrap();

        store.delete_item(item.id).await.unwrap();

        assert!(store.find_cart_item(row.id).await.unwrap().is_none());
        assert!(store.list_cart(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_consume_reset_token_only_once() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a@example.com").await;
        let now = Utc::now();
        store
            .update_user(
                user.id,
                UserPatch {
                    reset: Some(Some(PendingReset {
                        token: SecretString::from("abc".to_owned()),
                        expires_at: now + Duration::hours(1),
                    })),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap();

        let updated = store.consume_reset_token("abc", now, "new").await.unwrap().unwrap();
        assert!(updated.reset.is_none());
        assert_eq!(updated.password_hash.expose_secret(), "new");

        assert!(store.consume_reset_token("abc", now, "again").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_token_is_not_found() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a@example.com").await;
        let now = Utc::now();
        store
            .update_user(
                user.id,
                UserPatch {
                    reset: Some(Some(PendingReset {
                        token: SecretString::from("abc".to_owned()),
                        expires_at: now,
                    })),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap();

        assert!(store.find_user_by_reset_token("abc", now).await.unwrap().is_some());
        let later = now + Duration::seconds(1);
        assert!(store.find_user_by_reset_token("abc", later).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_order_clears_only_consumed_rows() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a@example.com").await;
        let item = seed_item(&store, user.id, 1000).await;
        let other = seed_item(&store, user.id, 500).await;
        store.add_or_increment_cart_item(user.id, item.id).await.unwrap();
        store.add_or_increment_cart_item(user.id, other.id).await.unwrap();

        let cart = store.list_cart(user.id).await.unwrap();
        let order = store
            .create_order(NewOrder {
                user_id: user.id,
                total: cart.lines[0].line_total(),
                charge: "ch_1".to_owned(),
                items: vec![NewOrderItem::from(&cart.lines[0])],
                consumed: vec![ConsumedCartItem::from(&cart.lines[0])],
            })
            .await
            .unwrap();

        assert_eq!(order.items.len(), 1);
        let remaining = store.list_cart(user.id).await.unwrap();
        assert_eq!(remaining.lines.len(), 1);
        assert_eq!(remaining.lines[0].item.id, other.id);
    }

    #[tokio::test]
    async fn test_create_order_keeps_units_added_after_pricing() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a@example.com").await;
        let item = seed_item(&store, user.id, 1000).await;
        store.add_or_increment_cart_item(user.id, item.id).await.unwrap();

        let cart = store.list_cart(user.id).await.unwrap();
        let row = store.add_or_increment_cart_item(user.id, item.id).await.unwrap();
        assert_eq!(row.quantity, 2);

        store
            .create_order(NewOrder {
                user_id: user.id,
                total: cart.total(),
                charge: "ch_1".to_owned(),
                items: cart.lines.iter().map(NewOrderItem::from).collect(),
                consumed: cart.lines.iter().map(ConsumedCartItem::from).collect(),
            })
            .await
            .unwrap();

        let remaining = store.find_cart_item(row.id).await.unwrap().unwrap();
        assert_eq!(remaining.quantity, 1);
    }
}
