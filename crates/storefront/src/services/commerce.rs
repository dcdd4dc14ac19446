//! Item, cart, and checkout operations.
//!
//! Every operation is all-or-nothing from the caller's point of view. Cart
//! increments and order creation are delegated to single atomic store
//! operations.

use thiserror::Error;

use sick_fits_core::{CartItemId, CurrencyCode, ItemId, Permission};

use crate::db::{DataStore, RepositoryError};
use crate::models::{
    CartItem, ConsumedCartItem, Item, ItemPatch, Me, NewItem, NewOrder, NewOrderItem, Order,
};
use crate::services::context::{AuthContext, Unauthenticated};
use crate::services::payments::{PaymentError, PaymentGateway};
use crate::services::permissions::{Forbidden, holds_any};

/// Errors from commerce operations.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Caller is not signed in.
    #[error(transparent)]
    Unauthenticated(#[from] Unauthenticated),

    /// Caller may not touch this resource.
    #[error("{0}")]
    Forbidden(String),

    #[error("item not found")]
    ItemNotFound,

    #[error("cart item not found")]
    CartItemNotFound,

    /// Checkout with nothing in the cart.
    #[error("your cart is empty")]
    EmptyCart,

    /// Amount can't be represented for charging.
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    /// Gateway refused or failed the charge.
    #[error("payment failed: {0}")]
    Payment(#[from] PaymentError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<Forbidden> for CommerceError {
    fn from(e: Forbidden) -> Self {
        Self::Forbidden(e.to_string())
    }
}

/// Commerce service.
pub struct CommerceService<'a> {
    store: &'a dyn DataStore,
    payments: &'a dyn PaymentGateway,
    currency: CurrencyCode,
}

impl<'a> CommerceService<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn DataStore,
        payments: &'a dyn PaymentGateway,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            store,
            payments,
            currency,
        }
    }

    /// The caller and their cart, or `None` when anonymous.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` if the store fails.
    pub async fn me(&self, ctx: &AuthContext) -> Result<Option<Me>, CommerceError> {
        let Some(user) = ctx.user() else {
            return Ok(None);
        };
        let cart = self.store.list_cart(user.id).await?;
        Ok(Some(Me {
            user: user.clone(),
            cart: cart.lines,
        }))
    }

    /// Create an item owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Unauthenticated` for anonymous callers.
    #[tracing::instrument(skip(self, ctx, item), fields(title = %item.title))]
    pub async fn create_item(&self, ctx: &AuthContext, item: NewItem) -> Result<Item, CommerceError> {
        let user = ctx.require_user()?;
        let item = self.store.create_item(user.id, item).await?;
        tracing::info!(item_id = %item.id, owner = %user.id, "item created");
        Ok(item)
    }

    /// Apply field updates to an item. No ownership check is made here.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::ItemNotFound` if the item doesn't exist.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_item(&self, id: ItemId, patch: ItemPatch) -> Result<Item, CommerceError> {
        self.store.update_item(id, patch).await.map_err(|e| match e {
            RepositoryError::NotFound => CommerceError::ItemNotFound,
            other => CommerceError::Repository(other),
        })
    }

    /// Delete an item. Only an owner who also holds `ITEMDELETE` may do so.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Unauthenticated` for anonymous callers.
    /// Returns `CommerceError::ItemNotFound` if the item doesn't exist.
    /// Returns `CommerceError::Forbidden` unless the caller both owns the item
    /// and holds `ITEMDELETE`.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn delete_item(&self, ctx: &AuthContext, id: ItemId) -> Result<Item, CommerceError> {
        let user = ctx.require_user()?;
        let item = self
            .store
            .find_item(id)
            .await?
            .ok_or(CommerceError::ItemNotFound)?;

        let owns_item = item.owner == user.id;
        let can_delete = holds_any(user, &[Permission::ItemDelete]);
        if !owns_item || !can_delete {
            tracing::warn!(user_id = %user.id, item_id = %id, owns_item, can_delete, "delete refused");
            return Err(CommerceError::Forbidden(
                "you don't have permission to do that".to_owned(),
            ));
        }

        let deleted = self.store.delete_item(id).await.map_err(|e| match e {
            RepositoryError::NotFound => CommerceError::ItemNotFound,
            other => CommerceError::Repository(other),
        })?;
        tracing::info!(item_id = %id, "item deleted");
        Ok(deleted)
    }

    /// Add one unit of an item to the caller's cart.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Unauthenticated` for anonymous callers.
    /// Returns `CommerceError::ItemNotFound` if the item doesn't exist.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn add_to_cart(
        &self,
        ctx: &AuthContext,
        item_id: ItemId,
    ) -> Result<CartItem, CommerceError> {
        let user = ctx.require_user()?;
        if self.store.find_item(item_id).await?.is_none() {
            return Err(CommerceError::ItemNotFound);
        }

        let row = self
            .store
            .add_or_increment_cart_item(user.id, item_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CommerceError::ItemNotFound,
                other => CommerceError::Repository(other),
            })?;
        tracing::debug!(cart_item_id = %row.id, quantity = row.quantity, "cart updated");
        Ok(row)
    }

    /// Remove a row from the caller's cart and return it.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Unauthenticated` for anonymous callers.
    /// Returns `CommerceError::CartItemNotFound` if the row doesn't exist.
    /// Returns `CommerceError::Forbidden` if the row belongs to someone else.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn remove_from_cart(
        &self,
        ctx: &AuthContext,
        id: CartItemId,
    ) -> Result<CartItem, CommerceError> {
        let user = ctx.require_user()?;
        let row = self
            .store
            .find_cart_item(id)
            .await?
            .ok_or(CommerceError::CartItemNotFound)?;

        if row.user_id != user.id {
            tracing::warn!(user_id = %user.id, cart_item_id = %id, "cart removal refused");
            return Err(CommerceError::Forbidden(
                "that cart item is not yours".to_owned(),
            ));
        }

        self.store.delete_cart_item(id).await.map_err(|e| match e {
            RepositoryError::NotFound => CommerceError::CartItemNotFound,
            other => CommerceError::Repository(other),
        })
    }

    /// Charge the caller's cart and turn it into an order.
    ///
    /// The gateway is charged first; the order and the cart clearing are then
    /// written in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Unauthenticated` for anonymous callers.
    /// Returns `CommerceError::EmptyCart` if there is nothing to buy.
    /// Returns `CommerceError::InvalidPrice` if the total is zero; the gateway
    /// is not called.
    /// Returns `CommerceError::Payment` if the charge fails; nothing is
    /// written in that case.
    #[tracing::instrument(skip(self, ctx, charge_token))]
    pub async fn create_order(
        &self,
        ctx: &AuthContext,
        charge_token: &str,
    ) -> Result<Order, CommerceError> {
        let user = ctx.require_user()?;
        let cart = self.store.list_cart(user.id).await?;
        if cart.is_empty() {
            return Err(CommerceError::EmptyCart);
        }

        let total = cart.total();
        let amount = total
            .minor_units()
            .filter(|cents| *cents > 0)
            .ok_or_else(|| {
                CommerceError::InvalidPrice(format!("cannot charge a total of {total}"))
            })?;

        let charge = self
            .payments
            .charge(amount, self.currency, charge_token)
            .await?;

        let order = NewOrder {
            user_id: user.id,
            total,
            charge: charge.id.clone(),
            items: cart.lines.iter().map(NewOrderItem::from).collect(),
            consumed: cart.lines.iter().map(ConsumedCartItem::from).collect(),
        };

        let order = self.store.create_order(order).await.inspect_err(|e| {
            tracing::error!(charge_id = %charge.id, error = %e, "charge succeeded but order was not saved");
        })?;

        tracing::info!(order_id = %order.id, charge_id = %order.charge, %total, "order created");
        Ok(order)
    }
}
