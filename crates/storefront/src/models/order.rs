//! Order domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use sick_fits_core::{CartItemId, OrderId, OrderItemId, Price, UserId};

use super::cart::CartLine;

/// A completed, charged order. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total: Price,
    /// Charge identifier returned by the payment gateway.
    pub charge: String,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of an item at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub title: String,
    pub description: String,
    pub price: Price,
    pub image: Option<String>,
    pub large_image: Option<String>,
    pub quantity: u32,
}

/// Data needed to persist an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total: Price,
    pub charge: String,
    pub items: Vec<NewOrderItem>,
    /// Cart quantities paid for by this order. They are taken out of the
    /// cart with the insert.
    pub consumed: Vec<ConsumedCartItem>,
}

/// A cart row and the quantity of it that was charged.
///
/// Units added to the row after the cart was priced stay in the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumedCartItem {
    pub id: CartItemId,
    pub quantity: u32,
}

impl From<&CartLine> for ConsumedCartItem {
    fn from(line: &CartLine) -> Self {
        Self {
            id: line.id,
            quantity: line.quantity,
        }
    }
}

/// An order line before it has an ID.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub title: String,
    pub description: String,
    pub price: Price,
    pub image: Option<String>,
    pub large_image: Option<String>,
    pub quantity: u32,
}

impl From<&CartLine> for NewOrderItem {
    fn from(line: &CartLine) -> Self {
        Self {
            title: line.item.title.clone(),
            description: line.item.description.clone(),
            price: line.item.price,
            image: line.item.image.clone(),
            large_image: line.item.large_image.clone(),
            quantity: line.quantity,
        }
    }
}
