//! Order repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use sick_fits_core::{OrderId, OrderItemId};

use super::{RepositoryError, quantity_to_db};
use crate::models::{NewOrder, Order, OrderItem};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    created_at: DateTime<Utc>,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order with its item snapshots and take the charged
    /// quantities out of the cart, all in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is
    /// written in that case.
    pub async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            INSERT INTO storefront."order" (user_id, total, charge)
            VALUES ($1, $2, $3)
            RETURNING id, created_at
            "#,
        )
        .bind(order.user_id)
        .bind(order.total)
        .bind(&order.charge)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let id: OrderItemId = sqlx::query_scalar(
                r"
                INSERT INTO storefront.order_item
                    (order_id, title, description, price, image, large_image, quantity)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                ",
            )
            .bind(row.id)
            .bind(&item.title)
            .bind(&item.description)
            .bind(item.price)
            .bind(item.image.as_deref())
            .bind(item.large_image.as_deref())
            .bind(quantity_to_db(item.quantity)?)
            .fetch_one(&mut *tx)
            .await?;

            items.push(OrderItem {
                id,
                title: item.title.clone(),
                description: item.description.clone(),
                price: item.price,
                image: item.image.clone(),
                large_image: item.large_image.clone(),
                quantity: item.quantity,
            });
        }

        // Only the charged quantity leaves the cart; units added since the
        // cart was priced stay behind.
        for consumed in &order.consumed {
            let quantity = quantity_to_db(consumed.quantity)?;
            sqlx::query(
                r"
                DELETE FROM storefront.cart_item
                WHERE id = $1 AND user_id = $2 AND quantity <= $3
                ",
            )
            .bind(consumed.id)
            .bind(order.user_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r"
                UPDATE storefront.cart_item
                SET quantity = quantity - $3
                WHERE id = $1 AND user_id = $2 AND quantity > $3
                ",
            )
            .bind(consumed.id)
            .bind(order.user_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Order {
            id: row.id,
            user_id: order.user_id,
            total: order.total,
            charge: order.charge.clone(),
            items,
            created_at: row.created_at,
        })
    }
}
