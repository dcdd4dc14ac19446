//! Checkout route handler.

use axum::{Json, extract::State};
use serde::Deserialize;

use super::ApiJson;
use crate::error::Result;
use crate::middleware::Auth;
use crate::models::Order;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Client-side card token from the payment provider.
    pub token: String,
}

/// POST /api/orders
pub async fn create(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> Result<Json<Order>> {
    Ok(Json(state.commerce().create_order(&ctx, &req.token).await?))
}
