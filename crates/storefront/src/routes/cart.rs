//! Cart route handlers.

use axum::{Json, extract::State};

use sick_fits_core::{CartItemId, ItemId};

use super::ApiPath;
use crate::error::Result;
use crate::middleware::Auth;
use crate::models::CartItem;
use crate::state::AppState;

/// POST /api/cart/items/{item_id}
///
/// Adds one unit; a second add for the same item bumps the quantity.
pub async fn add(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ApiPath(item_id): ApiPath<ItemId>,
) -> Result<Json<CartItem>> {
    Ok(Json(state.commerce().add_to_cart(&ctx, item_id).await?))
}

/// DELETE /api/cart/{cart_item_id}
///
/// Returns the removed row so clients can drop it from their cached cart.
pub async fn remove(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ApiPath(id): ApiPath<CartItemId>,
) -> Result<Json<CartItem>> {
    Ok(Json(state.commerce().remove_from_cart(&ctx, id).await?))
}
