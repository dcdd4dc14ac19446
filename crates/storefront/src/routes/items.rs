//! Item route handlers.

use axum::{Json, extract::State};

use sick_fits_core::ItemId;

use super::{ApiJson, ApiPath};
use crate::error::Result;
use crate::middleware::{Auth, RequireAuth};
use crate::models::{Item, ItemPatch, NewItem};
use crate::state::AppState;

/// POST /api/items
pub async fn create(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ApiJson(item): ApiJson<NewItem>,
) -> Result<Json<Item>> {
    Ok(Json(state.commerce().create_item(&ctx, item).await?))
}

/// PATCH /api/items/{id}
///
/// Any signed-in user may update any item.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    ApiPath(id): ApiPath<ItemId>,
    ApiJson(patch): ApiJson<ItemPatch>,
) -> Result<Json<Item>> {
    Ok(Json(state.commerce().update_item(id, patch).await?))
}

/// DELETE /api/items/{id}
pub async fn delete(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ApiPath(id): ApiPath<ItemId>,
) -> Result<Json<Item>> {
    Ok(Json(state.commerce().delete_item(&ctx, id).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{Value, json};

    use sick_fits_core::{Permission, PermissionSet};

    use super::super::tests::{TestApp, body_json, empty_request, json_request};

    fn shirt() -> Value {
        json!({"title": "Shirt", "description": "Plain tee", "price": "25.00"})
    }

    #[tokio::test]
    async fn test_create_binds_owner_to_caller() {
        let app = TestApp::new();
        let response = app
            .send(json_request(Method::POST, "/api/items", None, &shirt()))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let (id, cookie) = app.signup("wes@example.com").await;
        let response = app
            .send(json_request(Method::POST, "/api/items", Some(&cookie), &shirt()))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["title"], "Shirt");
        assert_eq!(body["userId"], id.as_i32());
    }

    #[tokio::test]
    async fn test_delete_needs_owner_with_item_delete() {
        let app = TestApp::new();
        let (_, owner_cookie) = app.signup("owner@example.com").await;
        let (other, other_cookie) = app.signup("other@example.com").await;
        app.grant(other, PermissionSet::new([Permission::ItemDelete])).await;

        let created = body_json(
            app.send(json_request(Method::POST, "/api/items", Some(&owner_cookie), &shirt()))
                .await,
        )
        .await;
        let uri = format!("/api/items/{}", created["id"]);

        for cookie in [&owner_cookie, &other_cookie] {
            let response = app
                .send(empty_request(Method::DELETE, &uri, Some(cookie)))
                .await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let app = TestApp::new();
        let (owner, cookie) = app.signup("wes@example.com").await;
        app.grant(owner, PermissionSet::new([Permission::ItemDelete])).await;

        let created = body_json(
            app.send(json_request(Method::POST, "/api/items", Some(&cookie), &shirt()))
                .await,
        )
        .await;
        let uri = format!("/api/items/{}", created["id"]);

        let response = app
            .send(json_request(
                Method::PATCH,
                &uri,
                Some(&cookie),
                &json!({"price": "30.00"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["price"], "30.00");

        let response = app
            .send(empty_request(Method::DELETE, &uri, Some(&cookie)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .send(empty_request(Method::DELETE, &uri, Some(&cookie)))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_requires_sign_in() {
        let app = TestApp::new();
        let response = app
            .send(json_request(
                Method::PATCH,
                "/api/items/1",
                None,
                &json!({"title": "Hat"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_negative_price_rejected() {
        let app = TestApp::new();
        let (_, cookie) = app.signup("wes@example.com").await;

        let response = app
            .send(json_request(
                Method::POST,
                "/api/items",
                Some(&cookie),
                &json!({"title": "Shirt", "description": "Plain tee", "price": "-1.00"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
