//! Account read side and permission management.

use axum::{Json, extract::State};
use serde::Deserialize;

use sick_fits_core::{PermissionSet, UserId};

use super::{ApiJson, ApiPath};
use crate::error::Result;
use crate::middleware::{Auth, RequireAuth};
use crate::models::{Me, User};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdatePermissionsRequest {
    pub permissions: PermissionSet,
}

/// GET /api/me
///
/// `null` for anonymous callers.
pub async fn me(State(state): State<AppState>, Auth(ctx): Auth) -> Result<Json<Option<Me>>> {
    Ok(Json(state.commerce().me(&ctx).await?))
}

/// GET /api/users
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<User>>> {
    Ok(Json(state.auth().list_users(&user).await?))
}

/// PUT /api/users/{id}/permissions
pub async fn update_permissions(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(req): ApiJson<UpdatePermissionsRequest>,
) -> Result<Json<User>> {
    let updated = state
        .auth()
        .update_permissions(&user, id, req.permissions)
        .await?;
    Ok(Json(updated))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{Value, json};

    use sick_fits_core::{Permission, PermissionSet};

    use super::super::tests::{TestApp, body_json, empty_request, json_request};

    #[tokio::test]
    async fn test_me_is_null_when_anonymous() {
        let app = TestApp::new();
        let response = app.send(empty_request(Method::GET, "/api/me", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, Value::Null);
    }

    #[tokio::test]
    async fn test_tampered_cookie_is_anonymous() {
        let app = TestApp::new();
        let (_, cookie) = app.signup("wes@example.com").await;
        let tampered = format!("{cookie}00");

        let response = app
            .send(empty_request(Method::GET, "/api/me", Some(&tampered)))
            .await;
        assert_eq!(body_json(response).await, Value::Null);
    }

    #[tokio::test]
    async fn test_users_requires_auth_then_gate() {
        let app = TestApp::new();
        let response = app.send(empty_request(Method::GET, "/api/users", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let (id, cookie) = app.signup("wes@example.com").await;
        let response = app
            .send(empty_request(Method::GET, "/api/users", Some(&cookie)))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        app.grant(id, PermissionSet::new([Permission::Admin])).await;
        let response = app
            .send(empty_request(Method::GET, "/api/users", Some(&cookie)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_permissions() {
        let app = TestApp::new();
        let (admin, cookie) = app.signup("admin@example.com").await;
        let (target, _) = app.signup("target@example.com").await;
        app.grant(admin, PermissionSet::new([Permission::PermissionUpdate]))
            .await;

        let uri = format!("/api/users/{target}/permissions");
        let response = app
            .send(json_request(
                Method::PUT,
                &uri,
                Some(&cookie),
                &json!({"permissions": ["ITEMCREATE"]}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["permissions"],
            json!(["USER", "ITEMCREATE"])
        );

        let response = app
            .send(json_request(
                Method::PUT,
                &uri,
                Some(&cookie),
                &json!({"permissions": ["SUPERUSER"]}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
