//! Account lifecycle through the HTTP API: signup, signin, signout,
//! password reset, and permission management.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use chrono::Duration;
use serde_json::{Value, json};

use sick_fits_core::{Permission, PermissionSet};
use sick_fits_integration_tests::{PASSWORD, TestApp, request, session_cookie};

fn reset_body(token: &str, password: &str) -> Value {
    json!({"password": password, "confirmPassword": password, "resetToken": token})
}

#[tokio::test]
async fn test_signup_signin_signout() {
    let app = TestApp::new();
    let (_, cookie) = app.signup("Wes@Example.com").await;

    let (status, me) = app.call(Method::GET, "/api/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "wes@example.com");
    assert_eq!(me["permissions"], json!(["USER"]));

    let response = app
        .send(request(Method::POST, "/api/auth/signout", Some(&cookie), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(session_cookie(&response).unwrap(), "token=");

    let response = app
        .send(request(
            Method::POST,
            "/api/auth/signin",
            None,
            Some(json!({"email": "WES@example.com", "password": PASSWORD})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).unwrap().starts_with("token="));
}

#[tokio::test]
async fn test_signin_does_not_reveal_which_part_failed() {
    let app = TestApp::new();
    app.signup("wes@example.com").await;

    let (wrong_password, body_a) = app
        .call(
            Method::POST,
            "/api/auth/signin",
            None,
            Some(json!({"email": "wes@example.com", "password": "nope-nope-nope"})),
        )
        .await;
    let (no_user, body_b) = app
        .call(
            Method::POST,
            "/api/auth/signin",
            None,
            Some(json!({"email": "nobody@example.com", "password": PASSWORD})),
        )
        .await;

    assert_eq!(wrong_password, StatusCode::UNAUTHORIZED);
    assert_eq!(no_user, StatusCode::UNAUTHORIZED);
    assert_eq!(body_a, body_b);
}

#[tokio::test]
async fn test_gated_routes_need_a_cookie() {
    let app = TestApp::new();
    for (method, uri) in [
        (Method::GET, "/api/users"),
        (Method::PATCH, "/api/items/1"),
        (Method::POST, "/api/cart/items/1"),
        (Method::DELETE, "/api/cart/1"),
        (Method::DELETE, "/api/items/1"),
    ] {
        let body = (method == Method::PATCH).then(|| json!({"title": "x"}));
        let (status, error) = app.call(method.clone(), uri, None, body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(error["error"], "you must be signed in to do that");
    }
}

#[tokio::test]
async fn test_reset_token_honored_through_the_full_hour() {
    let app = TestApp::new();
    app.signup("wes@example.com").await;

    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/request-reset",
            None,
            Some(json!({"email": "wes@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = app.last_reset_token();
    assert_eq!(token.len(), 40);

    app.clock.advance(Duration::hours(1));
    let (status, user) = app
        .call(
            Method::POST,
            "/api/auth/reset-password",
            None,
            Some(reset_body(&token, "a-whole-new-password")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["email"], "wes@example.com");

    // The new password works and the old one doesn't.
    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/signin",
            None,
            Some(json!({"email": "wes@example.com", "password": "a-whole-new-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/signin",
            None,
            Some(json!({"email": "wes@example.com", "password": PASSWORD})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_reset_token_expires_after_an_hour() {
    let app = TestApp::new();
    app.signup("wes@example.com").await;
    app.call(
        Method::POST,
        "/api/auth/request-reset",
        None,
        Some(json!({"email": "wes@example.com"})),
    )
    .await;
    let token = app.last_reset_token();

    app.clock.advance(Duration::hours(1) + Duration::seconds(1));
    let response = app
        .send(request(
            Method::POST,
            "/api/auth/reset-password",
            None,
            Some(reset_body(&token, "a-whole-new-password")),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(session_cookie(&response).is_none());
}

#[tokio::test]
async fn test_new_reset_request_replaces_old_token() {
    let app = TestApp::new();
    app.signup("wes@example.com").await;
    let body = Some(json!({"email": "wes@example.com"}));

    app.call(Method::POST, "/api/auth/request-reset", None, body.clone())
        .await;
    let first = app.last_reset_token();
    app.call(Method::POST, "/api/auth/request-reset", None, body)
        .await;
    let second = app.last_reset_token();
    assert_ne!(first, second);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/reset-password",
            None,
            Some(reset_body(&first, "a-whole-new-password")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/reset-password",
            None,
            Some(reset_body(&second, "a-whole-new-password")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_mismatched_passwords_rejected() {
    let app = TestApp::new();
    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/reset-password",
            None,
            Some(json!({
                "password": "one-password",
                "confirmPassword": "another-password",
                "resetToken": "whatever",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "your passwords don't match");
}

#[tokio::test]
async fn test_permission_management_keeps_user() {
    let app = TestApp::new();
    let (admin, admin_cookie) = app.signup("admin@example.com").await;
    let (target, target_cookie) = app.signup("target@example.com").await;
    let uri = format!("/api/users/{target}/permissions");
    let body = Some(json!({"permissions": ["ITEMDELETE"]}));

    let (status, _) = app
        .call(Method::PUT, &uri, Some(&target_cookie), body.clone())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    app.grant(admin, PermissionSet::new([Permission::Admin])).await;
    let (status, user) = app.call(Method::PUT, &uri, Some(&admin_cookie), body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["permissions"], json!(["USER", "ITEMDELETE"]));

    let (status, users) = app
        .call(Method::GET, "/api/users", Some(&admin_cookie), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_session_for_unknown_user_is_anonymous() {
    let app = TestApp::new();
    let (_, cookie) = app.signup("wes@example.com").await;

    // A session for a user id that never existed.
    let other = TestApp::new();
    other.signup("a@example.com").await;
    let (_, foreign) = other.signup("b@example.com").await;

    let (_, me) = app.call(Method::GET, "/api/me", Some(&foreign), None).await;
    assert_eq!(me, Value::Null);

    let (_, me) = app.call(Method::GET, "/api/me", Some(&cookie), None).await;
    assert_eq!(me["email"], "wes@example.com");
}
