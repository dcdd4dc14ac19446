//! End-to-end tests for the Sick Fits storefront.
//!
//! Tests drive the full router (extractors, middleware, error mapping)
//! against in-memory collaborators: [`MemoryStore`], [`RecordingMailer`],
//! [`FakePaymentGateway`], and a [`FixedClock`]. No database is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p sick-fits-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use chrono::{DateTime, TimeZone, Utc};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

use sick_fits_core::{CurrencyCode, PermissionSet, UserId};
use sick_fits_storefront::config::PasswordHashConfig;
use sick_fits_storefront::db::{DataStore, MemoryStore};
use sick_fits_storefront::models::UserPatch;
use sick_fits_storefront::routes;
use sick_fits_storefront::services::{
    FakePaymentGateway, FixedClock, PasswordHasher, RecordingMailer, SessionTokens,
};
use sick_fits_storefront::state::{AppServices, AppState};

/// Password every helper-created account uses.
pub const PASSWORD: &str = "correct horse battery";

/// Instant the test clock starts at.
#[must_use]
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// A storefront wired to in-memory collaborators.
pub struct TestApp {
    router: Router,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub payments: Arc<FakePaymentGateway>,
    pub clock: Arc<FixedClock>,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let payments = Arc::new(FakePaymentGateway::new());
        let clock = Arc::new(FixedClock::new(start_time()));

        // Minimum argon2 cost; these tests exercise flows, not hashing strength.
        let hasher = PasswordHasher::new(&PasswordHashConfig {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();

        let state = AppState::from_services(AppServices {
            frontend_url: Url::parse("http://localhost:7777").unwrap(),
            secure_cookies: false,
            currency: CurrencyCode::USD,
            store: store.clone(),
            mailer: mailer.clone(),
            payments: payments.clone(),
            tokens: SessionTokens::new(&SecretString::from(
                "integration-test-secret-9f8e7d6c5b4a",
            ))
            .unwrap(),
            hasher,
            clock: clock.clone(),
        });

        Self {
            router: routes::router(state, None),
            store,
            mailer,
            payments,
            clock,
        }
    }

    /// Send one request through the router.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Send a request and decode its JSON body.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.send(request(method, uri, cookie, body)).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    /// Sign up `email` and return the new user's id and session cookie.
    pub async fn signup(&self, email: &str) -> (UserId, String) {
        let response = self
            .send(request(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({"email": email, "name": "Test", "password": PASSWORD})),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK, "signup failed for {email}");
        let cookie = session_cookie(&response).unwrap();
        let body = body_json(response).await;
        let id = i32::try_from(body["id"].as_i64().unwrap()).unwrap();
        (UserId::new(id), cookie)
    }

    /// Replace a user's permissions directly in the store.
    pub async fn grant(&self, id: UserId, permissions: PermissionSet) {
        self.store
            .update_user(
                id,
                UserPatch {
                    permissions: Some(permissions),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap();
    }

    /// Create an item as the holder of `cookie` and return its id.
    pub async fn create_item(&self, cookie: &str, title: &str, price: &str) -> i64 {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/items",
                Some(cookie),
                Some(json!({"title": title, "description": "A thing", "price": price})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create item failed: {body}");
        body["id"].as_i64().unwrap()
    }

    /// The reset token from the most recent email.
    #[must_use]
    pub fn last_reset_token(&self) -> String {
        let mail = self.mailer.last().unwrap();
        let (_, rest) = mail.text.split_once("resetToken=").unwrap();
        rest.chars().take_while(char::is_ascii_hexdigit).collect()
    }
}

/// Build a request, with a JSON body when given.
#[must_use]
pub fn request(method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// `token=...` from the response's `Set-Cookie`, if any.
#[must_use]
pub fn session_cookie(response: &Response) -> Option<String> {
    let value = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    value.split(';').next().map(str::to_owned)
}

/// Decode a JSON body; an empty body decodes to `null`.
pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}
