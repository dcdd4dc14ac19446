//! HTTP routes for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                        - Liveness
//! GET    /health/ready                  - Readiness (store reachable)
//!
//! # Auth (strict rate limit)
//! POST   /api/auth/signup               - Create account, set session cookie
//! POST   /api/auth/signin               - Sign in, set session cookie
//! POST   /api/auth/signout              - Clear session cookie
//! POST   /api/auth/request-reset        - Mail a password reset link
//! POST   /api/auth/reset-password       - Redeem a reset token, set session cookie
//!
//! # Users
//! GET    /api/me                        - Caller and cart, or null
//! GET    /api/users                     - All users (ADMIN or PERMISSIONUPDATE)
//! PUT    /api/users/{id}/permissions    - Replace a user's permissions
//!
//! # Items
//! POST   /api/items                     - Create item owned by the caller
//! PATCH  /api/items/{id}                - Update item
//! DELETE /api/items/{id}                - Delete item (owner with ITEMDELETE)
//!
//! # Cart and checkout
//! POST   /api/cart/items/{itemId}       - Add one of an item
//! DELETE /api/cart/{cartItemId}         - Remove a cart row
//! POST   /api/orders                    - Charge the cart and create an order
//! ```

pub mod auth;
pub mod cart;
pub mod items;
pub mod orders;
pub mod users;

use axum::{
    Router,
    extract::{FromRequest, FromRequestParts, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    routing::{delete, get, patch, post, put},
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::AppError;
use crate::middleware::{
    rate_limit::RateLimiterLayer, request_id_middleware, security_headers_middleware,
};
use crate::state::AppState;

/// JSON body extractor whose rejection is an [`AppError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path extractor whose rejection is an [`AppError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// `{"message": ...}` acknowledgement body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Rate limiters applied per route group.
pub struct RateLimits {
    pub auth: RateLimiterLayer,
    pub api: RateLimiterLayer,
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/signin", post(auth::signin))
        .route("/signout", post(auth::signout))
        .route("/request-reset", post(auth::request_reset))
        .route("/reset-password", post(auth::reset_password))
}

/// Create the non-auth API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(users::me))
        .route("/users", get(users::list))
        .route("/users/{id}/permissions", put(users::update_permissions))
        .route("/items", post(items::create))
        .route("/items/{id}", patch(items::update).delete(items::delete))
        .route("/cart/items/{item_id}", post(cart::add))
        .route("/cart/{cart_item_id}", delete(cart::remove))
        .route("/orders", post(orders::create))
}

/// Build the full application router.
///
/// `limits` is `None` in tests, where every request comes from one address.
pub fn router(state: AppState, limits: Option<RateLimits>) -> Router {
    let (auth, api) = match limits {
        Some(limits) => (
            auth_routes().layer(limits.auth),
            api_routes().layer(limits.api),
        ),
        None => (auth_routes(), api_routes()),
    };

    let cors = cors_layer(&state);

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/auth", auth)
        .nest("/api", api)
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &axum::extract::Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
}

/// CORS for the frontend origin, with credentials so the session cookie
/// travels.
fn cors_layer(state: &AppState) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true);

    let origin = state.frontend_url().origin().ascii_serialization();
    match origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!(%origin, "frontend origin is not a valid header value; CORS disabled");
            cors
        }
    }
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the data store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
