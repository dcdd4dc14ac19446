//! Authentication route handlers.
//!
//! Successful signup, signin, and password reset set the `token` session
//! cookie; signout clears it. Failures never touch the cookie.

use axum::{Json, extract::State, http::HeaderName, response::IntoResponse};
use serde::Deserialize;

use super::{ApiJson, MessageResponse};
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_session_cookie, set_session_cookie};
use crate::models::User;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RequestResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub password: String,
    pub confirm_password: String,
    pub reset_token: String,
}

/// A user body plus the `Set-Cookie` header for their new session.
pub type SignedIn = ([(HeaderName, String); 1], Json<User>);

/// Respond with `user` and a fresh session cookie for them.
fn signed_in(state: &AppState, user: User) -> SignedIn {
    set_sentry_user(&user.id, Some(user.email.as_str()));
    let cookie = set_session_cookie(state.tokens().issue(user.id), state.secure_cookies());
    (cookie, Json(user))
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<SignedIn> {
    let user = state
        .auth()
        .signup(&req.email, &req.name, &req.password)
        .await?;
    Ok(signed_in(&state, user))
}

/// POST /api/auth/signin
pub async fn signin(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SigninRequest>,
) -> Result<SignedIn> {
    let user = state.auth().signin(&req.email, &req.password).await?;
    Ok(signed_in(&state, user))
}

/// POST /api/auth/signout
///
/// Always succeeds, signed in or not.
pub async fn signout(State(state): State<AppState>) -> impl IntoResponse {
    clear_sentry_user();
    (
        clear_session_cookie(state.secure_cookies()),
        Json(MessageResponse { message: "Goodbye" }),
    )
}

/// POST /api/auth/request-reset
pub async fn request_reset(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RequestResetRequest>,
) -> Result<Json<MessageResponse>> {
    state.auth().request_reset(&req.email).await?;
    Ok(Json(MessageResponse { message: "Thanks" }))
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> Result<SignedIn> {
    let user = state
        .auth()
        .reset_password(&req.password, &req.confirm_password, &req.reset_token)
        .await?;
    Ok(signed_in(&state, user))
}
