//! Authentication extractors and session cookie helpers.
//!
//! The session lives entirely in the HTTP-only `token` cookie. Each request
//! verifies the cookie and loads the user it names.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderName, header, request::Parts},
};
use cookie::{Cookie, SameSite, time::Duration};

use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::services::auth::AuthError;
use crate::services::context::{AuthContext, Unauthenticated};
use crate::state::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "token";

/// Session cookie lifetime.
const SESSION_MAX_AGE: Duration = Duration::days(365);

/// Extractor for the caller's authorization context.
///
/// Never rejects an anonymous caller; only a store failure rejects.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(Auth(ctx): Auth) -> impl IntoResponse {
///     match ctx.user() {
///         Some(user) => format!("Hello, {}!", user.name),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
pub struct Auth(pub AuthContext);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers);
        let ctx = AuthContext::resolve(token.as_deref(), state.tokens(), state.store()).await?;

        if let Some(user) = ctx.user() {
            set_sentry_user(&user.id, Some(user.email.as_str()));
        }

        Ok(Self(ctx))
    }
}

/// Extractor that requires a signed-in user.
///
/// Rejects with 401 and a JSON error body otherwise.
pub struct RequireAuth(pub User);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Auth(ctx) = Auth::from_request_parts(parts, state).await?;
        ctx.into_user()
            .map(Self)
            .ok_or_else(|| AuthError::Unauthenticated(Unauthenticated).into())
    }
}

/// Read the session token from the request's `Cookie` headers.
#[must_use]
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == SESSION_COOKIE && !c.value().is_empty())
        .map(|c| c.value().to_owned())
}

fn base_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .build()
}

/// `Set-Cookie` header that stores `token` for a year.
#[must_use]
pub fn set_session_cookie(token: String, secure: bool) -> [(HeaderName, String); 1] {
    let mut cookie = base_cookie(token, secure);
    cookie.set_max_age(SESSION_MAX_AGE);
    [(header::SET_COOKIE, cookie.to_string())]
}

/// `Set-Cookie` header that removes the session cookie.
#[must_use]
pub fn clear_session_cookie(secure: bool) -> [(HeaderName, String); 1] {
    let mut cookie = base_cookie(String::new(), secure);
    cookie.make_removal();
    [(header::SET_COOKIE, cookie.to_string())]
}
