//! HTTP middleware for the storefront API.
//!
//! # Layer order (outermost first, see `main.rs` and `routes::router`)
//!
//! 1. Sentry layers
//! 2. Rate limiting (governor)
//! 3. `TraceLayer`
//! 4. Request ID
//! 5. Security headers
//! 6. CORS
//!
//! Authentication is not a layer: handlers opt in through the [`Auth`] and
//! [`RequireAuth`] extractors.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{
    Auth, RequireAuth, SESSION_COOKIE, clear_session_cookie, session_token, set_session_cookie,
};
pub use rate_limit::{RateLimitConfigError, api_rate_limiter, auth_rate_limiter};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use security_headers::security_headers_middleware;
