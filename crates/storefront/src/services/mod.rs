//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Signup, signin, password reset, session tokens, permissions
//! - `commerce` - Items, cart, checkout
//! - `context` - Per-request caller resolution
//! - `permissions` - Any-of permission gate
//! - `email` - Outbound mail
//! - `payments` - Payment gateway client
//! - `clock` - Injectable time source

pub mod auth;
pub mod clock;
pub mod commerce;
pub mod context;
pub mod email;
pub mod payments;
pub mod permissions;

pub use auth::{AuthError, AuthService, PasswordHasher, SessionTokens};
pub use clock::{Clock, FixedClock, SystemClock};
pub use commerce::{CommerceError, CommerceService};
pub use context::{AuthContext, Unauthenticated};
pub use email::{Mailer, RecordingMailer, SmtpMailer};
pub use payments::{FakePaymentGateway, HttpPaymentGateway, PaymentGateway};
