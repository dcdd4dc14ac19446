//! User domain types.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;

use sick_fits_core::{Email, PermissionSet, UserId};

/// A storefront account.
///
/// The password hash and any pending reset token never leave the server:
/// both are skipped when serializing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Lowercased, unique email address.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Granted permissions (always includes `USER`).
    pub permissions: PermissionSet,
    /// PHC-formatted password hash.
    #[serde(skip)]
    pub password_hash: SecretString,
    /// Outstanding password reset, if one was requested.
    #[serde(skip)]
    pub reset: Option<PendingReset>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A password reset token and its expiry. Token and expiry exist together or
/// not at all.
#[derive(Debug, Clone)]
pub struct PendingReset {
    /// Hex-encoded random token mailed to the user.
    pub token: SecretString,
    /// Instant after which the token is no longer honored.
    pub expires_at: DateTime<Utc>,
}

/// Data needed to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub name: String,
    pub password_hash: String,
    pub permissions: PermissionSet,
}

/// Partial update of a user. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub permissions: Option<PermissionSet>,
    /// `Some(None)` clears a pending reset, `Some(Some(_))` replaces it.
    pub reset: Option<Option<PendingReset>>,
}

/// The signed-in user together with their cart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Me {
    #[serde(flatten)]
    pub user: User,
    pub cart: Vec<super::cart::CartLine>,
}
