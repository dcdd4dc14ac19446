//! Permission gate.
//!
//! A gate passes when the user holds at least one of the required
//! permissions.

use sick_fits_core::Permission;
use thiserror::Error;

use crate::models::User;

/// The user holds none of the required permissions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("you do not have sufficient permissions: requires one of {required:?}, you have {held:?}")]
pub struct Forbidden {
    pub required: Vec<String>,
    pub held: Vec<String>,
}

/// Permissions that may list users and change their permissions.
pub const MANAGE_PERMISSIONS: [Permission; 2] = [Permission::Admin, Permission::PermissionUpdate];

/// Whether `user` holds any of `required`.
#[must_use]
pub fn holds_any(user: &User, required: &[Permission]) -> bool {
    user.permissions.contains_any(required)
}

/// Check `user` against an any-of gate.
///
/// # Errors
///
/// Returns [`Forbidden`] naming the required and held permissions when the
/// user holds none of `required`.
pub fn has_permission(user: &User, required: &[Permission]) -> Result<(), Forbidden> {
    if holds_any(user, required) {
        return Ok(());
    }

    tracing::warn!(
        user_id = %user.id,
        required = ?required,
        held = %user.permissions,
        "permission denied"
    );

    Err(Forbidden {
        required: required.iter().map(|p| p.as_str().to_owned()).collect(),
        held: user.permissions.labels(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use chrono::Utc;
    use secrecy::SecretString;
    use sick_fits_core::{Email, PermissionSet, UserId};

    use super::*;

    pub(crate) fn user_with(id: i32, permissions: &[Permission]) -> User {
        User {
            id: UserId::new(id),
            email: Email::parse(&format!("user{id}@example.com")).unwrap(),
            name: format!("User {id}"),
            permissions: PermissionSet::new(permissions.iter().copied()),
            password_hash: SecretString::from(String::new()),
            reset: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_gate_is_any_of() {
        let user = user_with(1, &[Permission::PermissionUpdate]);
        assert!(has_permission(&user, &MANAGE_PERMISSIONS).is_ok());
        assert!(has_permission(&user, &[Permission::ItemDelete]).is_err());
    }

    #[test]
    fn test_plain_user_is_forbidden() {
        let user = user_with(1, &[]);
        let err = has_permission(&user, &MANAGE_PERMISSIONS).unwrap_err();
        assert_eq!(err.required, vec!["ADMIN", "PERMISSIONUPDATE"]);
        assert_eq!(err.held, vec!["USER"]);
        assert!(err.to_string().contains("PERMISSIONUPDATE"));
    }

    #[test]
    fn test_empty_requirement_never_passes() {
        let user = user_with(1, &[Permission::Admin]);
        assert!(!holds_any(&user, &[]));
    }
}
