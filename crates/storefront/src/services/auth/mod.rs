//! Authentication service.
//!
//! Provides signup, signin, password reset, and permission management.
//! Session tokens are issued by the HTTP layer from the returned [`User`].

mod error;
pub mod password;
pub mod reset;
pub mod token;

pub use error::AuthError;
pub use password::PasswordHasher;
pub use token::{SessionTokens, TokenError};

use secrecy::ExposeSecret;
use url::Url;

use sick_fits_core::{Email, PermissionSet, UserId};

use crate::db::{DataStore, RepositoryError};
use crate::models::{NewUser, User, UserPatch};
use crate::services::clock::Clock;
use crate::services::email::Mailer;
use crate::services::permissions::{MANAGE_PERMISSIONS, has_permission};

/// Authentication service.
///
/// Borrowed from application state for the duration of a request.
pub struct AuthService<'a> {
    store: &'a dyn DataStore,
    hasher: &'a PasswordHasher,
    clock: &'a dyn Clock,
    mailer: &'a dyn Mailer,
    frontend_url: &'a Url,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(
        store: &'a dyn DataStore,
        hasher: &'a PasswordHasher,
        clock: &'a dyn Clock,
        mailer: &'a dyn Mailer,
        frontend_url: &'a Url,
    ) -> Self {
        Self {
            store,
            hasher,
            clock,
            mailer,
            frontend_url,
        }
    }

    /// Register a new user with the baseline `USER` permission.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[tracing::instrument(skip(self, password))]
    pub async fn signup(&self, email: &str, name: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        password::validate_password(password)?;

        let password_hash = self.hasher.hash(password).await?;

        let user = self
            .store
            .create_user(NewUser {
                email,
                name: name.trim().to_owned(),
                password_hash,
                permissions: PermissionSet::default(),
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "user signed up");
        Ok(user)
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email is unknown or the
    /// password is wrong; the two cases are indistinguishable to the caller.
    #[tracing::instrument(skip(self, password))]
    pub async fn signin(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let Ok(email) = Email::parse(email) else {
            self.hasher.verify_dummy(password).await;
            return Err(AuthError::InvalidCredentials);
        };

        let Some(user) = self.store.find_user_by_email(&email).await? else {
            // Same hashing work as a wrong password.
            self.hasher.verify_dummy(password).await;
            tracing::warn!("signin for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .hasher
            .verify(password, user.password_hash.expose_secret())
            .await
        {
            tracing::warn!(user_id = %user.id, "signin with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, "user signed in");
        Ok(user)
    }

    /// List every user. Requires `ADMIN` or `PERMISSIONUPDATE`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Forbidden` if `actor` fails the gate.
    pub async fn list_users(&self, actor: &User) -> Result<Vec<User>, AuthError> {
        has_permission(actor, &MANAGE_PERMISSIONS)?;
        Ok(self.store.list_users().await?)
    }

    /// Replace a user's permissions. Requires `ADMIN` or `PERMISSIONUPDATE`.
    /// `USER` is always retained.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Forbidden` if `actor` fails the gate.
    /// Returns `AuthError::UserNotFound` if the target doesn't exist.
    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn update_permissions(
        &self,
        actor: &User,
        target: UserId,
        permissions: PermissionSet,
    ) -> Result<User, AuthError> {
        has_permission(actor, &MANAGE_PERMISSIONS)?;

        let permissions = PermissionSet::new(permissions.iter());
        let user = self
            .store
            .update_user(
                target,
                UserPatch {
                    permissions: Some(permissions),
                    ..UserPatch::default()
                },
            )
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, permissions = %user.permissions, "permissions updated");
        Ok(user)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use chrono::{TimeZone, Utc};
    use sick_fits_core::Permission;

    use super::*;
    use crate::db::MemoryStore;
    use crate::services::clock::FixedClock;
    use crate::services::email::RecordingMailer;

    /// Collaborators for exercising [`AuthService`] in isolation.
    pub(crate) struct Harness {
        pub store: MemoryStore,
        pub hasher: PasswordHasher,
        pub clock: FixedClock,
        pub mailer: RecordingMailer,
        pub frontend_url: Url,
    }

    impl Harness {
        pub fn new() -> Self {
            Self {
                store: MemoryStore::new(),
                hasher: password::tests::fast_hasher(),
                clock: FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()),
                mailer: RecordingMailer::new(),
                frontend_url: Url::parse("http://localhost:7777").unwrap(),
            }
        }

        pub fn service(&self) -> AuthService<'_> {
            AuthService::new(
                &self.store,
                &self.hasher,
                &self.clock,
                &self.mailer,
                &self.frontend_url,
            )
        }

        pub async fn signup(&self, email: &str, password: &str) -> User {
            self.service().signup(email, "Wes", password).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_signup_lowercases_and_grants_user() {
        let h = Harness::new();
        let user = h.signup("Wes@Example.COM", "password1").await;
        assert_eq!(user.email.as_str(), "wes@example.com");
        assert_eq!(user.permissions.labels(), vec!["USER"]);
    }

    #[tokio::test]
    async fn test_signup_rejects_duplicate_email() {
        let h = Harness::new();
        h.signup("wes@example.com", "password1").await;
        let result = h
            .service()
            .signup("WES@example.com", "Other", "password2")
            .await;
        assert!(matches!(result, Err(AuthError::UserAlreadyExists)));
    }

    #[tokio::test]
    async fn test_signup_rejects_short_password() {
        let h = Harness::new();
        let result = h.service().signup("wes@example.com", "Wes", "short").await;
        assert!(matches!(result, Err(AuthError::WeakPassword(_))));
    }

    #[tokio::test]
    async fn test_signup_rejects_bad_email() {
        let h = Harness::new();
        let result = h.service().signup("not-an-email", "Wes", "password1").await;
        assert!(matches!(result, Err(AuthError::InvalidEmail(_))));
    }

    #[tokio::test]
    async fn test_signin_collapses_failures() {
        let h = Harness::new();
        h.signup("wes@example.com", "password1").await;

        assert!(h.service().signin("WES@example.com", "password1").await.is_ok());
        assert!(matches!(
            h.service().signin("wes@example.com", "wrongpass").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            h.service().signin("nobody@example.com", "password1").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_update_permissions_requires_gate() {
        let h = Harness::new();
        let actor = h.signup("actor@example.com", "password1").await;
        let target = h.signup("target@example.com", "password1").await;

        let result = h
            .service()
            .update_permissions(&actor, target.id, PermissionSet::new([Permission::Admin]))
            .await;
        assert!(matches!(result, Err(AuthError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_permissions_keeps_user() {
        let h = Harness::new();
        let admin = h.signup("admin@example.com", "password1").await;
        let admin = h
            .store
            .update_user(
                admin.id,
                UserPatch {
                    permissions: Some(PermissionSet::new([Permission::PermissionUpdate])),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap();
        let target = h.signup("target@example.com", "password1").await;

        let updated = h
            .service()
            .update_permissions(&admin, target.id, PermissionSet::new([Permission::ItemCreate]))
            .await
            .unwrap();
        assert!(updated.permissions.contains(Permission::User));
        assert!(updated.permissions.contains(Permission::ItemCreate));

        let missing = h
            .service()
            .update_permissions(&admin, UserId::new(9999), PermissionSet::default())
            .await;
        assert!(matches!(missing, Err(AuthError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_list_users_gated() {
        let h = Harness::new();
        let user = h.signup("wes@example.com", "password1").await;
        assert!(matches!(
            h.service().list_users(&user).await,
            Err(AuthError::Forbidden(_))
        ));
    }
}
