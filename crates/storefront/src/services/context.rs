//! Per-request authorization context.
//!
//! Built from the `token` cookie: the token is verified, then the user it
//! names is fetched. A missing, tampered or stale token yields an anonymous
//! context rather than an error.

use thiserror::Error;

use crate::db::{DataStore, RepositoryError};
use crate::models::User;
use crate::services::auth::SessionTokens;

/// The caller is not signed in.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("you must be signed in to do that")]
pub struct Unauthenticated;

/// Who is making the request.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    user: Option<User>,
}

impl AuthContext {
    /// A context with no signed-in user.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { user: None }
    }

    /// A context for `user`.
    #[must_use]
    pub const fn for_user(user: User) -> Self {
        Self { user: Some(user) }
    }

    /// Resolve the caller from an optional session token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` only if the store fails; token problems
    /// produce an anonymous context.
    pub async fn resolve(
        token: Option<&str>,
        tokens: &SessionTokens,
        store: &dyn DataStore,
    ) -> Result<Self, RepositoryError> {
        let Some(token) = token else {
            return Ok(Self::anonymous());
        };

        let user_id = match tokens.verify(token) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "rejected session token");
                return Ok(Self::anonymous());
            }
        };

        let user = store.find_user_by_id(user_id).await?;
        if user.is_none() {
            tracing::debug!(%user_id, "session token names a user that no longer exists");
        }
        Ok(Self { user })
    }

    /// The signed-in user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// The signed-in user.
    ///
    /// # Errors
    ///
    /// Returns [`Unauthenticated`] for an anonymous context.
    pub const fn require_user(&self) -> Result<&User, Unauthenticated> {
        match &self.user {
            Some(user) => Ok(user),
            None => Err(Unauthenticated),
        }
    }

    #[must_use]
    pub fn into_user(self) -> Option<User> {
        self.user
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use sick_fits_core::{Email, PermissionSet, UserId};

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::NewUser;

    fn tokens() -> SessionTokens {
        SessionTokens::new(&SecretString::from(
            "k3y-for-tests-only-7a9f2c41d8e0b6".to_owned(),
        ))
        .unwrap()
    }

    async fn seeded() -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                email: Email::parse("wes@example.com").unwrap(),
                name: "Wes".to_owned(),
                password_hash: "hash".to_owned(),
                permissions: PermissionSet::default(),
            })
            .await
            .unwrap();
        (store, user)
    }

    #[tokio::test]
    async fn test_no_token_is_anonymous() {
        let (store, _) = seeded().await;
        let ctx = AuthContext::resolve(None, &tokens(), &store).await.unwrap();
        assert!(ctx.user().is_none());
        assert_eq!(ctx.require_user().unwrap_err(), Unauthenticated);
    }

    #[tokio::test]
    async fn test_valid_token_resolves_user() {
        let (store, user) = seeded().await;
        let t = tokens();
        let token = t.issue(user.id);
        let ctx = AuthContext::resolve(Some(&token), &t, &store).await.unwrap();
        assert_eq!(ctx.require_user().unwrap().id, user.id);
    }

    #[tokio::test]
    async fn test_tampered_token_is_anonymous() {
        let (store, user) = seeded().await;
        let t = tokens();
        let mut token = t.issue(user.id);
        token.push('0');
        let ctx = AuthContext::resolve(Some(&token), &t, &store).await.unwrap();
        assert!(ctx.user().is_none());
    }

    #[tokio::test]
    async fn test_vanished_user_is_anonymous() {
        let (store, _) = seeded().await;
        let t = tokens();
        let token = t.issue(UserId::new(404));
        let ctx = AuthContext::resolve(Some(&token), &t, &store).await.unwrap();
        assert!(ctx.user().is_none());
    }
}
