//! Application state shared across handlers.

use std::sync::Arc;

use url::Url;

use sick_fits_core::CurrencyCode;

use crate::config::StorefrontConfig;
use crate::db::DataStore;
use crate::services::auth::{AuthError, TokenError};
use crate::services::clock::{Clock, SystemClock};
use crate::services::email::{Mailer, SmtpMailer};
use crate::services::payments::{HttpPaymentGateway, PaymentError, PaymentGateway};
use crate::services::{AuthService, CommerceService, PasswordHasher, SessionTokens};

/// Error building application state from configuration.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid session secret: {0}")]
    SessionSecret(#[from] TokenError),

    #[error("invalid password hash parameters: {0}")]
    PasswordHash(#[from] AuthError),

    #[error("failed to configure SMTP: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("failed to configure payment gateway: {0}")]
    Payment(#[from] PaymentError),
}

/// Collaborators the handlers need, assembled once at startup.
///
/// Tests build this directly with in-memory doubles.
pub struct AppServices {
    pub frontend_url: Url,
    pub secure_cookies: bool,
    pub currency: CurrencyCode,
    pub store: Arc<dyn DataStore>,
    pub mailer: Arc<dyn Mailer>,
    pub payments: Arc<dyn PaymentGateway>,
    pub tokens: SessionTokens,
    pub hasher: PasswordHasher,
    pub clock: Arc<dyn Clock>,
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppServices>,
}

impl AppState {
    /// Build state with the production mailer, gateway, and clock.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if any collaborator rejects its configuration.
    pub fn new(config: &StorefrontConfig, store: Arc<dyn DataStore>) -> Result<Self, StateError> {
        let mailer = SmtpMailer::new(&config.email)?;
        let payments = HttpPaymentGateway::new(&config.payment)?;

        Ok(Self::from_services(AppServices {
            frontend_url: config.frontend_url.clone(),
            secure_cookies: config.secure_cookies(),
            currency: config.payment.currency,
            store,
            mailer: Arc::new(mailer),
            payments: Arc::new(payments),
            tokens: SessionTokens::new(&config.app_secret)?,
            hasher: PasswordHasher::new(&config.password_hash)?,
            clock: Arc::new(SystemClock),
        }))
    }

    /// Wrap already-built services.
    #[must_use]
    pub fn from_services(services: AppServices) -> Self {
        Self {
            inner: Arc::new(services),
        }
    }

    #[must_use]
    pub fn store(&self) -> &dyn DataStore {
        self.inner.store.as_ref()
    }

    #[must_use]
    pub fn tokens(&self) -> &SessionTokens {
        &self.inner.tokens
    }

    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    /// Frontend origin, used for reset links and CORS.
    #[must_use]
    pub fn frontend_url(&self) -> &Url {
        &self.inner.frontend_url
    }

    /// Whether session cookies carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.inner.secure_cookies
    }

    /// Auth service borrowing this state.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(
            self.inner.store.as_ref(),
            &self.inner.hasher,
            self.inner.clock.as_ref(),
            self.inner.mailer.as_ref(),
            &self.inner.frontend_url,
        )
    }

    /// Commerce service borrowing this state.
    #[must_use]
    pub fn commerce(&self) -> CommerceService<'_> {
        CommerceService::new(
            self.inner.store.as_ref(),
            self.inner.payments.as_ref(),
            self.inner.currency,
        )
    }
}
