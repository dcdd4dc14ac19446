//! Payment gateway client.
//!
//! Checkout charges a card token through the [`PaymentGateway`] trait.
//! [`HttpPaymentGateway`] talks to a Stripe-compatible `/v1/charges`
//! endpoint; [`FakePaymentGateway`] approves or declines locally.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;

use sick_fits_core::CurrencyCode;

use crate::config::PaymentConfig;

/// Errors from the payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway refused the charge.
    #[error("charge declined: {0}")]
    Declined(String),

    /// Gateway returned an unexpected error.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Amount can't be charged (zero or out of range).
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// Client misconfiguration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Proof that a charge went through.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChargeConfirmation {
    /// Gateway charge identifier.
    pub id: String,
}

/// Charges payment sources.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charge `amount_minor` (cents) in `currency` against `source`, a
    /// client-side card token.
    async fn charge(
        &self,
        amount_minor: i64,
        currency: CurrencyCode,
        source: &str,
    ) -> Result<ChargeConfirmation, PaymentError>;
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    kind: String,
}

/// Gateway over HTTP.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    charges_url: String,
}

impl HttpPaymentGateway {
    /// Create a gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if the secret key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth_header = HeaderValue::from_str(&auth_value)
            .map_err(|e| PaymentError::Config(format!("Invalid secret key format: {e}")))?;
        auth_header.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_header);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            charges_url: format!("{}/v1/charges", config.api_url.as_str().trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip(self, source))]
    async fn charge(
        &self,
        amount_minor: i64,
        currency: CurrencyCode,
        source: &str,
    ) -> Result<ChargeConfirmation, PaymentError> {
        if amount_minor <= 0 {
            return Err(PaymentError::InvalidAmount(amount_minor));
        }

        let amount = amount_minor.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", currency.as_lower()),
            ("source", source),
        ];

        let response = self.client.post(&self.charges_url).form(&form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorBody>(&body).ok();
            return Err(match detail {
                Some(d) if d.error.kind == "card_error" => PaymentError::Declined(d.error.message),
                Some(d) => PaymentError::Api {
                    status: status.as_u16(),
                    message: d.error.message,
                },
                None => PaymentError::Api {
                    status: status.as_u16(),
                    message: body,
                },
            });
        }

        let confirmation: ChargeConfirmation = response.json().await?;
        tracing::info!(charge_id = %confirmation.id, "charge created");
        Ok(confirmation)
    }
}

/// A charge the fake gateway accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCharge {
    pub amount_minor: i64,
    pub currency: CurrencyCode,
    pub source: String,
}

/// Local gateway that approves every source except [`FakePaymentGateway::DECLINED_SOURCE`].
#[derive(Debug, Default)]
pub struct FakePaymentGateway {
    charges: Mutex<Vec<RecordedCharge>>,
}

impl FakePaymentGateway {
    /// Source token that is always declined.
    pub const DECLINED_SOURCE: &'static str = "tok_chargeDeclined";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Charges accepted so far.
    #[must_use]
    pub fn charges(&self) -> Vec<RecordedCharge> {
        self.charges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PaymentGateway for FakePaymentGateway {
    async fn charge(
        &self,
        amount_minor: i64,
        currency: CurrencyCode,
        source: &str,
    ) -> Result<ChargeConfirmation, PaymentError> {
        if amount_minor <= 0 {
            return Err(PaymentError::InvalidAmount(amount_minor));
        }
        if source == Self::DECLINED_SOURCE {
            return Err(PaymentError::Declined("Your card was declined.".to_owned()));
        }

        let mut charges = self.charges.lock().unwrap_or_else(PoisonError::into_inner);
        charges.push(RecordedCharge {
            amount_minor,
            currency,
            source: source.to_owned(),
        });
        Ok(ChargeConfirmation {
            id: format!("ch_fake_{}", charges.len()),
        })
    }
}
