//! Minimal Stripe REST client.
//!
//! Covers the three calls the checkout flow needs: creating a hosted checkout
//! session, creating a payment intent for wallet buttons, and verifying the
//! `Stripe-Signature` header of incoming webhooks.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Deserialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Oldest accepted webhook timestamp, in seconds before now.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Error, Debug)]
pub enum StripeError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Stripe API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(&'static str),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
}

impl CheckoutSession {
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key).map(String::as_str)
    }

    pub fn customer_email(&self) -> Option<&str> {
        self.customer_details.as_ref()?.email.as_deref()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl Event {
    pub fn checkout_session(&self) -> Result<CheckoutSession, StripeError> {
        Ok(serde_json::from_value(self.data.object.clone())?)
    }
}

/// Inputs for a one-item hosted checkout.
#[derive(Debug, Clone)]
pub struct CheckoutParams<'a> {
    pub product_name: String,
    pub unit_amount: i64,
    pub currency: &'a str,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: Vec<(&'static str, String)>,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    api_key: String,
    webhook_secret: String,
    client: reqwest::Client,
    base_url: String,
}

impl StripeClient {
    pub fn new(client: reqwest::Client, api_key: String, webhook_secret: String) -> Self {
        Self {
            api_key,
            webhook_secret,
            client,
            base_url: "https://api.stripe.com/v1".to_string(),
        }
    }

    /// Points the client at another API root, e.g. a local mock.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn create_checkout_session(
        &self,
        params: CheckoutParams<'_>,
    ) -> Result<CheckoutSession, StripeError> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                params.currency.to_string(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                params.unit_amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                params.product_name,
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), params.success_url),
            ("cancel_url".to_string(), params.cancel_url),
        ];

        for (key, value) in params.metadata {
            form.push((format!("metadata[{key}]"), value));
        }

        self.post_form("checkout/sessions", &form).await
    }

    pub async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, StripeError> {
        let form = [
            ("amount", amount.to_string()),
            ("currency", currency.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];

        self.post_form("payment_intents", &form).await
    }

    /// Verifies a webhook against the wall clock and parses its event.
    pub fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<Event, StripeError> {
        self.verify_webhook_at(payload, signature, chrono::Utc::now().timestamp())
    }

    /// Checks `t=<ts>,v1=<hex>[,v1=<hex>...]` against
    /// HMAC-SHA256(`"<ts>.<payload>"`) and rejects timestamps more than
    /// [`SIGNATURE_TOLERANCE_SECS`] older than `now`.
    pub fn verify_webhook_at(
        &self,
        payload: &[u8],
        signature: &str,
        now: i64,
    ) -> Result<Event, StripeError> {
        let mut timestamp = None;
        let mut candidates = Vec::new();

        for part in signature.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(StripeError::InvalidSignature("missing timestamp"))?;
        if candidates.is_empty() {
            return Err(StripeError::InvalidSignature("missing v1 signature"));
        }

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| StripeError::InvalidSignature("unusable webhook secret"))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);

        let matched = candidates.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });
        if !matched {
            return Err(StripeError::InvalidSignature("signature mismatch"));
        }

        let sent_at: i64 = timestamp
            .parse()
            .map_err(|_| StripeError::InvalidSignature("malformed timestamp"))?;
        if now - sent_at > SIGNATURE_TOLERANCE_SECS {
            return Err(StripeError::InvalidSignature("timestamp outside tolerance"));
        }

        Ok(serde_json::from_slice(payload)?)
    }

    async fn post_form<T, F>(&self, path: &str, form: &F) -> Result<T, StripeError>
    where
        T: DeserializeOwned,
        F: serde::Serialize + ?Sized,
    {
        debug!("POST {}/{path}", self.base_url);

        let response = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            #[derive(Deserialize)]
            struct ApiError {
                error: ApiErrorDetail,
            }

            #[derive(Deserialize)]
            struct ApiErrorDetail {
                message: String,
            }

            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
