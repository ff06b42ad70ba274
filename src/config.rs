use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable {0} must be set")]
    Missing(&'static str),

    #[error("Invalid {key} value: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Public origin of the site, used for checkout redirect URLs.
    pub public_url: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_base: String,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub storage_bucket: String,
    pub signed_url_ttl_secs: u64,
    /// Rendering trigger; `None` disables it.
    pub automation_url: Option<String>,
    /// Shared secret sent to, and expected back from, the automation.
    pub automation_secret: String,
    pub price_cents: i64,
    pub currency: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: try_load("PORT", "3000")?,
            database_url: required("DATABASE_URL")?,
            public_url: required("PUBLIC_URL")?.trim_end_matches('/').to_string(),
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            stripe_api_base: try_load("STRIPE_API_BASE", "https://api.stripe.com/v1")?,
            supabase_url: required("SUPABASE_URL")?.trim_end_matches('/').to_string(),
            supabase_service_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
            storage_bucket: try_load("STORAGE_BUCKET", "videos")?,
            signed_url_ttl_secs: try_load("SIGNED_URL_TTL_SECS", "3600")?,
            automation_url: optional("AUTOMATION_WEBHOOK_URL"),
            automation_secret: optional("AUTOMATION_SECRET").unwrap_or_default(),
            price_cents: try_load("PRICE_CENTS", "399")?,
            currency: try_load("CURRENCY", "usd")?,
        })
    }
}

fn optional(key: &'static str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => {
            warn!("{key} not set");
            None
        }
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        })
}
