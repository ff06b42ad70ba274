use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    analytics::AnalyticsStore,
    automation::AutomationClient,
    config::Config,
    rate_limit::{DbRateLimitStore, RateLimitStore},
    storage::StorageClient,
    stripe::StripeClient,
    videos::VideoStore,
};

/// Handles shared by every request. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rate_limits: Arc<dyn RateLimitStore>,
    pub videos: VideoStore,
    pub analytics: AnalyticsStore,
    pub stripe: StripeClient,
    pub storage: StorageClient,
    pub automation: AutomationClient,
    /// Client for proxying storage downloads.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config, conn: DatabaseConnection, http: reqwest::Client) -> Self {
        let stripe = StripeClient::new(
            http.clone(),
            config.stripe_secret_key.clone(),
            config.stripe_webhook_secret.clone(),
        )
        .with_base_url(config.stripe_api_base.clone());

        let storage = StorageClient::new(
            http.clone(),
            config.supabase_url.clone(),
            config.supabase_service_key.clone(),
            config.storage_bucket.clone(),
        );

        let automation = AutomationClient::new(
            http.clone(),
            config.automation_url.clone(),
            config.automation_secret.clone(),
        );

        Self {
            rate_limits: Arc::new(DbRateLimitStore::new(conn.clone())),
            videos: VideoStore::new(conn.clone()),
            analytics: AnalyticsStore::new(conn),
            config: Arc::new(config),
            stripe,
            storage,
            automation,
            http,
        }
    }

    /// Replaces the rate limit backend.
    pub fn with_rate_limits(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.rate_limits = store;
        self
    }
}
