//! Signed URL issuance against a Supabase-compatible storage API.

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Storage API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Storage API response had no signed URL")]
    MissingUrl,
}

#[derive(Debug, Clone)]
pub struct StorageClient {
    client: reqwest::Client,
    /// Project origin, e.g. `https://abc.supabase.co`.
    base_url: String,
    service_key: String,
    bucket: String,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: Option<String>,
}

impl StorageClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            bucket: bucket.into(),
        }
    }

    /// Mints a URL granting read access to `key` for `ttl_secs` seconds.
    pub async fn create_signed_url(&self, key: &str, ttl_secs: u64) -> Result<String, StorageError> {
        let endpoint = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.base_url,
            self.bucket,
            key.trim_start_matches('/')
        );
        debug!("Signing storage object {key}");

        let response = self
            .client
            .post(&endpoint)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&json!({ "expiresIn": ttl_secs }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let signed = response
            .json::<SignResponse>()
            .await?
            .signed_url
            .filter(|url| !url.is_empty())
            .ok_or(StorageError::MissingUrl)?;

        Ok(self.absolute(&signed))
    }

    // The API answers with a path relative to `/storage/v1`.
    fn absolute(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            return signed.to_string();
        }

        format!(
            "{}/storage/v1/{}",
            self.base_url,
            signed.trim_start_matches('/')
        )
    }
}
