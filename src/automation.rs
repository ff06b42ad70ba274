//! Trigger for the external video rendering workflow.
//!
//! The workflow is opaque to this service: it receives the checkout session
//! id, renders the video, uploads it to storage and reports back through the
//! completion callback in [`crate::routes::videos`].

use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

/// Header carrying the shared secret in both directions.
pub const SECRET_HEADER: &str = "x-internal-secret";

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Automation endpoint returned {0}")]
    Status(u16),
}

#[derive(Debug, Clone)]
pub struct AutomationClient {
    client: reqwest::Client,
    url: Option<String>,
    secret: String,
}

impl AutomationClient {
    pub fn new(client: reqwest::Client, url: Option<String>, secret: impl Into<String>) -> Self {
        Self {
            client,
            url,
            secret: secret.into(),
        }
    }

    /// Asks the workflow to render the video for `session_id`.
    ///
    /// Does nothing when no endpoint is configured.
    pub async fn trigger(&self, session_id: &str) -> Result<(), AutomationError> {
        let Some(url) = &self.url else {
            warn!("Automation endpoint not configured, skipping render of {session_id}");
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .header(SECRET_HEADER, &self.secret)
            .json(&json!({ "session_id": session_id }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AutomationError::Status(response.status().as_u16()));
        }

        info!("Render triggered for {session_id}");
        Ok(())
    }

    /// Checks a secret presented by the workflow's callback.
    ///
    /// An unset secret never matches.
    pub fn accepts(&self, presented: Option<&str>) -> bool {
        !self.secret.is_empty() && presented == Some(self.secret.as_str())
    }
}
