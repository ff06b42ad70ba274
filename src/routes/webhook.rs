use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    error::AppError,
    rate_limit::Limit,
    request::{header_str, ClientMeta},
    state::AppState,
    stripe::CHECKOUT_COMPLETED,
    validation::sanitize,
    videos::{Created, NewVideo},
};

/// Records a paid checkout and starts rendering.
///
/// Provider retries of an already recorded session are acknowledged without
/// side effects.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    client: ClientMeta,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    super::enforce(&state, &client.ip, Limit::WEBHOOK).await?;

    let signature =
        header_str(&headers, "stripe-signature").ok_or(AppError::BadRequest("Missing signature"))?;

    let event = state.stripe.verify_webhook(&body, signature).map_err(|e| {
        warn!("Rejected webhook: {e}");
        AppError::BadRequest("Invalid signature")
    })?;

    if event.event_type != CHECKOUT_COMPLETED {
        debug!("Ignoring webhook event {} ({})", event.id, event.event_type);
        return Ok(super::received());
    }

    let session = event.checkout_session().map_err(|e| {
        warn!("Unreadable checkout session in {}: {e}", event.id);
        AppError::BadRequest("Missing metadata")
    })?;

    if session.payment_status.as_deref() != Some("paid") {
        return Err(AppError::BadRequest("Payment not completed"));
    }

    let message = sanitize(session.metadata("message").unwrap_or_default());
    let character = sanitize(session.metadata("character").unwrap_or_default());
    let email = session.customer_email().filter(|email| !email.is_empty());

    let Some(email) = email else {
        return Err(AppError::BadRequest("Missing metadata"));
    };
    if session.id.is_empty() || message.is_empty() || character.is_empty() {
        return Err(AppError::BadRequest("Missing metadata"));
    }

    let created = state
        .videos
        .create_paid(NewVideo {
            session_id: session.id.clone(),
            message,
            character,
            email: email.to_string(),
            ip_address: session.metadata("customer_ip").map(str::to_string),
            user_agent: session.metadata("customer_ua").map(str::to_string),
        })
        .await?;

    match created {
        Created::Duplicate => {
            info!("Session {} already recorded", session.id);
            return Ok(super::received());
        }
        Created::Inserted(video) => info!("Video {} recorded for session {}", video.id, session.id),
    }

    // Row is committed; trigger failures do not fail the webhook.
    if let Err(e) = state.automation.trigger(&session.id).await {
        error!("Failed to trigger render for {}: {e}", session.id);
    }

    Ok(super::received())
}
