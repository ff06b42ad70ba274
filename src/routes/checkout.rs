use axum::{body::Bytes, extract::State, Json};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    error::AppError,
    rate_limit::Limit,
    request::ClientMeta,
    state::AppState,
    stripe::CheckoutParams,
    validation::{is_invalid_message, sanitize_value},
};

/// Opens a hosted checkout for `{message, character}` and returns its URL.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    client: ClientMeta,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    super::enforce(&state, &client.ip, Limit::CHECKOUT).await?;

    let body: Value = serde_json::from_slice(&body)
        .ok()
        .filter(|v: &Value| !v.is_null())
        .ok_or(AppError::BadRequest("Invalid JSON"))?;

    let message = sanitize_value(body.get("message"));
    let character = sanitize_value(body.get("character"));

    if message.is_empty() || character.is_empty() {
        return Err(AppError::BadRequest("Missing message or character"));
    }

    if is_invalid_message(&message) {
        return Err(AppError::BadRequest("Message invalid"));
    }

    let config = &state.config;

    let mut metadata = vec![
        ("message", message),
        ("character", character.clone()),
        ("customer_ip", client.ip.clone()),
    ];
    if !client.user_agent.is_empty() {
        metadata.push(("customer_ua", client.user_agent.clone()));
    }

    let session = state
        .stripe
        .create_checkout_session(CheckoutParams {
            product_name: format!("Custom Video: {character}"),
            unit_amount: config.price_cents,
            currency: &config.currency,
            success_url: format!(
                "{}/success?session_id={{CHECKOUT_SESSION_ID}}",
                config.public_url
            ),
            cancel_url: format!(
                "{}/characters/{}",
                config.public_url,
                urlencoding::encode(&character)
            ),
            metadata,
        })
        .await?;

    info!("Checkout session {} created for {character}", session.id);

    if let Err(e) = state
        .analytics
        .record_event(
            "stripe_session_created",
            Some(session.id.clone()),
            Some(json!({ "character": character })),
            &client,
        )
        .await
    {
        warn!("Failed to record checkout event: {e}");
    }

    Ok(Json(json!({ "url": session.url })))
}

/// Creates a payment intent for embedded wallet buttons.
pub async fn create_payment_intent(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let intent = state
        .stripe
        .create_payment_intent(state.config.price_cents, &state.config.currency)
        .await?;

    info!("Payment intent {} created", intent.id);

    Ok(Json(json!({ "clientSecret": intent.client_secret })))
}
