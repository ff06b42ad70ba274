//! HTTP surface.
//!
//! | Method | Path                           | Handler                              |
//! |--------|--------------------------------|--------------------------------------|
//! | POST   | `/api/stripe/checkout`         | [`checkout::create_checkout_session`] |
//! | POST   | `/api/payment`                 | [`checkout::create_payment_intent`]  |
//! | POST   | `/api/stripe/webhook`          | [`webhook::stripe_webhook`]          |
//! | GET    | `/api/video/status`            | [`videos::video_status`]             |
//! | GET    | `/api/video/url`               | [`videos::video_url`]                |
//! | GET    | `/api/video/stream`, `/stream` | [`videos::video_stream`]             |
//! | POST   | `/api/internal/video/complete` | [`videos::complete_video`]           |
//! | POST   | `/api/log/event`               | [`analytics::log_event`]             |
//! | POST   | `/api/log/view`                | [`analytics::log_view`]              |

use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::{
    error::AppError,
    rate_limit::{Limit, REJECT_DELAY},
    state::AppState,
};

pub mod analytics;
pub mod checkout;
pub mod videos;
pub mod webhook;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/stripe/checkout", post(checkout::create_checkout_session))
        .route("/api/payment", post(checkout::create_payment_intent))
        .route("/api/stripe/webhook", post(webhook::stripe_webhook))
        .route("/api/video/status", get(videos::video_status))
        .route("/api/video/url", get(videos::video_url))
        .route("/api/video/stream", get(videos::video_stream))
        .route("/stream", get(videos::video_stream))
        .route("/api/internal/video/complete", post(videos::complete_video))
        .route("/api/log/event", post(analytics::log_event))
        .route("/api/log/view", post(analytics::log_view))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Admits the call or, after [`REJECT_DELAY`], fails with 429.
pub(crate) async fn enforce(state: &AppState, ip: &str, limit: Limit) -> Result<(), AppError> {
    if state.rate_limits.check(ip, limit).await? {
        return Ok(());
    }

    warn!("Rate limited {ip} on {}", limit.prefix);
    tokio::time::sleep(REJECT_DELAY).await;

    Err(AppError::TooManyRequests)
}

pub(crate) fn received() -> Json<Value> {
    Json(json!({ "received": true }))
}
