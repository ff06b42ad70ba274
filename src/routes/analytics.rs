use axum::{body::Bytes, extract::State, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::{error::AppError, request::ClientMeta, state::AppState};

fn parse(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

fn non_empty_str(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Records a named event. Storage failures are logged, not reported.
pub async fn log_event(
    State(state): State<AppState>,
    client: ClientMeta,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let body = parse(&body);

    let event_name =
        non_empty_str(&body, "event_name").ok_or(AppError::BadRequest("Missing event_name"))?;

    if let Err(e) = state
        .analytics
        .record_event(
            &event_name,
            non_empty_str(&body, "session_id"),
            body.get("metadata").cloned(),
            &client,
        )
        .await
    {
        warn!("Failed to record event {event_name}: {e}");
    }

    Ok(Json(json!({ "ok": true })))
}

/// Records a page view. Storage failures are logged, not reported.
pub async fn log_view(
    State(state): State<AppState>,
    client: ClientMeta,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let body = parse(&body);

    let path = non_empty_str(&body, "path").ok_or(AppError::BadRequest("Missing path"))?;

    if let Err(e) = state
        .analytics
        .record_view(&path, non_empty_str(&body, "session_id"), &client)
        .await
    {
        warn!("Failed to record view of {path}: {e}");
    }

    Ok(Json(json!({ "ok": true })))
}
