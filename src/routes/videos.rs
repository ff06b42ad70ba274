use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::Response,
    Json,
};
use chrono::{TimeDelta, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{
    automation::SECRET_HEADER,
    error::AppError,
    rate_limit::Limit,
    request::{header_str, ClientMeta},
    state::AppState,
    videos::{Completion, Outcome},
};

// Upper bound for the recorded signed URL expiry, one year.
const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Request headers passed through to storage.
pub const FORWARDED_REQUEST_HEADERS: [&str; 2] = ["range", "accept"];

/// Storage response headers passed back to the client.
pub const FORWARDED_RESPONSE_HEADERS: [&str; 6] = [
    "content-type",
    "content-length",
    "content-range",
    "accept-ranges",
    "cache-control",
    "etag",
];

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VideoQuery {
    id: Option<String>,
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompleteBody {
    session_id: Option<String>,
    video_url: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

/// Accepts only the canonical hyphenated form.
fn parse_video_id(raw: Option<&str>) -> Option<Uuid> {
    raw.filter(|s| s.len() == 36).and_then(|s| Uuid::try_parse(s).ok())
}

/// `inline`, or `attachment` with both an ASCII `filename` and an RFC 5987
/// `filename*` when a non-empty name is requested.
pub fn content_disposition(filename: Option<&str>) -> HeaderValue {
    let Some(name) = filename.filter(|name| !name.is_empty()) else {
        return HeaderValue::from_static("inline");
    };

    let fallback: String = name
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let value = format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(name)
    );

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Reports the rendering state of the order behind a checkout session.
pub async fn video_status(
    State(state): State<AppState>,
    client: ClientMeta,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Value>, AppError> {
    super::enforce(&state, &client.ip, Limit::STATUS).await?;

    let session_id = query
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or(AppError::NotFound("Not found"))?;

    let video = state
        .videos
        .find_by_session(&session_id)
        .await?
        .ok_or(AppError::NotFound("Not found"))?;

    Ok(Json(json!({
        "id": video.id,
        "status": video.status,
        "character": video.character,
    })))
}

/// Hands out a short-lived signed URL for a finished video.
pub async fn video_url(
    State(state): State<AppState>,
    Query(query): Query<VideoQuery>,
) -> Result<Json<Value>, AppError> {
    let id = parse_video_id(query.id.as_deref()).ok_or(AppError::NotFound("Not found"))?;

    let (video, key) = state
        .videos
        .find_ready(id)
        .await?
        .ok_or(AppError::NotFound("Not found"))?;

    let ttl = state.config.signed_url_ttl_secs;
    let signed_url = state.storage.create_signed_url(&key, ttl).await.map_err(|e| {
        error!("Signing {key} for video {id} failed: {e}");
        AppError::Upstream("Could not generate signed URL")
    })?;

    let expires_at = Utc::now() + TimeDelta::seconds(ttl.min(MAX_TTL_SECS) as i64);
    if let Err(e) = state.videos.record_signed_url(video, expires_at.into()).await {
        warn!("Failed to record signed URL expiry for {id}: {e}");
    }

    Ok(Json(json!({ "signedUrl": signed_url })))
}

/// Streams a finished video from storage, honouring `Range` requests.
pub async fn video_stream(
    State(state): State<AppState>,
    Query(query): Query<VideoQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let id = parse_video_id(query.id.as_deref()).ok_or_else(|| {
        warn!("Invalid or missing video id");
        AppError::NotFound("Invalid video ID")
    })?;

    let (_, key) = state.videos.find_ready(id).await?.ok_or_else(|| {
        warn!("Video {id} not found or not ready");
        AppError::NotFound("Video file not found or still processing")
    })?;

    let signed_url = state
        .storage
        .create_signed_url(&key, state.config.signed_url_ttl_secs)
        .await
        .map_err(|e| {
            error!("Signing {key} for video {id} failed: {e}");
            AppError::Upstream("Could not generate signed URL")
        })?;

    let mut request = state.http.get(&signed_url);
    for name in FORWARDED_REQUEST_HEADERS {
        if let Some(value) = headers.get(name) {
            request = request.header(name, value.clone());
        }
    }

    let upstream = request.send().await.map_err(|e| {
        error!("Storage fetch for video {id} failed: {e}");
        AppError::Upstream("Failed to stream video from storage")
    })?;

    let status = upstream.status();
    if !status.is_success() {
        error!("Storage answered {status} for video {id}");
        return Err(AppError::Upstream("Failed to stream video from storage"));
    }

    let mut response_headers = HeaderMap::new();
    for name in FORWARDED_RESPONSE_HEADERS {
        if let Some(value) = upstream.headers().get(name) {
            response_headers.insert(name, value.clone());
        }
    }
    response_headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(query.filename.as_deref()),
    );

    debug!("Streaming video {id} with status {status}");

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;

    Ok(response)
}

/// Completion callback from the rendering workflow.
///
/// `{session_id, video_url}` marks the order finished, `{session_id, error}`
/// marks it failed.
pub async fn complete_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    if !state.automation.accepts(header_str(&headers, SECRET_HEADER)) {
        warn!(
            "Rejected completion callback from {}",
            ClientMeta::from_headers(&headers).ip
        );
        return Err(AppError::Unauthorized);
    }

    let body: CompleteBody =
        serde_json::from_slice(&body).map_err(|_| AppError::BadRequest("Invalid JSON"))?;

    let session_id = body
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or(AppError::BadRequest("Missing session_id"))?;

    let failed = body
        .error
        .as_ref()
        .is_some_and(|e| !e.is_null() && *e != Value::Bool(false));

    let outcome = match body.video_url.filter(|key| !key.is_empty()) {
        Some(video_url) => Outcome::Finished { video_url },
        None if failed => Outcome::Failed,
        None => return Err(AppError::BadRequest("Missing video_url or error")),
    };

    match state.videos.complete(&session_id, outcome).await? {
        Completion::Updated(video) => Ok(Json(json!({
            "id": video.id,
            "status": video.status,
        }))),
        Completion::NotFound => Err(AppError::NotFound("Not found")),
        Completion::Rejected(status) => {
            warn!("Session {session_id} is already {status:?}");
            Err(AppError::Conflict("Video already completed"))
        }
    }
}
