mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{app, get, insert_video, post_json, send, AUTOMATION_SECRET};
use greeting_reel::{
    entity::video::{self, VideoStatus},
    videos::{Completion, Outcome, VideoStore},
};
use mockito::{Matcher, ServerGuard};
use sea_orm::EntityTrait;
use serde_json::json;

const KEY: &str = "b403c4fd.mp4";

async fn mock_signing(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("POST", "/storage/v1/object/sign/videos/b403c4fd.mp4")
        .match_header("apikey", "service-key")
        .match_body(Matcher::Json(json!({ "expiresIn": 3600 })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"signedURL":"/object/sign/videos/b403c4fd.mp4?token=tok"}"#)
        .create_async()
        .await
}

fn complete(body: serde_json::Value, secret: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/api/internal/video/complete")
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header("x-internal-secret", secret);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn status_reports_order_state() {
    let (app, conn) = app("http://127.0.0.1:9", None).await;
    let video = insert_video(&conn, "cs_status", VideoStatus::Paid, None).await;

    let response = send(&app, get("/api/video/status?session_id=cs_status")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        json!({ "id": video.id, "status": "paid", "character": "santa-claus" })
    );

    let missing = send(&app, get("/api/video/status?session_id=cs_unknown")).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.json()["error"], "Not found");

    let no_param = send(&app, get("/api/video/status")).await;
    assert_eq!(no_param.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn signed_url_only_for_finished_videos() {
    let mut server = mockito::Server::new_async().await;
    let signing = mock_signing(&mut server).await;

    let (app, conn) = app(&server.url(), None).await;
    let pending = insert_video(&conn, "cs_pending", VideoStatus::Paid, None).await;
    let done = insert_video(&conn, "cs_done", VideoStatus::Finished, Some(KEY)).await;

    let response = send(&app, get(&format!("/api/video/url?id={}", pending.id))).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = send(&app, get("/api/video/url?id=not-a-uuid")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = send(&app, get(&format!("/api/video/url?id={}", done.id))).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        json!({
            "signedUrl": format!("{}/storage/v1/object/sign/videos/b403c4fd.mp4?token=tok", server.url())
        })
    );

    signing.assert_async().await;

    let stored = video::Entity::find_by_id(done.id).one(&conn).await.unwrap().unwrap();
    assert!(stored.expires_at.is_some());
}

#[tokio::test]
async fn signing_failure_is_a_server_error() {
    let mut server = mockito::Server::new_async().await;
    let _signing_failure = server
        .mock("POST", "/storage/v1/object/sign/videos/b403c4fd.mp4")
        .with_status(400)
        .with_body(r#"{"error":"Object not found"}"#)
        .create_async()
        .await;

    let (app, conn) = app(&server.url(), None).await;
    let done = insert_video(&conn, "cs_done", VideoStatus::Finished, Some(KEY)).await;

    let response = send(&app, get(&format!("/api/video/url?id={}", done.id))).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["error"], "Could not generate signed URL");
}

#[tokio::test]
async fn stream_forwards_range_and_filters_headers() {
    let mut server = mockito::Server::new_async().await;
    let _signing = mock_signing(&mut server).await;
    let object = server
        .mock("GET", "/storage/v1/object/sign/videos/b403c4fd.mp4")
        .match_query(Matcher::UrlEncoded("token".into(), "tok".into()))
        .match_header("range", "bytes=0-3")
        .match_header("cookie", Matcher::Missing)
        .with_status(206)
        .with_header("content-type", "video/mp4")
        .with_header("content-range", "bytes 0-3/10")
        .with_header("accept-ranges", "bytes")
        .with_header("etag", "\"abc\"")
        .with_header("x-amz-meta-owner", "internal")
        .with_header("set-cookie", "sid=1")
        .with_body("abcd")
        .expect(1)
        .create_async()
        .await;

    let (app, conn) = app(&server.url(), None).await;
    let done = insert_video(&conn, "cs_done", VideoStatus::Finished, Some(KEY)).await;

    let request = Request::get(format!("/api/video/stream?id={}", done.id))
        .header("range", "bytes=0-3")
        .header("cookie", "session=secret")
        .body(Body::empty())
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(&response.body[..], b"abcd");
    assert_eq!(response.headers["content-type"], "video/mp4");
    assert_eq!(response.headers["content-range"], "bytes 0-3/10");
    assert_eq!(response.headers["accept-ranges"], "bytes");
    assert_eq!(response.headers["etag"], "\"abc\"");
    assert_eq!(response.headers["content-disposition"], "inline");
    assert!(response.headers.get("x-amz-meta-owner").is_none());
    assert!(response.headers.get("set-cookie").is_none());

    object.assert_async().await;
}

#[tokio::test]
async fn stream_download_sets_attachment() {
    let mut server = mockito::Server::new_async().await;
    let _signing = mock_signing(&mut server).await;
    let _object = server
        .mock("GET", "/storage/v1/object/sign/videos/b403c4fd.mp4")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "video/mp4")
        .with_body("full video")
        .create_async()
        .await;

    let (app, conn) = app(&server.url(), None).await;
    let done = insert_video(&conn, "cs_done", VideoStatus::Finished, Some(KEY)).await;

    let response = send(
        &app,
        get(&format!("/stream?id={}&filename=santa.mp4", done.id)),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.headers["content-disposition"],
        "attachment; filename=\"santa.mp4\"; filename*=UTF-8''santa.mp4"
    );
    assert_eq!(&response.body[..], b"full video");
}

#[tokio::test]
async fn stream_rejects_unready_and_unknown_videos() {
    let (app, conn) = app("http://127.0.0.1:9", None).await;
    let pending = insert_video(&conn, "cs_pending", VideoStatus::Paid, None).await;

    let response = send(&app, get("/api/video/stream?id=123")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["error"], "Invalid video ID");

    let response = send(&app, get(&format!("/api/video/stream?id={}", pending.id))).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(
        response.json()["error"],
        "Video file not found or still processing"
    );
}

#[tokio::test]
async fn stream_upstream_failure_is_a_server_error() {
    let mut server = mockito::Server::new_async().await;
    let _signing = mock_signing(&mut server).await;
    let _object = server
        .mock("GET", "/storage/v1/object/sign/videos/b403c4fd.mp4")
        .match_query(Matcher::Any)
        .with_status(403)
        .create_async()
        .await;

    let (app, conn) = app(&server.url(), None).await;
    let done = insert_video(&conn, "cs_done", VideoStatus::Finished, Some(KEY)).await;

    let response = send(&app, get(&format!("/api/video/stream?id={}", done.id))).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["error"], "Failed to stream video from storage");
}

#[tokio::test]
async fn completion_callback_moves_paid_to_finished_once() {
    let (app, conn) = app("http://127.0.0.1:9", None).await;
    let video = insert_video(&conn, "cs_render", VideoStatus::Paid, None).await;

    let body = json!({ "session_id": "cs_render", "video_url": KEY });

    let unauthorized = send(&app, complete(body.clone(), Some("wrong"))).await;
    assert_eq!(unauthorized.status, StatusCode::UNAUTHORIZED);

    let unauthenticated = send(&app, complete(body.clone(), None)).await;
    assert_eq!(unauthenticated.status, StatusCode::UNAUTHORIZED);

    let done = send(&app, complete(body.clone(), Some(AUTOMATION_SECRET))).await;
    assert_eq!(done.status, StatusCode::OK);
    assert_eq!(done.json(), json!({ "id": video.id, "status": "finished" }));

    let stored = video::Entity::find_by_id(video.id).one(&conn).await.unwrap().unwrap();
    assert_eq!(stored.status, VideoStatus::Finished);
    assert_eq!(stored.video_url.as_deref(), Some(KEY));

    let failed_after = send(
        &app,
        complete(
            json!({ "session_id": "cs_render", "error": "render crashed" }),
            Some(AUTOMATION_SECRET),
        ),
    )
    .await;
    assert_eq!(failed_after.status, StatusCode::CONFLICT);

    let stored = video::Entity::find_by_id(video.id).one(&conn).await.unwrap().unwrap();
    assert_eq!(stored.status, VideoStatus::Finished);
}

#[tokio::test]
async fn completion_callback_records_failures() {
    let (app, conn) = app("http://127.0.0.1:9", None).await;
    let video = insert_video(&conn, "cs_broken", VideoStatus::Paid, None).await;

    let response = send(
        &app,
        complete(
            json!({ "session_id": "cs_broken", "error": true }),
            Some(AUTOMATION_SECRET),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["status"], "error");

    let stored = video::Entity::find_by_id(video.id).one(&conn).await.unwrap().unwrap();
    assert_eq!(stored.status, VideoStatus::Error);

    let unknown = send(
        &app,
        complete(
            json!({ "session_id": "cs_missing", "error": true }),
            Some(AUTOMATION_SECRET),
        ),
    )
    .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let incomplete = send(
        &app,
        post_json("/api/internal/video/complete", &json!({ "session_id": "cs_broken" })),
    )
    .await;
    assert_eq!(incomplete.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn racing_completions_settle_once() {
    let conn = common::setup_db().await;
    insert_video(&conn, "cs_race", VideoStatus::Paid, None).await;
    let store = VideoStore::new(conn.clone());

    let (finished, failed) = tokio::join!(
        store.complete(
            "cs_race",
            Outcome::Finished {
                video_url: KEY.to_string()
            }
        ),
        store.complete("cs_race", Outcome::Failed),
    );
    let outcomes = [finished.unwrap(), failed.unwrap()];

    let updated: Vec<_> = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            Completion::Updated(video) => Some(video.status),
            _ => None,
        })
        .collect();
    assert_eq!(updated.len(), 1);
    assert!(outcomes
        .iter()
        .any(|outcome| matches!(outcome, Completion::Rejected(status) if *status == updated[0])));

    let stored = store.find_by_session("cs_race").await.unwrap().unwrap();
    assert_eq!(stored.status, updated[0]);
    assert_eq!(
        stored.video_url.is_some(),
        stored.status == VideoStatus::Finished
    );
}

#[tokio::test]
async fn completing_unknown_session_is_not_found() {
    let store = VideoStore::new(common::setup_db().await);
    assert_eq!(
        store.complete("cs_nobody", Outcome::Failed).await.unwrap(),
        Completion::NotFound
    );
}
