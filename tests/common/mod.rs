#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body, Bytes},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use chrono::Utc;
use greeting_reel::{
    config::Config,
    entity::{analytics_event, page_view, rate_limit, video},
    routes::router,
    state::AppState,
};
use hmac::{Hmac, Mac};
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema, Set,
};
use sha2::Sha256;
use tower::ServiceExt;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_integration";
pub const AUTOMATION_SECRET: &str = "render-secret";

/// Fresh in-memory SQLite database with every table created.
pub async fn setup_db() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);

    let conn = Database::connect(opt).await.expect("sqlite connects");
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);

    let tables = [
        schema.create_table_from_entity(rate_limit::Entity),
        schema.create_table_from_entity(video::Entity),
        schema.create_table_from_entity(analytics_event::Entity),
        schema.create_table_from_entity(page_view::Entity),
    ];

    for table in &tables {
        conn.execute(backend.build(table)).await.expect("table created");
    }

    conn
}

/// Configuration pointing every external service at `upstream`.
pub fn config(upstream: &str, automation_url: Option<String>) -> Config {
    Config {
        port: 0,
        database_url: "sqlite::memory:".into(),
        public_url: "https://greetings.test".into(),
        stripe_secret_key: "sk_test_integration".into(),
        stripe_webhook_secret: WEBHOOK_SECRET.into(),
        stripe_api_base: upstream.into(),
        supabase_url: upstream.into(),
        supabase_service_key: "service-key".into(),
        storage_bucket: "videos".into(),
        signed_url_ttl_secs: 3600,
        automation_url,
        automation_secret: AUTOMATION_SECRET.into(),
        price_cents: 399,
        currency: "usd".into(),
    }
}

pub async fn app(upstream: &str, automation_url: Option<String>) -> (Router, DatabaseConnection) {
    let conn = setup_db().await;
    let state = AppState::new(config(upstream, automation_url), conn.clone(), reqwest::Client::new());
    (router(state), conn)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("json body")
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.expect("infallible router");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");

    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn stripe_signature(payload: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

pub async fn insert_video(
    conn: &DatabaseConnection,
    session_id: &str,
    status: video::VideoStatus,
    video_url: Option<&str>,
) -> video::Model {
    video::ActiveModel {
        id: Set(Uuid::new_v4()),
        session_id: Set(session_id.into()),
        message: Set("Happy birthday to the best friend anyone could ask for!".into()),
        character: Set("santa-claus".into()),
        email: Set("buyer@example.com".into()),
        status: Set(status),
        video_url: Set(video_url.map(str::to_string)),
        expires_at: Set(None),
        ip_address: Set(None),
        user_agent: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await
    .expect("video inserted")
}
