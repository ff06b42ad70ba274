//! # greeting-reel
//!
//! Backend for personalised character greeting videos. A customer picks a
//! character, writes a message and pays through a hosted Stripe checkout.
//! A webhook records the paid order and triggers an external rendering
//! workflow; the customer's page polls for status and finally plays the
//! video through a signed-URL streaming proxy.
//!
//! ## Components
//!
//! - [`rate_limit`]: fixed-window per-IP limiter persisted with Sea-ORM
//! - [`validation`]: input sanitizing and the message plausibility filter
//! - [`stripe`]: checkout sessions, payment intents, webhook signatures
//! - [`videos`]: order rows with idempotent creation and monotonic status
//! - [`storage`]: signed URL issuance for rendered videos
//! - [`automation`]: render trigger and callback authentication
//! - [`routes`]: the axum HTTP surface
//!
//! ## Running
//!
//! ```no_run
//! use greeting_reel::{config::Config, serve};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = Config::from_env()?;
//! serve(config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Embedding the router
//!
//! ```no_run
//! use greeting_reel::{config::Config, routes::router, state::AppState};
//! use sea_orm::Database;
//!
//! # async fn example(config: Config) -> Result<(), Box<dyn std::error::Error>> {
//! let conn = Database::connect(&config.database_url).await?;
//! let app = router(AppState::new(config, conn, reqwest::Client::new()));
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use sea_orm::{ConnectOptions, Database};
use tokio::{net::TcpListener, signal};
use tracing::info;

pub mod analytics;
pub mod automation;
pub mod config;
pub mod entity;
pub mod error;
#[cfg(feature = "migration")]
pub mod migration;
pub mod rate_limit;
pub mod request;
pub mod routes;
pub mod state;
pub mod storage;
pub mod stripe;
pub mod validation;
pub mod videos;

use config::Config;
use state::AppState;

/// Connects to the database, applies migrations and serves until Ctrl+C or
/// SIGTERM.
pub async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Connecting to database");

    let mut opt = ConnectOptions::new(config.database_url.clone());
    opt.max_connections(10)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(10))
        .max_lifetime(Duration::from_secs(10 * 60))
        .sqlx_logging(false);

    let conn = Database::connect(opt).await?;

    #[cfg(feature = "migration")]
    {
        use sea_orm_migration::MigratorTrait;

        migration::Migrator::up(&conn, None).await?;
        info!("Migrations applied");
    }

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let address = format!("0.0.0.0:{}", config.port);
    let app = routes::router(AppState::new(config, conn, http));

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
