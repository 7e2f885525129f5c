//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use auth::{AuthAppState, MemoryCredentialStore, PgCredentialStore, auth_router, auth_router_generic};
use axum::{
    Json, Router,
    http::{self, Method, header},
    routing::get,
};
use platform::rate_limit::{InMemoryRateLimitStore, now_ms};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,auth=info,platform=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("invalid server configuration")?;
    tracing::info!(
        environment = ?config.auth.environment,
        fail_mode = ?config.auth.fail_mode,
        port = config.port,
        "Configuration loaded"
    );

    if config.ephemeral_secret {
        tracing::warn!(
            "AUTH_TOKEN_SECRET not set, using a random secret; sessions end on restart"
        );
    }

    // Rate limit state lives in-process; the sweeper keeps it bounded
    let limiter = Arc::new(InMemoryRateLimitStore::new());
    spawn_rate_limit_sweeper(limiter.clone(), config.auth.rate_limits.window);

    let auth_routes = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;

            tracing::info!("Connected to database");

            sqlx::migrate!("../../../database/migrations")
                .run(&pool)
                .await?;

            tracing::info!("Migrations completed");

            auth_router(PgCredentialStore::new(pool), limiter, config.auth.clone())?
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory credential store");
            let state = AuthAppState::new(
                Arc::new(MemoryCredentialStore::new()),
                limiter,
                config.auth.clone(),
            )?;
            auth_router_generic(state)
        }
    };

    // CORS configuration
    let allowed_origins: Vec<http::HeaderValue> = config
        .frontend_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([header::CONTENT_TYPE, header::ACCEPT]))
        .allow_credentials(true);

    // Build router; /health is outside admission so health checks are never limited
    let app = Router::new()
        .route("/health", get(health))
        .nest("/api/auth", auth_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn spawn_rate_limit_sweeper(limiter: Arc<InMemoryRateLimitStore>, window: std::time::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(window);
        loop {
            interval.tick().await;
            let removed = limiter.cleanup_expired(now_ms(), window);
            if removed > 0 {
                tracing::debug!(removed, tracked = limiter.len(), "Rate limit sweep");
            }
        }
    });
}
