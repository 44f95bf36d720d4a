//! # quizon-server
//!
//! API server for the Quizon Telegram mini-app.
//!
//! This binary provides:
//! - **Init-data authentication**: HMAC verification of Telegram WebApp
//!   launch payloads against the configured bot token
//! - **Identity reconciliation**: find-or-create of player records keyed
//!   on the Telegram user id
//! - **REST API** (axum) for login, profile lookup/patch, economy
//!   mutations and the leaderboard
//! - **Per-IP rate limiting** to protect against abuse

mod api;
mod config;
mod error;
mod gateway;
mod rate_limit;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use quizon_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::gateway::AuthGateway;
use crate::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,quizon_server=debug")),
        )
        .init();

    info!("Starting Quizon API server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        http_addr = %config.http_addr,
        max_age_secs = config.max_age_secs,
        bot_token_configured = config.bot_token.is_some(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Open the user store
    // -----------------------------------------------------------------------
    let db = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };

    // -----------------------------------------------------------------------
    // 4. Assemble state and serve
    // -----------------------------------------------------------------------
    let gateway = AuthGateway::new(config.bot_token.clone(), config.max_age_secs);
    let rate_limiter = RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst);

    let state = AppState {
        db: Arc::new(Mutex::new(db)),
        gateway: Arc::new(gateway),
        rate_limiter,
    };

    let router = api::build_router(state);
    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, "HTTP API listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
