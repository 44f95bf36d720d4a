//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server can start with zero
//! configuration for local development -- except the bot token, which has
//! no safe default.  The token is read exactly once here and handed to the
//! [`crate::gateway::AuthGateway`] constructor; nothing in the verification
//! path reads ambient environment state.

use std::net::SocketAddr;
use std::path::PathBuf;

use quizon_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_MAX_AGE_SECS};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.  `None` uses the platform data directory.
    /// Env: `DATABASE_PATH`
    pub database_path: Option<PathBuf>,

    /// The Telegram bot token used to derive the init-data signing secret.
    /// Env: `TELEGRAM_BOT_TOKEN`
    /// Default: unset -- every authentication answers with a
    /// configuration error until it is provided.
    pub bot_token: Option<String>,

    /// Maximum accepted age of a signed payload, in seconds.
    /// Env: `INIT_DATA_MAX_AGE_SECS`
    /// Default: `86400` (one day).
    pub max_age_secs: i64,

    /// Requests per second refill rate for the per-IP rate limiter.
    /// Env: `RATE_LIMIT_PER_SEC`
    pub rate_limit_per_sec: f64,

    /// Burst capacity for the per-IP rate limiter.
    /// Env: `RATE_LIMIT_BURST`
    pub rate_limit_burst: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            bot_token: None,
            max_age_secs: DEFAULT_MAX_AGE_SECS,
            rate_limit_per_sec: 10.0,
            rate_limit_burst: 30.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            match addr.parse() {
                Ok(addr) => config.http_addr = addr,
                Err(e) => tracing::warn!(%addr, error = %e, "ignoring invalid HTTP_ADDR"),
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.database_path = Some(PathBuf::from(path));
        }

        match std::env::var("TELEGRAM_BOT_TOKEN") {
            Ok(token) if !token.is_empty() => config.bot_token = Some(token),
            _ => tracing::warn!(
                "TELEGRAM_BOT_TOKEN is not set; authentication will fail until it is provided"
            ),
        }

        if let Ok(secs) = std::env::var("INIT_DATA_MAX_AGE_SECS") {
            match secs.parse() {
                Ok(secs) => config.max_age_secs = secs,
                Err(e) => tracing::warn!(%secs, error = %e, "ignoring invalid INIT_DATA_MAX_AGE_SECS"),
            }
        }

        if let Ok(rate) = std::env::var("RATE_LIMIT_PER_SEC") {
            if let Ok(rate) = rate.parse() {
                config.rate_limit_per_sec = rate;
            }
        }

        if let Ok(burst) = std::env::var("RATE_LIMIT_BURST") {
            if let Ok(burst) = burst.parse() {
                config.rate_limit_burst = burst;
            }
        }

        config
    }
}
