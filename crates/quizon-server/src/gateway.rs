//! The authentication boundary: payload extraction and verification.
//!
//! [`extract_init_data`] looks for the raw payload in four transport
//! locations, first non-empty wins; [`AuthGateway::authenticate`] runs the
//! verifier and parser against the injected bot token.  Both are free of
//! side effects beyond logging, so a handler may call them repeatedly.

use std::collections::HashMap;

use axum::http::{header, HeaderMap};
use chrono::Duration;
use tracing::debug;

use quizon_shared::{verify_and_parse, AuthError, VerifiedInitData};

/// Verifies raw init-data payloads against the bot token configured at
/// startup.
pub struct AuthGateway {
    bot_token: Option<String>,
    max_age: Duration,
}

impl AuthGateway {
    /// `bot_token` is injected here once; `None` means every attempt
    /// answers with a configuration error (fail closed, never open).
    pub fn new(bot_token: Option<String>, max_age_secs: i64) -> Self {
        Self {
            bot_token,
            max_age: Duration::seconds(max_age_secs),
        }
    }

    /// Verify and parse one raw payload.
    ///
    /// Verifier and parser failures propagate unchanged in kind.
    pub fn authenticate(&self, payload: &str) -> Result<VerifiedInitData, AuthError> {
        let token = self
            .bot_token
            .as_deref()
            .ok_or_else(|| AuthError::Configuration("bot token not configured".to_string()))?;

        let data = verify_and_parse(payload, token, self.max_age)?;

        debug!(
            auth_date = %data.auth_date,
            user_id = data.user.as_ref().map(|u| u.id),
            "init data verified"
        );
        Ok(data)
    }
}

/// Pull the raw init-data payload out of a request.
///
/// Precedence: `Authorization: tma <payload>` header, then the
/// `X-Telegram-Init-Data` header, then an `initData`/`init_data` JSON body
/// field, then an `initData`/`init_data` query parameter.
pub fn extract_init_data(
    headers: &HeaderMap,
    query: &HashMap<String, String>,
    body: Option<&serde_json::Value>,
) -> Option<String> {
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        if let Some(payload) = auth.strip_prefix("tma ") {
            if !payload.is_empty() {
                return Some(payload.to_string());
            }
        }
    }

    if let Some(payload) = headers
        .get("x-telegram-init-data")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
    {
        return Some(payload.to_string());
    }

    if let Some(body) = body {
        for key in ["initData", "init_data"] {
            if let Some(payload) = body.get(key).and_then(|value| value.as_str()) {
                if !payload.is_empty() {
                    return Some(payload.to_string());
                }
            }
        }
    }

    for key in ["initData", "init_data"] {
        if let Some(payload) = query.get(key) {
            if !payload.is_empty() {
                return Some(payload.clone());
            }
        }
    }

    None
}
