//! Typed representation of a Telegram WebApp init-data payload.
//!
//! The raw payload is a URL-encoded sequence of `key=value` pairs.  The
//! parser in this module only runs after the HMAC check in [`crate::verify`]
//! has passed; the single public entry point [`crate::verify_and_parse`]
//! guarantees that no [`VerifiedInitData`] is ever built from unverified
//! input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// The identity embedded in the `user` field, exactly as Telegram
/// serializes it (snake_case JSON, all fields but `id` and `first_name`
/// optional).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TelegramIdentity {
    pub id: i64,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_premium: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl TelegramIdentity {
    /// Build an identity from a chat message sender (bot surface).
    ///
    /// This is the unsigned, lower-trust path: the bot trusts Telegram's
    /// own transport authenticity and never goes through the HMAC check.
    /// It must not be mixed up with the signed WebApp path.
    pub fn from_chat_sender(
        id: i64,
        first_name: impl Into<String>,
        last_name: Option<String>,
        username: Option<String>,
    ) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name,
            username,
            language_code: None,
            is_premium: None,
            photo_url: None,
        }
    }
}

/// A payload whose signature check has passed.
///
/// Only [`crate::verify_and_parse`] constructs this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedInitData {
    /// Instant the payload was signed by Telegram.
    pub auth_date: DateTime<Utc>,
    /// Opaque per-launch session token, when present.
    pub query_id: Option<String>,
    /// The launching user's identity, when present.
    pub user: Option<TelegramIdentity>,
    /// The received hash, kept for audit and debug logging only.
    pub hash: String,
    /// Chat context passthrough fields.
    pub chat_type: Option<String>,
    pub chat_instance: Option<String>,
}

/// Split the raw payload into decoded `(key, value)` pairs, preserving
/// order and duplicates.
pub(crate) fn decode_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(component: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(component.as_bytes())).into_owned()
}

/// Turn a verified raw payload into [`VerifiedInitData`].
///
/// Malformed JSON under `user` is its own failure kind
/// ([`AuthError::MalformedUserData`]), distinct from any signature failure.
pub(crate) fn parse(raw: &str) -> Result<VerifiedInitData, AuthError> {
    let mut auth_date = None;
    let mut query_id = None;
    let mut user = None;
    let mut hash = None;
    let mut chat_type = None;
    let mut chat_instance = None;

    for (key, value) in decode_pairs(raw) {
        match key.as_str() {
            "auth_date" => auth_date = Some(parse_auth_date(&value)?),
            "query_id" => query_id = Some(value),
            "user" => {
                let identity: TelegramIdentity = serde_json::from_str(&value)
                    .map_err(|e| AuthError::MalformedUserData(e.to_string()))?;
                user = Some(identity);
            }
            "hash" => hash = Some(value),
            "chat_type" => chat_type = Some(value),
            "chat_instance" => chat_instance = Some(value),
            _ => {}
        }
    }

    Ok(VerifiedInitData {
        auth_date: auth_date.ok_or(AuthError::AuthDateInvalid)?,
        query_id,
        user,
        hash: hash.ok_or(AuthError::SignatureMissing)?,
        chat_type,
        chat_instance,
    })
}

/// Decode `auth_date` into an absolute instant.  Keeping it as a raw
/// integer invites seconds-vs-millis confusion downstream.
pub(crate) fn parse_auth_date(value: &str) -> Result<DateTime<Utc>, AuthError> {
    let secs: i64 = value.parse().map_err(|_| AuthError::AuthDateInvalid)?;
    DateTime::from_timestamp(secs, 0).ok_or(AuthError::AuthDateInvalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_pairs_url_decodes_keys_and_values() {
        let pairs = decode_pairs("a=1&user=%7B%22id%22%3A42%7D&empty=");
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("user".to_string(), r#"{"id":42}"#.to_string()),
                ("empty".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn parse_extracts_user_identity() {
        let raw = "auth_date=1700000000&query_id=AAH&user=%7B%22id%22%3A42%2C%22first_name%22%3A%22Ana%22%7D&hash=abc";
        let data = parse(raw).unwrap();

        assert_eq!(data.auth_date.timestamp(), 1_700_000_000);
        assert_eq!(data.query_id.as_deref(), Some("AAH"));
        assert_eq!(data.hash, "abc");

        let user = data.user.unwrap();
        assert_eq!(user.id, 42);
        assert_eq!(user.first_name, "Ana");
        assert_eq!(user.last_name, None);
    }

    #[test]
    fn parse_rejects_malformed_user_json() {
        let raw = "auth_date=1700000000&user=%7Bnot-json&hash=abc";
        assert!(matches!(
            parse(raw),
            Err(AuthError::MalformedUserData(_))
        ));
    }

    #[test]
    fn parse_rejects_missing_or_garbage_auth_date() {
        assert_eq!(
            parse("user=%7B%22id%22%3A1%2C%22first_name%22%3A%22A%22%7D&hash=x"),
            Err(AuthError::AuthDateInvalid)
        );
        assert_eq!(
            parse("auth_date=yesterday&hash=x"),
            Err(AuthError::AuthDateInvalid)
        );
    }

    #[test]
    fn unknown_keys_are_passed_over() {
        let raw = "auth_date=1700000000&hash=abc&signature=zzz&can_send_after=10";
        let data = parse(raw).unwrap();
        assert!(data.user.is_none());
        assert!(data.chat_type.is_none());
    }

    #[test]
    fn identity_json_is_snake_case() {
        let identity: TelegramIdentity = serde_json::from_str(
            r#"{"id":7,"first_name":"Bo","language_code":"de","is_premium":true,"photo_url":"https://t.me/p.jpg"}"#,
        )
        .unwrap();
        assert_eq!(identity.language_code.as_deref(), Some("de"));
        assert_eq!(identity.is_premium, Some(true));
        assert_eq!(identity.photo_url.as_deref(), Some("https://t.me/p.jpg"));
    }
}
