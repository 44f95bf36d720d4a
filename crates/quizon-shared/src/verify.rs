//! HMAC-SHA256 verification of Telegram WebApp init data.
//!
//! The algorithm is fixed by Telegram: the signing secret is
//! `HMAC-SHA256(key = "WebAppData", msg = bot_token)`; the check-string is
//! every decoded `key=value` pair except `hash`, sorted lexicographically
//! by key and joined with `\n`; the payload's `hash` must equal the hex
//! HMAC-SHA256 of the check-string under that secret.
//!
//! Verification is a pure function of its inputs.  The comparison goes
//! through [`Mac::verify_slice`], which is constant-time.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::constants::WEB_APP_DATA_KEY;
use crate::error::AuthError;
use crate::init_data::{self, VerifiedInitData};

type HmacSha256 = Hmac<Sha256>;

/// Verify `raw` against `bot_token` and parse it in one step.
///
/// This is the only way to obtain a [`VerifiedInitData`]; the parser is
/// crate-private so the "verified" label cannot be attached to unverified
/// input.
pub fn verify_and_parse(
    raw: &str,
    bot_token: &str,
    max_age: Duration,
) -> Result<VerifiedInitData, AuthError> {
    verify_at(raw, bot_token, max_age, Utc::now())?;
    init_data::parse(raw)
}

/// [`verify_and_parse`] with an explicit clock, for deterministic tests.
pub fn verify_and_parse_at(
    raw: &str,
    bot_token: &str,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Result<VerifiedInitData, AuthError> {
    verify_at(raw, bot_token, max_age, now)?;
    init_data::parse(raw)
}

/// Signature and freshness check, no parsing.
///
/// Order of checks: `hash` presence, then the signature itself, then
/// `auth_date` presence/shape, then freshness.  Checking the signature
/// before freshness means a tampered `auth_date` reports
/// [`AuthError::SignatureInvalid`] rather than a misleading expiry.
pub fn verify_at(
    raw: &str,
    bot_token: &str,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    let pairs = init_data::decode_pairs(raw);

    let received_hash = pairs
        .iter()
        .find(|(key, _)| key == "hash")
        .map(|(_, value)| value.as_str())
        .ok_or(AuthError::SignatureMissing)?;

    let mut signed: Vec<&(String, String)> =
        pairs.iter().filter(|(key, _)| key != "hash").collect();
    signed.sort_by(|a, b| a.0.cmp(&b.0));
    let check_string = signed
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n");

    let received = hex::decode(received_hash).map_err(|_| AuthError::SignatureInvalid)?;
    let mut mac = keyed_mac(&derive_secret(bot_token));
    mac.update(check_string.as_bytes());
    mac.verify_slice(&received)
        .map_err(|_| AuthError::SignatureInvalid)?;

    let auth_date = pairs
        .iter()
        .find(|(key, _)| key == "auth_date")
        .map(|(_, value)| init_data::parse_auth_date(value))
        .ok_or(AuthError::AuthDateInvalid)??;

    if now - auth_date > max_age {
        return Err(AuthError::Expired);
    }

    Ok(())
}

/// Sign a set of decoded fields the way Telegram would, producing a full
/// URL-encoded payload with a trailing `hash` pair.
///
/// The application never signs payloads in production; this is the
/// counterpart used by tests and local tooling.
pub fn sign_init_data(fields: &[(&str, &str)], bot_token: &str) -> String {
    let mut sorted = fields.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let check_string = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n");

    let mut mac = keyed_mac(&derive_secret(bot_token));
    mac.update(check_string.as_bytes());
    let hash = hex::encode(mac.finalize().into_bytes());

    let mut encoded: Vec<String> = fields
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect();
    encoded.push(format!("hash={hash}"));
    encoded.join("&")
}

/// `HMAC-SHA256(key = "WebAppData", msg = bot_token)`
fn derive_secret(bot_token: &str) -> [u8; 32] {
    let mut mac = keyed_mac(WEB_APP_DATA_KEY);
    mac.update(bot_token.as_bytes());
    mac.finalize().into_bytes().into()
}

fn keyed_mac(key: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length")
}
