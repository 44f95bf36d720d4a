//! Transport between the session context and the API server.
//!
//! [`AuthBackend`] is the seam the state machine is tested through; the
//! production implementation posts the raw init-data payload to the
//! server's login endpoint and maps the wire error taxonomy back into
//! [`AuthError`] kinds.

use std::future::Future;

use serde::Deserialize;

use quizon_shared::{AppUser, AuthError};

/// Result of a successful signed login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub user: AppUser,
    pub is_new_user: bool,
}

/// One round of authenticate-plus-reconcile against the server.
pub trait AuthBackend: Send + Sync {
    fn login(
        &self,
        init_data: &str,
    ) -> impl Future<Output = Result<LoginOutcome, AuthError>> + Send;
}

/// reqwest-backed implementation talking to `quizon-server`.
pub struct HttpAuthBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    user: AppUser,
    is_new_user: bool,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: String,
}

impl HttpAuthBackend {
    /// `base_url` without a trailing slash, e.g. `https://api.example.com`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl AuthBackend for HttpAuthBackend {
    async fn login(&self, init_data: &str) -> Result<LoginOutcome, AuthError> {
        let response = self
            .client
            .post(format!("{}/users", self.base_url))
            .header("X-Telegram-Init-Data", init_data)
            .send()
            .await
            .map_err(|e| AuthError::Unknown(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body: LoginResponse = response
                .json()
                .await
                .map_err(|e| AuthError::Unknown(e.to_string()))?;
            return Ok(LoginOutcome {
                user: body.user,
                is_new_user: body.is_new_user,
            });
        }

        // The server answers every auth failure with a typed body; an
        // unparsable body still surfaces as Unknown with the HTTP status.
        let body: ErrorBody = response.json().await.unwrap_or_default();
        if body.kind.is_empty() {
            return Err(AuthError::Unknown(format!("HTTP {status}")));
        }
        Err(error_from_wire(&body.kind, body.message))
    }
}

fn error_from_wire(kind: &str, message: String) -> AuthError {
    match kind {
        "SIGNATURE_MISSING" => AuthError::SignatureMissing,
        "SIGNATURE_INVALID" => AuthError::SignatureInvalid,
        "AUTH_DATE_INVALID" => AuthError::AuthDateInvalid,
        "EXPIRED" => AuthError::Expired,
        "MALFORMED_USER_DATA" => AuthError::MalformedUserData(message),
        _ => AuthError::Unknown(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_round_trip_to_kinds() {
        assert_eq!(
            error_from_wire("SIGNATURE_INVALID", String::new()),
            AuthError::SignatureInvalid
        );
        assert_eq!(
            error_from_wire("EXPIRED", String::new()),
            AuthError::Expired
        );
        assert_eq!(
            error_from_wire("UNKNOWN", "boom".to_string()),
            AuthError::Unknown("boom".to_string())
        );
    }

    #[test]
    fn error_body_tolerates_missing_fields() {
        let body: ErrorBody = serde_json::from_str(r#"{"error":"x"}"#).unwrap();
        assert!(body.kind.is_empty());

        let body: ErrorBody =
            serde_json::from_str(r#"{"error":"x","message":"m","type":"EXPIRED"}"#).unwrap();
        assert_eq!(body.kind, "EXPIRED");
        assert_eq!(body.message, "m");
    }
}
