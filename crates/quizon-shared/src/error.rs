use thiserror::Error;

/// Flat taxonomy of authentication failures.
///
/// Verifier and parser errors propagate unchanged in kind all the way to
/// the HTTP boundary; nothing re-wraps them into a different variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No payload in any of the accepted transport locations.
    #[error("Telegram init data is required for authentication")]
    MissingInitData,

    /// The payload carries no `hash` field.
    #[error("Signature is missing")]
    SignatureMissing,

    /// The `hash` field does not match the recomputed HMAC.
    #[error("Signature is invalid")]
    SignatureInvalid,

    /// `auth_date` is absent or not a valid Unix timestamp.
    #[error("Authentication date is invalid or missing")]
    AuthDateInvalid,

    /// The payload is older than the accepted maximum age.
    #[error("Init data has expired")]
    Expired,

    /// The `user` field is present but not valid JSON for an identity.
    #[error("Malformed user data: {0}")]
    MalformedUserData(String),

    /// The server is missing required configuration (e.g. bot token).
    #[error("Server configuration error: {0}")]
    Configuration(String),

    /// Concurrent write conflict in the store; retried internally and only
    /// surfaced when the retry itself fails.
    #[error("Storage conflict")]
    StorageConflict,

    /// Anything else.  The message is kept for logs.
    #[error("{0}")]
    Unknown(String),
}

impl AuthError {
    /// Wire code reported in the `type` field of HTTP error bodies.
    ///
    /// `MissingInitData` deliberately maps to `SIGNATURE_MISSING`: clients
    /// already key their messaging off that code for the no-payload case.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingInitData | AuthError::SignatureMissing => "SIGNATURE_MISSING",
            AuthError::SignatureInvalid => "SIGNATURE_INVALID",
            AuthError::AuthDateInvalid => "AUTH_DATE_INVALID",
            AuthError::Expired => "EXPIRED",
            AuthError::MalformedUserData(_) => "MALFORMED_USER_DATA",
            AuthError::Configuration(_) | AuthError::StorageConflict | AuthError::Unknown(_) => {
                "UNKNOWN"
            }
        }
    }

    /// True for failures of the signed-payload check itself, i.e. the ones
    /// an HTTP boundary should answer with 401 rather than 500.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            AuthError::Configuration(_) | AuthError::StorageConflict | AuthError::Unknown(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_are_stable() {
        assert_eq!(AuthError::MissingInitData.code(), "SIGNATURE_MISSING");
        assert_eq!(AuthError::SignatureMissing.code(), "SIGNATURE_MISSING");
        assert_eq!(AuthError::SignatureInvalid.code(), "SIGNATURE_INVALID");
        assert_eq!(AuthError::AuthDateInvalid.code(), "AUTH_DATE_INVALID");
        assert_eq!(AuthError::Expired.code(), "EXPIRED");
        assert_eq!(
            AuthError::MalformedUserData("x".into()).code(),
            "MALFORMED_USER_DATA"
        );
        assert_eq!(AuthError::Configuration("x".into()).code(), "UNKNOWN");
        assert_eq!(AuthError::Unknown("x".into()).code(), "UNKNOWN");
    }

    #[test]
    fn rejections_vs_server_faults() {
        assert!(AuthError::SignatureInvalid.is_rejection());
        assert!(AuthError::Expired.is_rejection());
        assert!(AuthError::MissingInitData.is_rejection());
        assert!(!AuthError::Configuration("no token".into()).is_rejection());
        assert!(!AuthError::Unknown("db".into()).is_rejection());
    }
}
