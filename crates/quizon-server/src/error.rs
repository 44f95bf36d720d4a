use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use quizon_shared::AuthError;
use quizon_store::StoreError;

/// Errors a request handler can answer with.
///
/// Auth-taxonomy failures pass through with their original kind; the wire
/// body always carries `{ error, message, type }` so clients can pick a
/// tailored message from `type` without parsing prose.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error, message, kind) = match &self {
            ServerError::Auth(AuthError::MissingInitData) => (
                StatusCode::UNAUTHORIZED,
                "Missing init data",
                self.to_string(),
                AuthError::MissingInitData.code(),
            ),
            ServerError::Auth(auth) if auth.is_rejection() => (
                StatusCode::UNAUTHORIZED,
                "Invalid init data",
                auth.to_string(),
                auth.code(),
            ),
            ServerError::Auth(auth) => {
                // Configuration / unknown failures: the detail goes to the
                // logs, not to the client.
                tracing::error!(error = %auth, "authentication failed server-side");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server configuration error",
                    "Failed to validate authentication".to_string(),
                    auth.code(),
                )
            }
            ServerError::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                "Invalid request",
                self.to_string(),
                "UNKNOWN",
            ),
            ServerError::UserNotFound => (
                StatusCode::NOT_FOUND,
                "User not found",
                self.to_string(),
                "UNKNOWN",
            ),
            ServerError::Storage(store) => {
                tracing::error!(error = %store, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    "Internal server error".to_string(),
                    "UNKNOWN",
                )
            }
        };

        let body = serde_json::json!({
            "error": error,
            "message": message,
            "type": kind,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_rejections_map_to_401() {
        for err in [
            AuthError::MissingInitData,
            AuthError::SignatureMissing,
            AuthError::SignatureInvalid,
            AuthError::AuthDateInvalid,
            AuthError::Expired,
            AuthError::MalformedUserData("bad".into()),
        ] {
            let response = ServerError::Auth(err).into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn server_faults_map_to_500() {
        let response = ServerError::Auth(AuthError::Configuration("no token".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = ServerError::Storage(StoreError::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn not_found_maps_to_404() {
        let response = ServerError::UserNotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
