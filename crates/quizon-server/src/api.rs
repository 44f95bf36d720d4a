use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method},
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use quizon_shared::{AppUser, AuthError, TelegramIdentity, UserPatch};
use quizon_store::{Database, StoreError};

use crate::error::ServerError;
use crate::gateway::{extract_init_data, AuthGateway};
use crate::rate_limit::{rate_limit_middleware, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub gateway: Arc<AuthGateway>,
    pub rate_limiter: RateLimiter,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/validate", post(auth_validate))
        .route("/users", get(users_get).post(users_post).put(users_put))
        .route("/users/leaderboard", get(users_leaderboard))
        .route("/users/:id/coins", post(users_add_coins))
        .route("/users/:id/xp", post(users_add_xp))
        .route("/users/:id/score", post(users_add_score))
        .route("/users/:id/games", post(users_record_game))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ValidateResponse {
    success: bool,
    user: Option<TelegramIdentity>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReconcileResponse {
    user: AppUser,
    is_new_user: bool,
}

#[derive(Serialize)]
struct UserResponse {
    user: AppUser,
}

#[derive(Serialize)]
struct LeaderboardResponse {
    users: Vec<AppUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsersQuery {
    user_id: Option<Uuid>,
    telegram_id: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    user_id: Uuid,
    updates: UserPatch,
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<u32>,
}

#[derive(Deserialize)]
struct AmountRequest {
    amount: i64,
}

#[derive(Deserialize)]
struct GameResultRequest {
    won: bool,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Verify a payload without touching the store.  Success returns the
/// embedded Telegram user (if any), so the client can greet before the
/// reconciliation round-trip finishes.
async fn auth_validate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Option<Json<serde_json::Value>>,
) -> Result<Json<ValidateResponse>, ServerError> {
    let payload = extract_init_data(&headers, &query, body.as_ref().map(|json| &json.0))
        .ok_or(AuthError::MissingInitData)?;

    let data = state.gateway.authenticate(&payload)?;

    Ok(Json(ValidateResponse {
        success: true,
        user: data.user,
    }))
}

/// The signed login path: authenticate, then find-or-create the player.
async fn users_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Option<Json<serde_json::Value>>,
) -> Result<Json<ReconcileResponse>, ServerError> {
    let payload = extract_init_data(&headers, &query, body.as_ref().map(|json| &json.0))
        .ok_or(AuthError::MissingInitData)?;

    let data = state.gateway.authenticate(&payload)?;
    let identity = data
        .user
        .ok_or_else(|| ServerError::BadRequest("no user data in init data".to_string()))?;

    let (user, is_new_user) = state.db.lock().await.reconcile(&identity)?;

    Ok(Json(ReconcileResponse { user, is_new_user }))
}

async fn users_get(
    State(state): State<AppState>,
    Query(query): Query<UsersQuery>,
) -> Result<Json<UserResponse>, ServerError> {
    let db = state.db.lock().await;

    let user = match (query.user_id, query.telegram_id) {
        (Some(id), _) => db.get_user(id).map_err(not_found)?,
        (None, Some(telegram_id)) => db
            .find_by_telegram_id(telegram_id)?
            .ok_or(ServerError::UserNotFound)?,
        (None, None) => {
            return Err(ServerError::BadRequest(
                "userId or telegramId is required".to_string(),
            ))
        }
    };

    Ok(Json(UserResponse { user }))
}

async fn users_put(
    State(state): State<AppState>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ServerError> {
    let user = state
        .db
        .lock()
        .await
        .patch_user(request.user_id, &request.updates)
        .map_err(not_found)?;

    Ok(Json(UserResponse { user }))
}

async fn users_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, ServerError> {
    let users = state
        .db
        .lock()
        .await
        .leaderboard(query.limit.unwrap_or(10).min(100))?;

    Ok(Json(LeaderboardResponse { users }))
}

async fn users_add_coins(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<UserResponse>, ServerError> {
    let amount = non_negative(request.amount)?;
    let user = state
        .db
        .lock()
        .await
        .add_coins(id, amount)
        .map_err(not_found)?;
    Ok(Json(UserResponse { user }))
}

async fn users_add_xp(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<UserResponse>, ServerError> {
    let amount = non_negative(request.amount)?;
    let user = state.db.lock().await.add_xp(id, amount).map_err(not_found)?;
    Ok(Json(UserResponse { user }))
}

async fn users_add_score(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<UserResponse>, ServerError> {
    let amount = non_negative(request.amount)?;
    let user = state
        .db
        .lock()
        .await
        .add_score(id, amount)
        .map_err(not_found)?;
    Ok(Json(UserResponse { user }))
}

async fn users_record_game(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<GameResultRequest>,
) -> Result<Json<UserResponse>, ServerError> {
    let user = state
        .db
        .lock()
        .await
        .update_game_stats(id, request.won)
        .map_err(not_found)?;
    Ok(Json(UserResponse { user }))
}

/// Counters only ever move forward; a negative delta is a caller bug.
fn non_negative(amount: i64) -> Result<i64, ServerError> {
    if amount < 0 {
        return Err(ServerError::BadRequest(
            "amount must be non-negative".to_string(),
        ));
    }
    Ok(amount)
}

fn not_found(err: StoreError) -> ServerError {
    match err {
        StoreError::NotFound => ServerError::UserNotFound,
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use quizon_shared::verify::sign_init_data;
    use tower::ServiceExt;

    use crate::config::ServerConfig;

    const TOKEN: &str = "T";

    fn test_state(dir: &tempfile::TempDir, bot_token: Option<&str>) -> AppState {
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        let config = ServerConfig::default();
        AppState {
            db: Arc::new(Mutex::new(db)),
            gateway: Arc::new(AuthGateway::new(
                bot_token.map(str::to_string),
                config.max_age_secs,
            )),
            rate_limiter: RateLimiter::new(1000.0, 1000.0),
        }
    }

    fn signed_payload(auth_date: i64) -> String {
        let ts = auth_date.to_string();
        sign_init_data(
            &[
                ("auth_date", ts.as_str()),
                ("user", r#"{"id":42,"first_name":"Ana"}"#),
            ],
            TOKEN,
        )
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir, Some(TOKEN)));

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn missing_payload_is_401_signature_missing() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir, Some(TOKEN)));

        let response = app
            .oneshot(Request::post("/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["type"], "SIGNATURE_MISSING");
    }

    #[tokio::test]
    async fn first_login_creates_user_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir, Some(TOKEN)));
        let raw = signed_payload(Utc::now().timestamp());

        let response = app
            .clone()
            .oneshot(
                Request::post("/users")
                    .header("x-telegram-init-data", &raw)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["isNewUser"], true);
        assert_eq!(body["user"]["telegramId"], 42);
        assert_eq!(body["user"]["firstName"], "Ana");
        assert_eq!(body["user"]["coins"], 1000);
        assert_eq!(body["user"]["xp"], 200);
        assert_eq!(body["user"]["level"], 1);
        assert_eq!(body["user"]["totalScore"], 100);

        // Second login reconciles instead of creating.
        let response = app
            .oneshot(
                Request::post("/users")
                    .header("x-telegram-init-data", &raw)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["isNewUser"], false);
        assert_eq!(body["user"]["telegramId"], 42);
    }

    #[tokio::test]
    async fn auth_validate_returns_embedded_user() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir, Some(TOKEN)));
        let raw = signed_payload(Utc::now().timestamp());

        let response = app
            .oneshot(
                Request::post("/auth/validate")
                    .header("authorization", format!("tma {raw}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["id"], 42);
    }

    #[tokio::test]
    async fn expired_payload_is_401_expired() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir, Some(TOKEN)));
        let raw = signed_payload(Utc::now().timestamp() - 100_000);

        let response = app
            .oneshot(
                Request::post("/auth/validate")
                    .header("x-telegram-init-data", &raw)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["type"], "EXPIRED");
    }

    #[tokio::test]
    async fn missing_bot_token_is_500_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir, None));
        let raw = signed_payload(Utc::now().timestamp());

        let response = app
            .oneshot(
                Request::post("/users")
                    .header("x-telegram-init-data", &raw)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["type"], "UNKNOWN");
    }

    #[tokio::test]
    async fn query_param_payload_source_works() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir, Some(TOKEN)));
        let raw = signed_payload(Utc::now().timestamp());
        let encoded = urlencoding::encode(&raw).into_owned();

        let response = app
            .oneshot(
                Request::post(format!("/users?initData={encoded}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn patch_with_economy_fields_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir, Some(TOKEN));
        let app = build_router(state.clone());

        let raw = signed_payload(Utc::now().timestamp());
        let response = app
            .clone()
            .oneshot(
                Request::post("/users")
                    .header("x-telegram-init-data", &raw)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let user_id = json_body(response).await["user"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let body = serde_json::json!({
            "userId": user_id,
            "updates": { "coins": 999_999 },
        });
        let response = app
            .oneshot(
                Request::put("/users")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn economy_routes_apply_invariants() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir, Some(TOKEN)));
        let raw = signed_payload(Utc::now().timestamp());

        let response = app
            .clone()
            .oneshot(
                Request::post("/users")
                    .header("x-telegram-init-data", &raw)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let user_id = json_body(response).await["user"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .clone()
            .oneshot(
                Request::post(format!("/users/{user_id}/xp"))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"amount":900}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["user"]["xp"], 1100);
        assert_eq!(body["user"]["level"], 2);
        assert_eq!(body["user"]["coins"], 1000 + 2 * 50);

        let response = app
            .oneshot(
                Request::post(format!("/users/{user_id}/coins"))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"amount":-5}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
