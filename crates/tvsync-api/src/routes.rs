use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use axum::http::{HeaderMap, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tvsync_core::is_valid_user_id;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::store::KvStore;

pub struct AppState<S> {
    pub config: Arc<AppConfig>,
    store: Arc<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KvStore> AppState<S> {
    pub fn new(config: Arc<AppConfig>, store: S) -> Self {
        Self {
            config,
            store: Arc::new(store),
        }
    }
}

pub fn app_router<S: KvStore>(state: AppState<S>) -> Router {
    let sync_path = state.config.sync_path.clone();
    Router::new()
        .route("/healthz", get(healthz))
        .route(&sync_path, any(user_sync::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Headers carried by every sync response, errors included.
pub fn cors_headers() -> [(HeaderName, &'static str); 3] {
    [
        (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
        (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
    ]
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
    })
}

async fn user_sync<S: KvStore>(
    State(state): State<AppState<S>>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    // Preflight requests never carry the identifier.
    if method == Method::OPTIONS {
        return Ok((StatusCode::NO_CONTENT, cors_headers()).into_response());
    }

    let user_id = query.get("userId").map_or("", String::as_str);
    if !is_valid_user_id(user_id) {
        return Err(AppError::bad_request("Invalid user id"));
    }
    let key = state.config.storage_key(user_id);

    match method {
        Method::GET => load(&state, &key, user_id).await,
        Method::POST => save(&state, &key, user_id, &headers, &body).await,
        _ => Err(AppError::MethodNotAllowed),
    }
}

async fn load<S: KvStore>(
    state: &AppState<S>,
    key: &str,
    user_id: &str,
) -> Result<Response, AppError> {
    let stored = state
        .store
        .get(key)
        .await
        .map_err(|error| AppError::storage("Failed to load data", error))?;
    let Some(raw) = stored else {
        return Err(AppError::not_found("No sync data found"));
    };

    let data: Value = serde_json::from_slice(&raw).map_err(|error| {
        tracing::error!(user_id, %error, "Stored sync document is not valid JSON");
        AppError::internal("Failed to load data")
    })?;
    if data.is_null() {
        return Err(AppError::not_found("No sync data found"));
    }

    tracing::debug!(user_id, bytes = raw.len(), "Loaded sync data");
    Ok(json_response(json!({ "success": true, "data": data })))
}

async fn save<S: KvStore>(
    state: &AppState<S>,
    key: &str,
    user_id: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, AppError> {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"));
    if !is_json {
        return Err(AppError::bad_request("JSON body required"));
    }

    let Ok(Value::Object(mut data)) = serde_json::from_slice::<Value>(body) else {
        return Err(AppError::bad_request("Invalid data format"));
    };
    data.insert(
        "lastSyncTime".to_string(),
        json!(Utc::now().timestamp_millis()),
    );

    let bytes = serde_json::to_vec(&data)
        .map_err(|error| AppError::internal(format!("Failed to encode data: {error}")))?;
    let size = bytes.len();
    state
        .store
        .put(key, bytes)
        .await
        .map_err(|error| AppError::storage("Failed to save data", error))?;

    // Each identifier keeps exactly one document; this replaces any previous one.
    tracing::info!(user_id, bytes = size, "Stored sync data");
    Ok(json_response(
        json!({ "success": true, "message": "Data synced successfully" }),
    ))
}

fn json_response(body: Value) -> Response {
    (StatusCode::OK, cors_headers(), Json(body)).into_response()
}
