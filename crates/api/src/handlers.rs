use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::Json,
};
use stakewatch_notifier::{Notifier, Notify};
use stakewatch_storage::KeyValueStorage;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info};

use crate::types::*;

pub struct ApiState {
    pub notifier: Arc<Notifier>,
    pub storage: Arc<dyn KeyValueStorage>,
    /// Held across a channel change and the write that records it.
    changes: Mutex<()>,
}

type ApiResult = Result<Json<ApiResponse>, (StatusCode, Json<ApiResponse>)>;

fn reject(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ApiResponse>) {
    (status, Json(ApiResponse::error(message)))
}

impl ApiState {
    pub fn new(notifier: Arc<Notifier>, storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            notifier,
            storage,
            changes: Mutex::new(()),
        }
    }

    /// Applies `change` and persists the resulting channel list under one lock,
    /// so the last write always matches the last change.
    ///
    /// A failed write is only logged; the in-memory change stands.
    fn change_channels<T, E>(&self, change: impl FnOnce(&Notifier) -> Result<T, E>) -> Result<T, E> {
        let _guard = self.changes.lock().unwrap_or_else(PoisonError::into_inner);
        let result = change(&self.notifier)?;
        if let Err(e) = self.notifier.persist(self.storage.as_ref()) {
            error!(error = %e, "failed to persist channels");
        }
        Ok(result)
    }
}

pub async fn add_chat_group(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<AddChatGroupRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload.map_err(|e| reject(StatusCode::BAD_REQUEST, e.body_text()))?;

    state
        .change_channels(|notifier| notifier.register_telegram(request.token, request.chat_id))
        .map_err(|e| reject(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    info!(chat_id = request.chat_id, "chat group added");
    Ok(Json(ApiResponse::ok()))
}

pub async fn remove_chat_group(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<RemoveChatGroupQuery>,
) -> ApiResult {
    let raw = query
        .chat_id
        .ok_or_else(|| reject(StatusCode::BAD_REQUEST, "missing chat_id"))?;
    let chat_id = raw
        .parse()
        .map_err(|_| reject(StatusCode::BAD_REQUEST, format!("invalid chat_id: {}", raw)))?;

    state
        .change_channels(|notifier| notifier.unregister_channel(chat_id))
        .map_err(|e| reject(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    info!(chat_id, "chat group removed");
    Ok(Json(ApiResponse::ok()))
}

pub async fn health_check(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let channels = state.notifier.len();
    let status = if channels > 0 { "healthy" } else { "degraded" };
    Json(HealthResponse {
        status: status.to_string(),
        channels,
    })
}
