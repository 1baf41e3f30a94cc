use super::{shutdown::Shutdown, types::ErrorResponse};
use crate::{
    config::BridgeConfig,
    error::UpstreamError,
    upstream::{ChatCoreClient, ConversationRecord, CreateConversationRequest},
};
use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<dyn ChatCoreClient>,
    pub bridge: BridgeConfig,
    pub shutdown: Arc<Shutdown>,
}

impl AppState {
    pub fn new(
        upstream: Arc<dyn ChatCoreClient>,
        bridge: BridgeConfig,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        Self {
            upstream,
            bridge,
            shutdown,
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn upstream_failure(err: UpstreamError, not_found: &str, failure: &str) -> ApiError {
    if err.is_not_found() {
        warn!("chat-core reported not found: {}", err);
        (StatusCode::NOT_FOUND, Json(ErrorResponse::new(not_found)))
    } else {
        error!("chat-core call failed: {}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(failure)),
        )
    }
}

pub async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<Vec<ConversationRecord>>, ApiError> {
    state
        .upstream
        .list_conversations()
        .await
        .map(Json)
        .map_err(|e| upstream_failure(e, "Conversations not found", "Failed to fetch conversations"))
}

pub async fn create_conversation(
    State(state): State<AppState>,
    payload: Result<Json<CreateConversationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ConversationRecord>), ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Invalid create conversation body: {}", rejection.body_text());
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid request body")),
        )
    })?;

    info!("Creating conversation '{}' on model {}", request.title, request.model_name);

    state
        .upstream
        .create_conversation(request)
        .await
        .map(|conversation| (StatusCode::CREATED, Json(conversation)))
        .map_err(|e| upstream_failure(e, "Conversation not found", "Failed to create conversation"))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationRecord>, ApiError> {
    state
        .upstream
        .get_conversation(&id)
        .await
        .map(Json)
        .map_err(|e| upstream_failure(e, "Conversation not found", "Failed to fetch conversation"))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .upstream
        .delete_conversation(&id)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|e| upstream_failure(e, "Conversation not found", "Failed to delete conversation"))
}

pub async fn health() -> &'static str {
    "OK"
}
