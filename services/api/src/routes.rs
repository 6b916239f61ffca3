use crate::infra::{AppDispatcher, AppState, ConversationLocks, OutboxChannel, OutboxEntry};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use courier_intake::workflows::intake::{DispatchOutcome, Submitter, UserId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub(crate) struct ConversationState {
    dispatcher: Arc<AppDispatcher>,
    outbox: Arc<OutboxChannel>,
    locks: Arc<ConversationLocks>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageRequest {
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CallbackRequest {
    pub(crate) data: String,
    #[serde(default)]
    pub(crate) username: Option<String>,
}

/// Result of one inbound directive plus everything queued for the caller while handling it.
#[derive(Debug, Serialize)]
pub(crate) struct ConversationResponse {
    pub(crate) outcome: DispatchOutcome,
    pub(crate) deliveries: Vec<OutboxEntry>,
}

pub(crate) fn conversation_router(
    dispatcher: Arc<AppDispatcher>,
    outbox: Arc<OutboxChannel>,
) -> Router {
    Router::new()
        .route(
            "/api/v1/conversations/:user_id/messages",
            post(message_endpoint),
        )
        .route(
            "/api/v1/conversations/:user_id/callbacks",
            post(callback_endpoint),
        )
        .route("/api/v1/outbox/:user_id", get(outbox_endpoint))
        .with_state(ConversationState {
            dispatcher,
            outbox,
            locks: Arc::new(ConversationLocks::default()),
        })
}

pub(crate) fn with_conversation_routes(
    dispatcher: Arc<AppDispatcher>,
    outbox: Arc<OutboxChannel>,
) -> Router {
    conversation_router(dispatcher, outbox)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn message_endpoint(
    State(state): State<ConversationState>,
    Path(user_id): Path<i64>,
    Json(payload): Json<MessageRequest>,
) -> Json<ConversationResponse> {
    let sender = Submitter::new(UserId(user_id), payload.username);
    let _turn = state.locks.acquire(sender.user_id).await;
    let outcome = state.dispatcher.handle_text(&sender, &payload.text).await;
    debug!(user = %sender.user_id, ?outcome, "message handled");
    Json(ConversationResponse {
        outcome,
        deliveries: state.outbox.drain(sender.user_id),
    })
}

async fn callback_endpoint(
    State(state): State<ConversationState>,
    Path(user_id): Path<i64>,
    Json(payload): Json<CallbackRequest>,
) -> Json<ConversationResponse> {
    let sender = Submitter::new(UserId(user_id), payload.username);
    let _turn = state.locks.acquire(sender.user_id).await;
    let outcome = state.dispatcher.handle_callback(&sender, &payload.data).await;
    debug!(user = %sender.user_id, ?outcome, "callback handled");
    Json(ConversationResponse {
        outcome,
        deliveries: state.outbox.drain(sender.user_id),
    })
}

async fn outbox_endpoint(
    State(state): State<ConversationState>,
    Path(user_id): Path<i64>,
) -> Json<Vec<OutboxEntry>> {
    Json(state.outbox.drain(UserId(user_id)))
}
