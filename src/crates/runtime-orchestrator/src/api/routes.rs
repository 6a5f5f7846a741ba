//! The Runtime RPC surface over HTTP: Trigger, InjectInput, Chat, Stop,
//! Checkpoint/RestoreCheckpoint, graph registration, and webhook ingestion.
//! `Subscribe` is served by [`crate::api::ws`] instead of a route here.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use runtime_core::{GraphSpec, SharedMemory};
use serde::{Deserialize, Serialize};

use crate::agent_runtime::AgentRuntime;
use crate::api::error::ApiError;
use crate::api::response;
use crate::triggers::verify_webhook_signature;

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<AgentRuntime>,
}

pub fn create_router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/graphs", post(load_graph))
        .route("/graphs/:graph_id", axum::routing::delete(remove_graph))
        .route("/graphs/:graph_id/active", post(set_active_graph))
        .route("/trigger", post(trigger))
        .route("/inject-input", post(inject_input))
        .route("/chat", post(chat))
        .route("/stop", post(stop))
        .route("/checkpoint", post(checkpoint))
        .route("/restore-checkpoint", post(restore_checkpoint))
        .route("/webhook/*path", post(webhook))
        .route("/events", get(crate::api::ws::handler))
        .with_state(AppState { runtime })
        .layer(crate::api::middleware::cors_layer())
        .layer(crate::api::middleware::logging_layer())
}

async fn health() -> impl axum::response::IntoResponse {
    response::ok(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct LoadGraphRequest {
    graph_id: String,
    graph_yaml: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    storage_subpath: Option<String>,
}

async fn load_graph(
    State(state): State<AppState>,
    Json(req): Json<LoadGraphRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let graph = GraphSpec::from_yaml(&req.graph_yaml).map_err(crate::error::RuntimeError::Graph)?;
    state
        .runtime
        .add_graph(req.graph_id.clone(), graph, None, req.storage_subpath, req.primary)
        .await?;
    Ok(response::created(serde_json::json!({ "graphId": req.graph_id })))
}

async fn remove_graph(State(state): State<AppState>, Path(graph_id): Path<String>) -> Result<impl axum::response::IntoResponse, ApiError> {
    state.runtime.remove_graph(&graph_id).await?;
    Ok(response::no_content())
}

async fn set_active_graph(State(state): State<AppState>, Path(graph_id): Path<String>) -> Result<impl axum::response::IntoResponse, ApiError> {
    state.runtime.set_active_graph_id(graph_id).await?;
    Ok(response::no_content())
}

#[derive(Debug, Deserialize)]
struct TriggerRequest {
    #[serde(default)]
    graph_id: Option<String>,
    entry_point_id: String,
    #[serde(default)]
    input: std::collections::HashMap<String, serde_json::Value>,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct TriggerResponse {
    execution_id: String,
    session_id: String,
}

async fn trigger(
    State(state): State<AppState>,
    Json(req): Json<TriggerRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state.runtime.mark_user_input().await;
    let handle = state
        .runtime
        .trigger(req.graph_id, &req.entry_point_id, SharedMemory(req.input), req.session_id)
        .await?;
    Ok(response::ok(TriggerResponse {
        execution_id: handle.execution_id,
        session_id: handle.session_id,
    }))
}

#[derive(Debug, Deserialize)]
struct InjectInputRequest {
    node_id: String,
    content: String,
    #[serde(default)]
    graph_id: Option<String>,
}

async fn inject_input(
    State(state): State<AppState>,
    Json(req): Json<InjectInputRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state.runtime.mark_user_input().await;
    let delivered = state.runtime.inject_input(&req.node_id, req.content, req.graph_id).await?;
    Ok(response::ok(serde_json::json!({ "delivered": delivered })))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    session_id: String,
    message: String,
    #[serde(default)]
    graph_id: Option<String>,
    /// The node id to try delivering to before falling back to a fresh
    /// trigger; the client already knows which node is client-facing.
    #[serde(default)]
    node_id: Option<String>,
    #[serde(default)]
    entry_point_id: Option<String>,
}

/// Tries `InjectInput` first (the common case: a client-facing node is
/// mid-turn and waiting); falls back to `Trigger` with the message seeded
/// into `SharedMemory` under `"message"` when nothing is waiting.
async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state.runtime.mark_user_input().await;

    if let Some(node_id) = &req.node_id {
        let delivered = state
            .runtime
            .inject_input(node_id, req.message.clone(), req.graph_id.clone())
            .await?;
        if delivered {
            return Ok(response::ok(serde_json::json!({ "mode": "injected" })));
        }
    }

    let entry_point_id = req.entry_point_id.unwrap_or_else(|| "manual".to_string());
    let mut input = SharedMemory::default();
    input.insert("message", serde_json::Value::String(req.message));
    let handle = state
        .runtime
        .trigger(req.graph_id, &entry_point_id, input, Some(req.session_id))
        .await?;
    Ok(response::ok(serde_json::json!({
        "mode": "triggered",
        "executionId": handle.execution_id,
        "sessionId": handle.session_id,
    })))
}

#[derive(Debug, Deserialize)]
struct StopRequest {
    session_id: String,
    execution_id: String,
}

async fn stop(State(state): State<AppState>, Json(req): Json<StopRequest>) -> Result<impl axum::response::IntoResponse, ApiError> {
    let stopped = state.runtime.stop(&req.session_id, &req.execution_id).await?;
    Ok(response::ok(serde_json::json!({ "stopped": stopped })))
}

#[derive(Debug, Deserialize)]
struct CheckpointRequest {
    graph_id: String,
    session_id: String,
    name: String,
}

async fn checkpoint(
    State(state): State<AppState>,
    Json(req): Json<CheckpointRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state.runtime.checkpoint(&req.graph_id, &req.session_id, &req.name).await?;
    Ok(response::no_content())
}

async fn restore_checkpoint(
    State(state): State<AppState>,
    Json(req): Json<CheckpointRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let session = state.runtime.restore_checkpoint(&req.graph_id, &req.session_id, &req.name).await?;
    Ok(response::ok(session))
}

async fn webhook(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl axum::response::IntoResponse, (StatusCode, String)> {
    let route = state
        .runtime
        .find_webhook_route(&format!("/{}", path))
        .await
        .ok_or((StatusCode::NOT_FOUND, "no webhook registered for this path".to_string()))?;

    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok());
    if !verify_webhook_signature(route.secret.as_deref(), &body, signature) {
        return Err((StatusCode::UNAUTHORIZED, "signature verification failed".to_string()));
    }

    let payload: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    state.runtime.event_bus().publish(runtime_core::AgentEvent::new(
        runtime_core::EventType::WebhookReceived,
        payload.clone(),
    ).with_graph(route.graph_id.clone())).await;

    let mut input = SharedMemory::default();
    input.insert("webhookPayload", payload);
    state
        .runtime
        .trigger(Some(route.graph_id), &route.entry_point_id, input, None)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(response::no_content())
}
