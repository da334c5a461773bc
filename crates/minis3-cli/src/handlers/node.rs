//! Storage node management handlers

use crate::{ApiError, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use minis3_core::NodeStatus;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Body of a node registration
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterNodeRequest {
    pub name: String,
    pub base_url: String,
}

/// Body of a status change
#[derive(Debug, Deserialize)]
pub struct NodeStatusRequest {
    pub status: String,
}

/// POST /nodes/register - Register a storage node
pub async fn register_node(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterNodeRequest>,
) -> Result<Response, ApiError> {
    let node = state
        .service
        .register_node(&request.name, &request.base_url)
        .await?;
    Ok((StatusCode::CREATED, Json(node)).into_response())
}

/// GET /nodes - List storage nodes
pub async fn list_nodes(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let nodes = state.service.list_nodes().await?;
    Ok(Json(nodes).into_response())
}

/// GET /nodes/{name} - Get a storage node
pub async fn get_node(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let node = state.service.get_node(&name).await?;
    Ok(Json(node).into_response())
}

/// PUT /nodes/{name}/status - Change a node's status
pub async fn set_node_status(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(request): Json<NodeStatusRequest>,
) -> Result<Response, ApiError> {
    let status: NodeStatus = request.status.parse()?;
    let node = state.service.set_node_status(&name, status).await?;
    Ok(Json(node).into_response())
}

/// GET /nodes/{name}/health - Probe a node right now
pub async fn probe_node(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let (node, health) = state.service.probe_node(&name).await?;

    Ok(Json(json!({
        "node": node.name,
        "registryStatus": node.status,
        "health": health,
        "checkedAt": Utc::now(),
    }))
    .into_response())
}
