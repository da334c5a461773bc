//! Service-level handlers

use crate::{ApiError, AppState};
use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use minis3_core::NodeRegistry;
use serde_json::json;
use std::sync::Arc;

/// GET /health - Gateway health with a registry summary
pub async fn health_check(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let nodes = state.service.registry().list_nodes().await?;
    let up = nodes.iter().filter(|n| n.is_up()).count();

    Ok(Json(json!({
        "status": "UP",
        "nodes": { "total": nodes.len(), "up": up },
        "timestamp": Utc::now(),
    })))
}
