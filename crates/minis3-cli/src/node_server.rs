//! Storage node HTTP server
//!
//! Serves the blob protocol the gateway's `HttpBlobNodeClient` speaks:
//!
//! ```text
//! PUT    /store        multipart: file, path
//! GET    /fetch?path=  raw bytes
//! DELETE /store?path=
//! GET    /health       {"status": "UP" | "DOWN", ...}
//! ```

use crate::{error::ErrorCode, middleware, state::NodeState, ApiError};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, StatusCode},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use bytes::Bytes;
use minis3_blockstore::NodeHealth;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

/// Multipart framing allowance on top of the blob size limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Query parameter naming a blob
#[derive(Debug, Deserialize)]
pub struct PathParams {
    pub path: String,
}

/// Create the storage node router
pub fn create_node_router(state: Arc<NodeState>) -> Router {
    let body_limit = state.config.max_file_size as usize + MULTIPART_OVERHEAD;

    Router::new()
        .route("/store", put(store_blob).delete(delete_blob))
        .route("/fetch", get(fetch_blob))
        .route("/health", get(health))
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// PUT /store - Write a blob
#[instrument(skip(state, multipart))]
async fn store_blob(
    State(state): State<Arc<NodeState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut file: Option<Bytes> = None;
    let mut path: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => file = Some(field.bytes().await?),
            "path" => path = Some(field.text().await?),
            _ => {}
        }
    }

    let path =
        path.ok_or_else(|| ApiError::new(ErrorCode::InvalidRequest, "field 'path' is required"))?;
    let file =
        file.ok_or_else(|| ApiError::new(ErrorCode::InvalidRequest, "field 'file' is required"))?;

    state.store.put(&path, &file).await?;
    info!(path = %path, size = file.len(), "blob stored");

    Ok(Json(serde_json::json!({
        "path": path,
        "size": file.len(),
    }))
    .into_response())
}

/// GET /fetch - Read a blob
async fn fetch_blob(
    State(state): State<Arc<NodeState>>,
    Query(params): Query<PathParams>,
) -> Result<Response, ApiError> {
    let data = state.store.get(&params.path).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        data,
    )
        .into_response())
}

/// DELETE /store - Remove a blob; missing blobs are not an error
async fn delete_blob(
    State(state): State<Arc<NodeState>>,
    Query(params): Query<PathParams>,
) -> Result<Response, ApiError> {
    if state.store.remove(&params.path).await? {
        info!(path = %params.path, "blob deleted");
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// GET /health - Report whether the storage directory is usable
async fn health(State(state): State<Arc<NodeState>>) -> Response {
    let report = state.store.health().await;
    let status = match report.status {
        NodeHealth::Up => StatusCode::OK,
        NodeHealth::Down => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report)).into_response()
}
