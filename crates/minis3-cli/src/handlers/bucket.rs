//! Bucket operation handlers

use crate::{ApiError, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

/// Body of a create-bucket request
#[derive(Debug, Deserialize)]
pub struct CreateBucketRequest {
    pub name: String,
}

/// POST /buckets - Create bucket
pub async fn create_bucket(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateBucketRequest>,
) -> Result<Response, ApiError> {
    let bucket = state.service.create_bucket(&request.name).await?;

    Ok((
        StatusCode::CREATED,
        [("Location", format!("/buckets/{}", bucket.name))],
        Json(bucket),
    )
        .into_response())
}

/// GET /buckets - List buckets
pub async fn list_buckets(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let buckets = state.service.list_buckets().await?;
    Ok(Json(buckets).into_response())
}

/// GET /buckets/{name} - Get bucket
pub async fn get_bucket(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let bucket = state.service.get_bucket(&name).await?;
    Ok(Json(bucket).into_response())
}

/// DELETE /buckets/{name} - Delete bucket
pub async fn delete_bucket(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    state.service.delete_bucket(&name).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
