//! Object operation handlers

use crate::{error::ErrorCode, ApiError, AppState};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

/// Query parameters for uploads
#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub replication: Option<usize>,
}

/// Query parameters selecting a version
#[derive(Debug, Deserialize)]
pub struct VersionParams {
    pub version: Option<u64>,
}

/// Query parameters for listings
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub prefix: Option<String>,
}

/// Pull the `file` field out of a multipart body
async fn read_file_field(multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            return Ok(field.bytes().await?);
        }
    }

    Err(ApiError::new(
        ErrorCode::InvalidRequest,
        "multipart field 'file' is required",
    ))
}

/// POST /objects/{bucket}/{*key} - Upload a new version
#[instrument(skip(state, multipart))]
pub async fn upload_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let data = read_file_field(&mut multipart).await?;

    if data.is_empty() {
        return Err(ApiError::new(ErrorCode::EmptyObject, "file cannot be empty"));
    }
    if data.len() > state.config.max_object_size {
        return Err(ApiError::new(
            ErrorCode::EntityTooLarge,
            format!(
                "object of {} bytes exceeds maximum {} bytes",
                data.len(),
                state.config.max_object_size
            ),
        ));
    }

    let receipt = state
        .service
        .upload(&bucket, &key, data, params.replication)
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)).into_response())
}

/// GET /objects/{bucket}/{*key} - Download the latest or a specific version
#[instrument(skip(state))]
pub async fn download_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<VersionParams>,
) -> Result<Response, ApiError> {
    let object = state.service.download(&bucket, &key, params.version).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::HeaderName::from_static("x-object-checksum"), object.checksum),
            (
                header::HeaderName::from_static("x-object-version"),
                object.version.to_string(),
            ),
            (
                header::HeaderName::from_static("x-object-created"),
                object.created_at.to_rfc3339(),
            ),
            (header::HeaderName::from_static("x-served-by"), object.served_by),
        ],
        object.data,
    )
        .into_response())
}

/// DELETE /objects/{bucket}/{*key}?version=v - Tombstone a version
#[instrument(skip(state))]
pub async fn delete_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<VersionParams>,
) -> Result<Response, ApiError> {
    let version = params.version.ok_or_else(|| {
        ApiError::new(ErrorCode::InvalidRequest, "query parameter 'version' is required")
    })?;

    let receipt = state.service.delete_version(&bucket, &key, version).await?;
    Ok(Json(receipt).into_response())
}

/// GET /objects/{bucket} - List objects with live versions
pub async fn list_objects(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let objects = state
        .service
        .list_objects(&bucket, params.prefix.as_deref())
        .await?;

    Ok(Json(serde_json::json!({
        "bucket": bucket,
        "prefix": params.prefix.unwrap_or_default(),
        "objects": objects,
    }))
    .into_response())
}

/// GET /versions/{bucket}/{*key} - List live versions of an object
pub async fn list_versions(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let versions = state.service.list_versions(&bucket, &key).await?;

    Ok(Json(serde_json::json!({
        "bucket": bucket,
        "key": key,
        "versions": versions,
    }))
    .into_response())
}
