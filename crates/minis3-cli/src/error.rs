//! Error types and API error codes

use crate::middleware::current_request_id;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use minis3_blockstore::BlobNodeError;
use minis3_core::CoreError;
use thiserror::Error;

/// API error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidRequest,
    InvalidBucketName,
    InvalidObjectKey,
    InvalidNode,
    InvalidReplicationFactor,
    EmptyObject,
    EntityTooLarge,
    NoSuchBucket,
    NoSuchKey,
    NoSuchVersion,
    NoSuchNode,
    VersionGone,
    BucketAlreadyExists,
    BucketNotEmpty,
    NodeAlreadyExists,
    InsufficientReplicas,
    ServiceUnavailable,
    InternalError,
}

impl ErrorCode {
    /// Get the error code string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "InvalidRequest",
            Self::InvalidBucketName => "InvalidBucketName",
            Self::InvalidObjectKey => "InvalidObjectKey",
            Self::InvalidNode => "InvalidNode",
            Self::InvalidReplicationFactor => "InvalidReplicationFactor",
            Self::EmptyObject => "EmptyObject",
            Self::EntityTooLarge => "EntityTooLarge",
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchKey => "NoSuchKey",
            Self::NoSuchVersion => "NoSuchVersion",
            Self::NoSuchNode => "NoSuchNode",
            Self::VersionGone => "VersionGone",
            Self::BucketAlreadyExists => "BucketAlreadyExists",
            Self::BucketNotEmpty => "BucketNotEmpty",
            Self::NodeAlreadyExists => "NodeAlreadyExists",
            Self::InsufficientReplicas => "InsufficientReplicas",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::InternalError => "InternalError",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest
            | Self::InvalidBucketName
            | Self::InvalidObjectKey
            | Self::InvalidNode
            | Self::InvalidReplicationFactor
            | Self::EmptyObject => StatusCode::BAD_REQUEST,
            Self::EntityTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NoSuchBucket | Self::NoSuchKey | Self::NoSuchVersion | Self::NoSuchNode => {
                StatusCode::NOT_FOUND
            }
            Self::VersionGone => StatusCode::GONE,
            Self::BucketAlreadyExists | Self::BucketNotEmpty | Self::NodeAlreadyExists => {
                StatusCode::CONFLICT
            }
            Self::InsufficientReplicas | Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Api { code: ErrorCode, message: String },

    #[error("{0}")]
    Core(#[from] CoreError),

    #[error("{0}")]
    BlobNode(#[from] BlobNodeError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Create an error with an explicit code
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// Get the error code
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Api { code, .. } => *code,
            Self::Internal(_) => ErrorCode::InternalError,
            Self::Core(e) => match e {
                CoreError::BucketNotFound(_) => ErrorCode::NoSuchBucket,
                CoreError::EntryNotFound { .. }
                | CoreError::EntryRemoved { .. }
                | CoreError::NoVersionsAvailable { .. } => ErrorCode::NoSuchKey,
                CoreError::VersionNotFound { .. } => ErrorCode::NoSuchVersion,
                CoreError::NodeNotFound(_) => ErrorCode::NoSuchNode,
                CoreError::VersionGone { .. } => ErrorCode::VersionGone,
                CoreError::BucketAlreadyExists(_) => ErrorCode::BucketAlreadyExists,
                CoreError::BucketNotEmpty(_) => ErrorCode::BucketNotEmpty,
                CoreError::NodeAlreadyExists(_) => ErrorCode::NodeAlreadyExists,
                CoreError::InvalidBucketName(_) => ErrorCode::InvalidBucketName,
                CoreError::InvalidObjectKey(_) => ErrorCode::InvalidObjectKey,
                CoreError::InvalidNode(_) => ErrorCode::InvalidNode,
                CoreError::InvalidReplicationFactor(_) => ErrorCode::InvalidReplicationFactor,
                CoreError::InsufficientReplicas { .. } => ErrorCode::InsufficientReplicas,
                CoreError::AllReplicasFailed { .. } | CoreError::NoReplicaWritten { .. } => {
                    ErrorCode::ServiceUnavailable
                }
                _ => ErrorCode::InternalError,
            },
            Self::BlobNode(e) => match e {
                BlobNodeError::NotFound(_) => ErrorCode::NoSuchKey,
                BlobNodeError::InvalidPath(_) => ErrorCode::InvalidRequest,
                BlobNodeError::TooLarge { .. } => ErrorCode::EntityTooLarge,
                BlobNodeError::Empty => ErrorCode::EmptyObject,
                _ => ErrorCode::InternalError,
            },
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        let code = if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ErrorCode::EntityTooLarge
        } else {
            ErrorCode::InvalidRequest
        };
        Self::new(code, err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.error_code();
        let status = code.status_code();
        let request_id = current_request_id();

        if status.is_server_error() {
            tracing::error!(error = %self, request_id = %request_id, "request failed");
        } else {
            tracing::debug!(error = %self, request_id = %request_id, "request rejected");
        }

        let body = serde_json::json!({
            "error": code.as_str(),
            "message": self.to_string(),
            "requestId": request_id,
        });

        (status, Json(body)).into_response()
    }
}
