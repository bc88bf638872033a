//! Error handling module
//!
//! Provides unified error types for the sync pipeline and the HTTP surface.

use crate::codec::CodecError;
use crate::rpc::RpcError;
use crate::storage::StorageError;
use crate::sync::quorum::QuorumError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors that abort (or are recorded by) a snapshot sync run
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Realm not found: {0}")]
    RealmNotFound(String),

    #[error("Missing governance config: {0}")]
    MissingGovernanceConfig(String),

    #[error("Malformed cached artifact {file}: {reason}")]
    MalformedCache { file: String, reason: String },

    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("Manifest changed concurrently for {governance}: expected version {expected:?}, found {found:?}")]
    ManifestConflict {
        governance: String,
        expected: Option<u64>,
        found: Option<u64>,
    },

    #[error("Quorum error: {0}")]
    Quorum(#[from] QuorumError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sync cancelled")]
    Cancelled,
}

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl SyncError {
    /// Stable machine-readable code for API consumers
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::RealmNotFound(_) => "REALM_NOT_FOUND",
            SyncError::MissingGovernanceConfig(_) => "MISSING_GOVERNANCE_CONFIG",
            SyncError::MalformedCache { .. } => "MALFORMED_CACHE",
            SyncError::MalformedManifest(_) => "MALFORMED_MANIFEST",
            SyncError::ManifestConflict { .. } => "MANIFEST_CONFLICT",
            SyncError::Quorum(_) => "QUORUM_ERROR",
            SyncError::Rpc(_) => "RPC_ERROR",
            SyncError::Storage(_) => "STORAGE_ERROR",
            SyncError::Codec(_) => "CODEC_ERROR",
            SyncError::Serialization(_) => "SERIALIZATION_ERROR",
            SyncError::Cancelled => "CANCELLED",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match &self {
            AppError::Sync(e) => {
                let status = match e {
                    SyncError::RealmNotFound(_) => StatusCode::NOT_FOUND,
                    SyncError::ManifestConflict { .. } => StatusCode::CONFLICT,
                    SyncError::Rpc(_) | SyncError::Storage(_) => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    error!("Sync error: {:?}", e);
                }
                (status, e.code(), e.to_string(), None)
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                None,
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
                None,
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                msg.clone(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            error: details,
            code: Some(error_code.to_string()),
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;

/// Helper function to create a validation error
pub fn validation_error(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}

/// Helper function to create a not found error
pub fn not_found_error(msg: impl Into<String>) -> AppError {
    AppError::NotFound(msg.into())
}
