//! Registry error kinds and their JSON/HTTP representation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rollcall_core::{DimensionMismatch, InvalidRole};
use serde::Serialize;
use thiserror::Error;

use crate::engine::EngineError;
use crate::store::StoreError;

/// Stable, machine-readable error category returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    InvalidRole,
    NoFaceDetected,
    DuplicateUser,
    InternalError,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    InvalidRole(#[from] InvalidRole),

    #[error("No face detected.")]
    NoFaceDetected,

    #[error("User '{0}' already exists.")]
    DuplicateUser(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::Validation(_) => ErrorKind::ValidationError,
            RegistryError::InvalidRole(_) => ErrorKind::InvalidRole,
            RegistryError::NoFaceDetected => ErrorKind::NoFaceDetected,
            RegistryError::DuplicateUser(_) => ErrorKind::DuplicateUser,
            RegistryError::Internal(_) => ErrorKind::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::ValidationError | ErrorKind::InvalidRole => StatusCode::BAD_REQUEST,
            ErrorKind::NoFaceDetected => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::DuplicateUser => StatusCode::CONFLICT,
            ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            RegistryError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(id) => RegistryError::DuplicateUser(id),
            other => RegistryError::Internal(other.to_string()),
        }
    }
}

impl From<EngineError> for RegistryError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NoFaceDetected => RegistryError::NoFaceDetected,
            EngineError::Decode(e) => RegistryError::Validation(format!("Image could not be decoded: {e}")),
            other => RegistryError::Internal(other.to_string()),
        }
    }
}

impl From<DimensionMismatch> for RegistryError {
    fn from(err: DimensionMismatch) -> Self {
        RegistryError::Internal(err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: ErrorKind,
    pub message: String,
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        if let RegistryError::Internal(detail) = &self {
            tracing::error!(error = %detail, "request failed");
        } else {
            tracing::debug!(kind = ?self.kind(), error = %self, "request rejected");
        }

        let body = ErrorBody {
            success: false,
            error: self.kind(),
            message: self.public_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
