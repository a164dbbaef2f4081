//! The `{error, code, message}` envelope every endpoint returns on failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ldf_types::{ErrorKind, LdfError};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] LdfError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: u16,
    message: String,
}

impl ApiError {
    fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Domain(err) => err.kind(),
            ApiError::Internal(_) => ErrorKind::TransientInternal,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = match &self {
            ApiError::Domain(err) => err.message.clone(),
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "unhandled internal error");
                "internal error".to_string()
            }
        };
        let body = ErrorBody {
            error: kind.to_string(),
            code: status.as_u16(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<ldf_storage::StorageError> for ApiError {
    fn from(err: ldf_storage::StorageError) -> Self {
        let kind = match &err {
            ldf_storage::StorageError::NotFound(_) => ErrorKind::NotFound,
            ldf_storage::StorageError::Transient(_) => ErrorKind::StorageUnavailable,
            ldf_storage::StorageError::Permanent(_) => ErrorKind::TransientInternal,
        };
        ApiError::Domain(LdfError::new(kind, err.to_string()))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
