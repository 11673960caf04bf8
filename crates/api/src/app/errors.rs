use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use texapi_core::DomainError;
use texapi_infra::{assets::AssetError, jobs::JobStoreError, materialize::MaterializeError};

/// Generic message for failures whose details stay in the server log.
pub const INTERNAL_ERROR_MESSAGE: &str = "An error occurred. See details in log.";

/// Request failure, mapped onto a JSON error response.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },
    #[error("{0}")]
    NotFound(String),
    /// Logged in full, reported to the client only generically.
    #[error("{context}: {detail}")]
    Internal { context: &'static str, detail: String },
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Internal {
            context,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest { code, message } => {
                json_error(StatusCode::BAD_REQUEST, code, message)
            }
            ApiError::NotFound(message) => json_error(StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Internal { context, detail } => {
                tracing::error!(error = %detail, "{context}");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    INTERNAL_ERROR_MESSAGE,
                )
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidId(_) => {
                ApiError::bad_request("invalid_id", "UUID had unexpected format!")
            }
            other => ApiError::internal("domain error", other),
        }
    }
}

impl From<JobStoreError> for ApiError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::NotFound(id) => ApiError::not_found(format!("job not found: {id}")),
            other => ApiError::internal("reading status file", other),
        }
    }
}

impl From<MaterializeError> for ApiError {
    fn from(err: MaterializeError) -> Self {
        match err {
            MaterializeError::Archive(_) => {
                ApiError::bad_request("invalid_archive", "uploaded archive could not be read")
            }
            MaterializeError::UnsafePath(path) => ApiError::bad_request(
                "invalid_archive",
                format!("archive entry escapes the job directory: {path}"),
            ),
            MaterializeError::PathConflict(path) => ApiError::bad_request(
                "invalid_archive",
                format!("archive entry is both a file and a directory: {path}"),
            ),
            other => ApiError::internal("copying files to job dir", other),
        }
    }
}

impl From<AssetError> for ApiError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::NotFound => ApiError::not_found("requested output file not found"),
            other => ApiError::internal("generating downloadable asset", other),
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
