//! Application error taxonomy and its HTTP surface.
//!
//! Pipeline-internal failures are folded into the owning job's
//! `error_detail`; only errors raised on a request path travel through this
//! type to the client, always as `{"detail": ...}` with a mapped status.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::engine::EngineError;
use crate::export::ExportError;
use crate::media::MediaError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),
    #[error("Transcription not found")]
    NotFound(String),
    #[error("Transcription not ready for job {0}")]
    NotReady(String),
    #[error("Transcription error: {0}")]
    Processing(String),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotReady(_) => StatusCode::CONFLICT,
            AppError::Media(MediaError::Unsupported(_)) => StatusCode::BAD_REQUEST,
            AppError::Media(MediaError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {self}");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
