//! HTTP-facing error type.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing video file part")]
    MissingFile,

    #[error("no file selected")]
    NoFileSelected,

    #[error("file type not allowed")]
    FileTypeNotAllowed,

    #[error("invalid upload: {}", .0.body_text())]
    Multipart(#[from] MultipartError),

    #[error("processing error: {0:#}")]
    Processing(anyhow::Error),
}

impl ApiError {
    pub fn processing(err: impl Into<anyhow::Error>) -> Self {
        Self::Processing(err.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingFile | ApiError::NoFileSelected | ApiError::FileTypeNotAllowed => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Multipart(err) => err.status(),
            ApiError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
