pub mod jobs;
pub mod upload;

pub use jobs::*;
pub use upload::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::models::ProcessingError;

/// Body sent for every failure the client cannot act on.
pub const GENERIC_FAILURE: &str = "Failed to process images";

/// HTTP face of a [`ProcessingError`]. Client errors carry their message;
/// everything else is logged and reported generically.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: ProcessingError,
}

impl ApiError {
    pub fn with_status(status: StatusCode, error: ProcessingError) -> Self {
        Self { status, error }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

pub fn status_for(error: &ProcessingError) -> StatusCode {
    match error {
        ProcessingError::Validation(_)
        | ProcessingError::TooManyFiles { .. }
        | ProcessingError::Multipart(_) => StatusCode::BAD_REQUEST,
        ProcessingError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ProcessingError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ProcessingError::JobNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ProcessingError> for ApiError {
    fn from(error: ProcessingError) -> Self {
        Self { status: status_for(&error), error }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = if self.status.is_server_error() {
            tracing::error!(error = %self.error, "Request failed");
            GENERIC_FAILURE.to_string()
        } else {
            tracing::warn!(status = %self.status, error = %self.error, "Request rejected");
            self.error.to_string()
        };
        (self.status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
