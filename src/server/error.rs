//! HTTP error responses.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::service::ServiceError;
use crate::store::StoreError;
use crate::upload::UploadError;

const INTERNAL: &str = "Internal server error";

/// An error rendered as `{"success": false, "error": message}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Create an error with an explicit status.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    /// A 400 response.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(message) => Self::bad_request(message),
            ServiceError::Unauthenticated => Self::new(StatusCode::UNAUTHORIZED, "Unauthorized"),
            ServiceError::Forbidden => Self::new(StatusCode::FORBIDDEN, "Forbidden"),
            ServiceError::NotFound(kind) => {
                Self::new(StatusCode::NOT_FOUND, format!("{kind} not found"))
            }
            ServiceError::Store(StoreError::UnknownReference) => {
                Self::bad_request("Referenced record does not exist")
            }
            ServiceError::Store(StoreError::Conflict) => Self::bad_request("Record already exists"),
            ServiceError::Upload(UploadError::EmptyFile) => {
                Self::bad_request(UploadError::EmptyFile.to_string())
            }
            ServiceError::Store(e) => {
                tracing::error!(error = %e, "Store failure");
                Self::internal()
            }
            ServiceError::Upload(e) => {
                tracing::error!(error = %e, "Upload failure");
                Self::internal()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::bad_request(err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "success": false, "error": self.message }))).into_response()
    }
}
