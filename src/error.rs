// HTTP API Error Types
use axum::extract::rejection::QueryRejection;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::CollectionError;
use crate::filter::FilterError;
use crate::pagination::PaginateError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    Filter(FilterError),
    BadRequest(String),

    // 500 Internal Server Error
    InternalServerError(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Filter(_) | ApiError::BadRequest(_) => 400,
            ApiError::InternalServerError(_) => 500,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> String {
        match self {
            ApiError::Filter(err) => err.to_string(),
            ApiError::BadRequest(msg) | ApiError::InternalServerError(msg) => msg.clone(),
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Filter(err) => err.code(),
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "message": self.message(),
            "code": self.error_code(),
            "statusCode": self.status_code(),
        });
        if let ApiError::Filter(err) = self {
            if let Some(details) = err.details() {
                response["details"] = json!(details);
            }
        }
        response
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::Filter(err)
    }
}

impl From<CollectionError> for ApiError {
    fn from(err: CollectionError) -> Self {
        // Don't expose internal storage errors to clients
        tracing::error!("Collection error: {}", err);
        ApiError::internal_server_error("An error occurred while processing your request")
    }
}

impl<E> From<PaginateError<E>> for ApiError
where
    E: std::error::Error + 'static,
{
    fn from(err: PaginateError<E>) -> Self {
        match err {
            PaginateError::Filter(err) => err.into(),
            PaginateError::Backend(err) => {
                tracing::error!("Backend error while paging: {}", err);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
