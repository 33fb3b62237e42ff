use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use parlor_db::DbError;
use parlor_types::api::ErrorResponse;

pub type ApiResult<T> = Result<T, ApiError>;

/// Every failure an operation can report. Each variant maps to one HTTP
/// status, and the `Display` text is what the client sees in `message`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    AuthenticationRequired(String),

    #[error("Access denied")]
    AccessDenied,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    /// Also used when the target exists but belongs to someone else.
    #[error("{0}")]
    NotFoundOrForbidden(String),

    #[error("API endpoint not found")]
    UnknownEndpoint,

    /// The detail is logged, never sent.
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::AuthenticationRequired(_) => StatusCode::UNAUTHORIZED,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFoundOrForbidden(_) | Self::UnknownEndpoint => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            error!("Internal error: {}", detail);
        }

        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        Self::Internal(err.to_string())
    }
}

// -- Extractor rejections --

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected JSON body: {}", rejection.body_text());
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        warn!("Rejected query string: {}", rejection.body_text());
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        warn!("Rejected path parameters: {}", rejection.body_text());
        Self::Validation(rejection.body_text())
    }
}
