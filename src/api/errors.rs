use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::exam::{DefinitionError, ExamError};
use crate::services::session_registry::CapacityExceeded;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    ServiceUnavailable(String),
}

impl ApiError {
    /// Log a grading backend failure and return a `BadGateway` variant.
    pub(crate) fn upstream(err: anyhow::Error, context: &str) -> Self {
        tracing::warn!(error = %format!("{err:#}"), "{context}");
        Self::BadGateway(format!("{context}: {err}"))
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<ExamError> for ApiError {
    fn from(err: ExamError) -> Self {
        match err {
            ExamError::UnknownQuestion(_) => Self::NotFound(err.to_string()),
            ExamError::WrongVariant { .. } | ExamError::UnknownOption { .. } => {
                Self::BadRequest(err.to_string())
            }
            ExamError::QuestionLocked(_)
            | ExamError::NotCurrent(_)
            | ExamError::NotStarted
            | ExamError::SessionEnded => Self::Conflict(err.to_string()),
        }
    }
}

impl From<DefinitionError> for ApiError {
    fn from(err: DefinitionError) -> Self {
        Self::BadRequest(format!("Invalid exam definition: {err}"))
    }
}

impl From<CapacityExceeded> for ApiError {
    fn from(err: CapacityExceeded) -> Self {
        Self::ServiceUnavailable(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            ApiError::ServiceUnavailable(message) => {
                tracing::warn!(error = %message, "Service unavailable");
                message
            }
            ApiError::BadRequest(message)
            | ApiError::NotFound(message)
            | ApiError::Conflict(message)
            | ApiError::BadGateway(message) => message,
        };

        (status, Json(ErrorResponse { status: status.as_u16(), detail })).into_response()
    }
}
