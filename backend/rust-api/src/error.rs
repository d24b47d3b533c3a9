use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::services::eligibility::IneligibleReason;
use crate::store::StoreError;

/// Domain error for the attempt engine. Each variant maps to one HTTP
/// status; eligibility and validation failures are checked before any
/// mutation, so none of these imply partial state.
#[derive(Debug, thiserror::Error)]
pub enum ExamError {
    #[error("cannot start exam: {0}")]
    Ineligible(IneligibleReason),

    #[error("invalid attempt state: {0}")]
    InvalidState(String),

    #[error("invalid question reference: {0}")]
    InvalidQuestion(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Persistence(#[from] StoreError),
}

impl ExamError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        ExamError::InvalidState(msg.into())
    }

    pub fn invalid_question(msg: impl Into<String>) -> Self {
        ExamError::InvalidQuestion(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ExamError::NotFound(what.into())
    }
}

impl From<validator::ValidationErrors> for ExamError {
    fn from(err: validator::ValidationErrors) -> Self {
        ExamError::Validation(err.to_string())
    }
}

impl IntoResponse for ExamError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ExamError::Ineligible(reason) => (
                StatusCode::FORBIDDEN,
                json!({ "error": self.to_string(), "reason": reason.as_str() }),
            ),
            ExamError::InvalidState(_) => (StatusCode::CONFLICT, json!({ "error": self.to_string() })),
            ExamError::InvalidQuestion(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": self.to_string() }),
            ),
            ExamError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": self.to_string() })),
            ExamError::Validation(_) => (StatusCode::BAD_REQUEST, json!({ "error": self.to_string() })),
            ExamError::Persistence(e) => {
                tracing::error!("Storage failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
