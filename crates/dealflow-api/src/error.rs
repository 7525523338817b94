// HTTP error responses
//
// Every handler error becomes `{ "error": <message>, "code": <code> }` with a
// status derived from the workflow error kind.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dealflow_core::WorkflowError;
use serde::Serialize;
use utoipa::ToSchema;

/// Error body returned by all endpoints
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// User-facing message
    pub error: String,
    /// Machine-readable code, e.g. `already_pushed`
    pub code: String,
    #[serde(skip)]
    pub status: StatusCode,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.to_string(),
            status,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }
}

/// Status code for a workflow error
pub fn status_for(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::Validation(_) | WorkflowError::InvalidField { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        WorkflowError::InvalidTransition { .. }
        | WorkflowError::AlreadyPushed
        | WorkflowError::Busy { .. }
        | WorkflowError::Cancelled => StatusCode::CONFLICT,
        WorkflowError::IngestFailure(_)
        | WorkflowError::PushFailure(_)
        | WorkflowError::RegenerationFailure { .. } => StatusCode::BAD_GATEWAY,
        WorkflowError::Configuration(_) | WorkflowError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!(code = err.code(), "Workflow operation failed: {}", err);
        }
        Self::new(status, err.code(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealflow_core::ValidationError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                WorkflowError::Validation(ValidationError::Empty),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (WorkflowError::AlreadyPushed, StatusCode::CONFLICT),
            (
                WorkflowError::Busy { operation: "push" },
                StatusCode::CONFLICT,
            ),
            (WorkflowError::push("refused"), StatusCode::BAD_GATEWAY),
            (WorkflowError::ingest("timeout"), StatusCode::BAD_GATEWAY),
            (
                WorkflowError::config("missing"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(status_for(&err), expected, "{err}");
        }
    }

    #[test]
    fn test_error_body_carries_code() {
        let api_error = ApiError::from(WorkflowError::AlreadyPushed);
        assert_eq!(api_error.status, StatusCode::CONFLICT);
        assert_eq!(api_error.code, "already_pushed");

        let json = serde_json::to_value(&api_error).unwrap();
        assert!(json.get("status").is_none());
    }
}
