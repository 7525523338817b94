// Error types for the workflow engine

use thiserror::Error;

use crate::insights::InsightField;
use crate::session::Phase;

/// Result type alias for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Which rule a rejected artifact violated
///
/// Every message names the rule so it can be shown to the user as-is.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The uploaded file has no content
    #[error("artifact is empty: upload a file with content")]
    Empty,

    /// The filename contains path traversal or control characters
    #[error("unsafe filename {filename:?}: path separators and '..' are not allowed")]
    UnsafeFilename { filename: String },

    /// The uploaded file is larger than the configured maximum
    #[error("artifact size {size} bytes exceeds the maximum size of {max} bytes")]
    Oversized { size: u64, max: u64 },

    /// The file type is not in the allowed set for the artifact kind
    #[error("unsupported file type {content_type:?}: allowed types are {allowed}")]
    UnsupportedType {
        content_type: String,
        allowed: String,
    },

    /// A recording reference was given without an id
    #[error("recording reference has no id")]
    MissingRecordingId,

    /// A push was requested without a prospect to attach it to
    #[error("prospect id is required to push insights")]
    MissingProspectId,

    /// The artifact kind does not accept this source
    #[error("artifact kind {kind} does not accept {source_name}")]
    UnsupportedSource { kind: String, source_name: String },
}

/// Errors that can occur while driving a workflow session
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The artifact failed local validation, no work was started
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The insight service failed or returned a malformed payload
    #[error("Ingest failed: {0}")]
    IngestFailure(String),

    /// The requested step or action is not allowed from the current state
    #[error("Invalid transition: {reason}")]
    InvalidTransition { phase: Phase, reason: String },

    /// The session already pushed its insights successfully
    #[error("Insights were already pushed for this session")]
    AlreadyPushed,

    /// Regenerating a single field failed, the prior value is kept
    #[error("Regenerating {field} failed: {reason}")]
    RegenerationFailure { field: InsightField, reason: String },

    /// The CRM push failed, the session stays in review
    #[error("Push failed: {0}")]
    PushFailure(String),

    /// Another ingest or push is already running on this session
    #[error("Session is busy: {operation} already in progress")]
    Busy { operation: &'static str },

    /// The session was reset while the operation was in flight; its result was dropped
    #[error("Operation cancelled: the session was reset")]
    Cancelled,

    /// An edit value does not fit the targeted field
    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: InsightField, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl WorkflowError {
    /// Create an ingest failure
    pub fn ingest(msg: impl Into<String>) -> Self {
        WorkflowError::IngestFailure(msg.into())
    }

    /// Create a push failure
    pub fn push(msg: impl Into<String>) -> Self {
        WorkflowError::PushFailure(msg.into())
    }

    /// Create an invalid transition error
    pub fn transition(phase: Phase, reason: impl Into<String>) -> Self {
        WorkflowError::InvalidTransition {
            phase,
            reason: reason.into(),
        }
    }

    /// Create a regeneration failure
    pub fn regeneration(field: InsightField, reason: impl Into<String>) -> Self {
        WorkflowError::RegenerationFailure {
            field,
            reason: reason.into(),
        }
    }

    /// Create an invalid field error
    pub fn invalid_field(field: InsightField, reason: impl Into<String>) -> Self {
        WorkflowError::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        WorkflowError::Configuration(msg.into())
    }

    /// Short machine-readable code, stable across message wording changes
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "validation_error",
            WorkflowError::IngestFailure(_) => "ingest_failure",
            WorkflowError::InvalidTransition { .. } => "invalid_transition",
            WorkflowError::AlreadyPushed => "already_pushed",
            WorkflowError::RegenerationFailure { .. } => "regeneration_failure",
            WorkflowError::PushFailure(_) => "push_failure",
            WorkflowError::Busy { .. } => "busy",
            WorkflowError::Cancelled => "cancelled",
            WorkflowError::InvalidField { .. } => "invalid_field",
            WorkflowError::Configuration(_) => "configuration_error",
            WorkflowError::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_name_the_rule() {
        let oversized = ValidationError::Oversized {
            size: 15 * 1024 * 1024,
            max: 10 * 1024 * 1024,
        };
        assert!(oversized.to_string().contains("size"));

        let unsafe_name = ValidationError::UnsafeFilename {
            filename: "../../etc/passwd.txt".to_string(),
        };
        assert!(unsafe_name.to_string().contains("filename"));

        let wrong_type = ValidationError::UnsupportedType {
            content_type: "image/png".to_string(),
            allowed: "text/plain".to_string(),
        };
        assert!(wrong_type.to_string().contains("type"));
    }

    #[test]
    fn test_validation_converts_into_workflow_error() {
        let err: WorkflowError = ValidationError::Empty.into();
        assert!(matches!(err, WorkflowError::Validation(ValidationError::Empty)));
        assert_eq!(err.code(), "validation_error");
    }
}
