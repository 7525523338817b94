// Workflow events for notifications
//
// WorkflowEvent tracks the session lifecycle: ingest progress, review edits,
// pushes and resets. Failure events carry the user-facing message so a UI can
// show it as a notification without re-deriving it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::error::Result;
use crate::insights::InsightField;
use crate::traits::EventEmitter;

/// Events emitted while a session is driven
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Artifact rejected before any work started
    ValidationFailed {
        session_id: Uuid,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Artifact accepted and sent to the insight service
    IngestStarted {
        session_id: Uuid,
        artifact_label: String,
        generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// Ingest progress moved forward
    IngestProgress {
        session_id: Uuid,
        generation: u64,
        percent: u8,
        timestamp: DateTime<Utc>,
    },

    /// Insights are ready for review
    IngestCompleted {
        session_id: Uuid,
        generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// Insight service failed; the session is idle again
    IngestFailed {
        session_id: Uuid,
        generation: u64,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A result arrived for a session that has since been reset
    StaleResultDiscarded {
        session_id: Uuid,
        generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// User navigated to a step
    StepAdvanced {
        session_id: Uuid,
        step: u32,
        timestamp: DateTime<Utc>,
    },

    /// A step was marked completed
    StepCompleted {
        session_id: Uuid,
        step: u32,
        timestamp: DateTime<Utc>,
    },

    /// User edited a field
    FieldEdited {
        session_id: Uuid,
        field: InsightField,
        timestamp: DateTime<Utc>,
    },

    /// A field was regenerated by the external service
    FieldRegenerated {
        session_id: Uuid,
        field: InsightField,
        timestamp: DateTime<Utc>,
    },

    /// Regeneration failed; the prior value is kept
    RegenerationFailed {
        session_id: Uuid,
        field: InsightField,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Insights were written to the CRM
    PushSucceeded {
        session_id: Uuid,
        crm_record_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// CRM push failed; the user may retry
    PushFailed {
        session_id: Uuid,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A rejected action, e.g. a locked step or a double push
    ActionRejected {
        session_id: Uuid,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Session cleared back to its initial state
    SessionReset {
        session_id: Uuid,
        generation: u64,
        timestamp: DateTime<Utc>,
    },
}

impl WorkflowEvent {
    /// Session the event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            WorkflowEvent::ValidationFailed { session_id, .. }
            | WorkflowEvent::IngestStarted { session_id, .. }
            | WorkflowEvent::IngestProgress { session_id, .. }
            | WorkflowEvent::IngestCompleted { session_id, .. }
            | WorkflowEvent::IngestFailed { session_id, .. }
            | WorkflowEvent::StaleResultDiscarded { session_id, .. }
            | WorkflowEvent::StepAdvanced { session_id, .. }
            | WorkflowEvent::StepCompleted { session_id, .. }
            | WorkflowEvent::FieldEdited { session_id, .. }
            | WorkflowEvent::FieldRegenerated { session_id, .. }
            | WorkflowEvent::RegenerationFailed { session_id, .. }
            | WorkflowEvent::PushSucceeded { session_id, .. }
            | WorkflowEvent::PushFailed { session_id, .. }
            | WorkflowEvent::ActionRejected { session_id, .. }
            | WorkflowEvent::SessionReset { session_id, .. } => *session_id,
        }
    }

    /// User-facing notification text, for events that warrant one
    pub fn notification(&self) -> Option<&str> {
        match self {
            WorkflowEvent::ValidationFailed { message, .. }
            | WorkflowEvent::IngestFailed { message, .. }
            | WorkflowEvent::RegenerationFailed { message, .. }
            | WorkflowEvent::PushFailed { message, .. }
            | WorkflowEvent::ActionRejected { message, .. } => Some(message),
            WorkflowEvent::IngestCompleted { .. } => Some("Insights are ready for review"),
            WorkflowEvent::PushSucceeded { .. } => Some("Insights pushed to CRM"),
            _ => None,
        }
    }

    /// Whether the event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            WorkflowEvent::ValidationFailed { .. }
                | WorkflowEvent::IngestFailed { .. }
                | WorkflowEvent::RegenerationFailed { .. }
                | WorkflowEvent::PushFailed { .. }
                | WorkflowEvent::ActionRejected { .. }
        )
    }
}

// ============================================================================
// Emitters
// ============================================================================

/// Emitter that drops every event
#[derive(Debug, Default, Clone)]
pub struct NoopEventEmitter;

#[async_trait::async_trait]
impl EventEmitter for NoopEventEmitter {
    async fn emit(&self, _event: WorkflowEvent) -> Result<()> {
        Ok(())
    }
}

/// Emitter that writes events to the tracing subscriber
///
/// Failures are logged at warn level, everything else at info.
#[derive(Debug, Default, Clone)]
pub struct TracingEventEmitter;

#[async_trait::async_trait]
impl EventEmitter for TracingEventEmitter {
    async fn emit(&self, event: WorkflowEvent) -> Result<()> {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        if event.is_failure() {
            tracing::warn!(session_id = %event.session_id(), event = %payload, "workflow event");
        } else {
            tracing::info!(session_id = %event.session_id(), event = %payload, "workflow event");
        }
        Ok(())
    }
}
