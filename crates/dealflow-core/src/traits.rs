// Collaborator traits for pluggable backends
//
// The workflow engine never talks to the network directly. Everything external
// goes through these traits:
// - In-memory implementations for tests (see `memory`)
// - HTTP webhook implementations for production (dealflow-webhooks)
//
// Collaborators report opaque failures through anyhow; the engine maps them
// onto the workflow error taxonomy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::artifact::{Artifact, ArtifactKind, ArtifactRef, PushTarget};
use crate::error::Result;
use crate::events::WorkflowEvent;
use crate::insights::{FieldValue, InsightField, InsightsBundle};
use crate::user::CurrentUser;

// ============================================================================
// EventEmitter - For notifications during execution
// ============================================================================

/// Trait for emitting workflow events
///
/// Implementations can:
/// - Forward events to a UI notification channel
/// - Log events through tracing
/// - Collect events in memory for testing
#[async_trait]
pub trait EventEmitter: Send + Sync {
    /// Emit a single event
    async fn emit(&self, event: WorkflowEvent) -> Result<()>;

    /// Emit multiple events
    async fn emit_batch(&self, events: Vec<WorkflowEvent>) -> Result<()> {
        for event in events {
            self.emit(event).await?;
        }
        Ok(())
    }
}

// ============================================================================
// InsightService - Turns an artifact into insights
// ============================================================================

/// AI service that analyzes a validated artifact
#[async_trait]
pub trait InsightService: Send + Sync {
    /// Produce a complete bundle for the artifact
    async fn analyze(
        &self,
        artifact: &Artifact,
        kind: &ArtifactKind,
        user: &CurrentUser,
    ) -> anyhow::Result<InsightsBundle>;
}

// ============================================================================
// Regenerator - Re-creates one insight field
// ============================================================================

/// Request for regenerating a single field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegenerateRequest {
    pub session_id: Uuid,
    pub field: InsightField,
    pub artifact: ArtifactRef,
    /// Current bundle, so the service can keep the other fields consistent
    pub insights: InsightsBundle,
}

/// AI service that produces a fresh value for one field
#[async_trait]
pub trait Regenerator: Send + Sync {
    async fn regenerate(
        &self,
        request: &RegenerateRequest,
        user: &CurrentUser,
    ) -> anyhow::Result<FieldValue>;
}

// ============================================================================
// CrmClient - Pushes finalized insights
// ============================================================================

/// Payload written to the CRM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmPushRequest {
    pub session_id: Uuid,
    /// Opaque prospect/company identifier at the CRM
    pub prospect_id: String,
    pub target: PushTarget,
    pub artifact_label: String,
    pub insights: InsightsBundle,
    pub user_id: Uuid,
    pub user_email: String,
}

/// CRM acknowledgement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmReceipt {
    #[serde(default)]
    pub record_id: Option<String>,
}

/// External CRM
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Write the insights; an Err means nothing was recorded
    async fn push(&self, request: &CrmPushRequest) -> anyhow::Result<CrmReceipt>;
}

// ============================================================================
// SessionHistoryStore - Durable history of pushed sessions
// ============================================================================

/// One completed session, as kept in history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub prospect_id: String,
    pub artifact_label: String,
    pub summary_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crm_record_id: Option<String>,
    pub pushed_at: DateTime<Utc>,
}

/// Persistence collaborator for session history
#[async_trait]
pub trait SessionHistoryStore: Send + Sync {
    /// Store a record
    async fn record(&self, record: SessionRecord) -> anyhow::Result<()>;

    /// Records for a user, newest first
    async fn list(&self, user_id: Uuid) -> anyhow::Result<Vec<SessionRecord>>;
}
