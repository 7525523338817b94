// Sales-call Workflow Engine
//
// This crate drives one user through a multi-step workflow: upload a call
// artifact, review AI-generated insights, push them to a CRM.
//
// Key design decisions:
// - One WorkflowEngine per session; workflow variants differ only by ArtifactKind
// - External services (insights, regeneration, CRM) sit behind traits
// - Session state is mutated under a short synchronous lock, never across an await
// - A session generation counter discards results that arrive after a reset
// - Progress is a stream from a ProgressSource, published monotonically
// - Error handling separates validation, transition and transport failures

// Domain entity types
pub mod artifact;
pub mod insights;
pub mod session;
pub mod user;

pub mod config;
pub mod error;
pub mod events;
pub mod gate;
pub mod progress;
pub mod traits;

// Coordinators
mod context;
pub mod engine;
pub mod ingest;
pub mod push;
pub mod review;

// In-memory implementations for examples and testing
pub mod memory;

// Re-exports for convenience
pub use artifact::{
    resolve_content_type, Artifact, ArtifactKind, ArtifactRef, PushTarget, RecordingRef,
    UploadedFile, APPLICATION_PDF, TEXT_PLAIN, TEXT_VTT,
};
pub use config::{WorkflowConfig, WorkflowConfigBuilder};
pub use engine::{WorkflowEngine, WorkflowEngineBuilder};
pub use error::{Result, ValidationError, WorkflowError};
pub use events::{NoopEventEmitter, TracingEventEmitter, WorkflowEvent};
pub use gate::{EnabledActions, GateView, StepGate};
pub use ingest::IngestHandle;
pub use insights::{FieldValue, InsightField, InsightsBundle, SentimentPoint};
pub use progress::{NoProgress, ProgressReporter, ProgressSource, ProgressStream, TickerProgress};
pub use session::{Phase, PushResult, WorkflowSession, REVIEW_STEP, UPLOAD_STEP};
pub use traits::{
    CrmClient, CrmPushRequest, CrmReceipt, EventEmitter, InsightService, RegenerateRequest,
    Regenerator, SessionHistoryStore, SessionRecord,
};
pub use user::{CurrentUser, ProfileUpdate};
