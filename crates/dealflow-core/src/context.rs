// Shared per-session context
//
// Every coordinator of a session holds the same SessionContext: the session
// state behind a lock, the artifact kind, configuration, the injected user and
// the event emitter. The lock is a synchronous mutex and must never be held
// across an await.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

use crate::artifact::ArtifactKind;
use crate::config::WorkflowConfig;
use crate::error::WorkflowError;
use crate::events::WorkflowEvent;
use crate::session::WorkflowSession;
use crate::traits::EventEmitter;
use crate::user::CurrentUser;

pub(crate) struct SessionContext {
    pub(crate) session: Mutex<WorkflowSession>,
    pub(crate) session_id: Uuid,
    pub(crate) kind: ArtifactKind,
    pub(crate) config: WorkflowConfig,
    pub(crate) user: CurrentUser,
    emitter: Arc<dyn EventEmitter>,
}

impl SessionContext {
    pub(crate) fn new(
        kind: ArtifactKind,
        config: WorkflowConfig,
        user: CurrentUser,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        let session = WorkflowSession::new(kind.name.clone(), kind.step_count);
        Self {
            session_id: session.id,
            session: Mutex::new(session),
            kind,
            config,
            user,
            emitter,
        }
    }

    /// Copy of the current session state
    pub(crate) fn snapshot(&self) -> WorkflowSession {
        self.session.lock().clone()
    }

    /// Emit an event; emitter failures are logged, never propagated
    pub(crate) async fn emit(&self, event: WorkflowEvent) {
        if let Err(e) = self.emitter.emit(event).await {
            tracing::warn!(session_id = %self.session_id, error = %e, "Failed to emit workflow event");
        }
    }

    /// Report a rejected action to the user and hand the error back
    pub(crate) async fn reject(&self, err: WorkflowError) -> WorkflowError {
        tracing::debug!(session_id = %self.session_id, error = %err, "Workflow action rejected");
        let event = match &err {
            WorkflowError::Validation(validation) => WorkflowEvent::ValidationFailed {
                session_id: self.session_id,
                message: validation.to_string(),
                timestamp: Utc::now(),
            },
            other => WorkflowEvent::ActionRejected {
                session_id: self.session_id,
                message: other.to_string(),
                timestamp: Utc::now(),
            },
        };
        self.emit(event).await;
        err
    }
}
