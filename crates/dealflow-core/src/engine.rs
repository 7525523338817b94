// Workflow engine
//
// One engine drives one session of one artifact kind. It wires the ingest,
// review and push coordinators to a shared SessionContext and exposes the
// step gate operations. Every workflow variant (transcripts, recordings) uses
// this engine with a different ArtifactKind.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::artifact::{Artifact, ArtifactKind};
use crate::config::WorkflowConfig;
use crate::context::SessionContext;
use crate::error::{Result, WorkflowError};
use crate::events::{NoopEventEmitter, WorkflowEvent};
use crate::gate::{GateView, StepGate};
use crate::ingest::{IngestCoordinator, IngestHandle};
use crate::insights::{FieldValue, InsightField};
use crate::memory::InMemoryHistoryStore;
use crate::progress::{ProgressSource, TickerProgress};
use crate::push::PushCoordinator;
use crate::review::InsightsReview;
use crate::session::{PushResult, WorkflowSession};
use crate::traits::{CrmClient, EventEmitter, InsightService, Regenerator, SessionHistoryStore};
use crate::user::CurrentUser;

/// Drives one workflow session
pub struct WorkflowEngine {
    ctx: Arc<SessionContext>,
    ingest: IngestCoordinator,
    review: InsightsReview,
    push: PushCoordinator,
}

impl WorkflowEngine {
    /// Start building an engine for `kind`
    pub fn builder(kind: ArtifactKind) -> WorkflowEngineBuilder {
        WorkflowEngineBuilder::new(kind)
    }

    /// Session id
    pub fn id(&self) -> Uuid {
        self.ctx.session_id
    }

    /// Artifact kind this engine was built for
    pub fn kind(&self) -> &ArtifactKind {
        &self.ctx.kind
    }

    /// User the session runs for
    pub fn user(&self) -> &CurrentUser {
        &self.ctx.user
    }

    /// Copy of the session state
    pub fn session(&self) -> WorkflowSession {
        self.ctx.snapshot()
    }

    /// Step gate evaluated against the current state
    pub fn gate(&self) -> GateView {
        StepGate::evaluate(&self.ctx.session.lock())
    }

    /// Progress of the current ingest, if one belongs to this generation
    pub fn progress(&self) -> Option<u8> {
        self.ingest.progress()
    }

    /// Move to `to_step`, failing with `InvalidTransition` when it is locked
    pub async fn advance(&self, to_step: u32) -> Result<()> {
        let advanced = self.ctx.session.lock().advance(to_step);
        if let Err(e) = advanced {
            return Err(self.ctx.reject(e).await);
        }
        self.ctx
            .emit(WorkflowEvent::StepAdvanced {
                session_id: self.ctx.session_id,
                step: to_step,
                timestamp: Utc::now(),
            })
            .await;
        Ok(())
    }

    /// Mark `step` completed; repeated calls are no-ops
    pub async fn mark_completed(&self, step: u32) -> Result<()> {
        let marked = {
            let mut session = self.ctx.session.lock();
            let already = session.completed_steps.contains(&step);
            session.mark_completed(step).map(|()| !already)
        };
        match marked {
            Ok(true) => {
                self.ctx
                    .emit(WorkflowEvent::StepCompleted {
                        session_id: self.ctx.session_id,
                        step,
                        timestamp: Utc::now(),
                    })
                    .await;
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => Err(self.ctx.reject(e).await),
        }
    }

    /// Clear the session; results of in-flight work are discarded on arrival
    pub async fn reset(&self) {
        let generation = {
            let mut session = self.ctx.session.lock();
            session.reset();
            session.generation
        };
        self.ingest.detach(generation);

        tracing::info!(session_id = %self.ctx.session_id, generation, "Session reset");
        self.ctx
            .emit(WorkflowEvent::SessionReset {
                session_id: self.ctx.session_id,
                generation,
                timestamp: Utc::now(),
            })
            .await;
    }

    /// Validate and ingest an artifact
    pub async fn ingest(&self, artifact: Artifact) -> Result<IngestHandle> {
        self.ingest.ingest(artifact).await
    }

    /// Replace one insight field
    pub async fn edit(&self, field: InsightField, value: FieldValue) -> Result<()> {
        self.review.edit(field, value).await
    }

    /// Regenerate one insight field through the external service
    pub async fn regenerate(&self, field: InsightField) -> Result<FieldValue> {
        self.review.regenerate(field).await
    }

    /// Push the reviewed insights to the CRM for `prospect_id`
    pub async fn push(&self, prospect_id: &str) -> Result<PushResult> {
        self.push.push(prospect_id).await
    }
}

/// Builder for WorkflowEngine
///
/// Insight service, regenerator and CRM client are required; the rest
/// default to simulated progress, no-op events and in-memory history.
pub struct WorkflowEngineBuilder {
    kind: ArtifactKind,
    config: WorkflowConfig,
    user: CurrentUser,
    insight_service: Option<Arc<dyn InsightService>>,
    regenerator: Option<Arc<dyn Regenerator>>,
    crm: Option<Arc<dyn CrmClient>>,
    history: Option<Arc<dyn SessionHistoryStore>>,
    emitter: Option<Arc<dyn EventEmitter>>,
    progress: Option<Arc<dyn ProgressSource>>,
}

impl WorkflowEngineBuilder {
    pub fn new(kind: ArtifactKind) -> Self {
        Self {
            kind,
            config: WorkflowConfig::default(),
            user: CurrentUser::anonymous(),
            insight_service: None,
            regenerator: None,
            crm: None,
            history: None,
            emitter: None,
            progress: None,
        }
    }

    pub fn config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn user(mut self, user: CurrentUser) -> Self {
        self.user = user;
        self
    }

    pub fn insight_service(mut self, service: Arc<dyn InsightService>) -> Self {
        self.insight_service = Some(service);
        self
    }

    pub fn regenerator(mut self, regenerator: Arc<dyn Regenerator>) -> Self {
        self.regenerator = Some(regenerator);
        self
    }

    pub fn crm(mut self, crm: Arc<dyn CrmClient>) -> Self {
        self.crm = Some(crm);
        self
    }

    pub fn history(mut self, history: Arc<dyn SessionHistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn progress(mut self, progress: Arc<dyn ProgressSource>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<WorkflowEngine> {
        let insight_service = self
            .insight_service
            .ok_or_else(|| WorkflowError::config("an insight service is required"))?;
        let regenerator = self
            .regenerator
            .ok_or_else(|| WorkflowError::config("a regenerator is required"))?;
        let crm = self
            .crm
            .ok_or_else(|| WorkflowError::config("a CRM client is required"))?;
        if self.kind.step_count < 2 {
            return Err(WorkflowError::config(format!(
                "artifact kind {} needs at least 2 steps",
                self.kind.name
            )));
        }

        let progress = self
            .progress
            .unwrap_or_else(|| Arc::new(TickerProgress::from_config(&self.config)));
        let history = self
            .history
            .unwrap_or_else(|| Arc::new(InMemoryHistoryStore::new()));
        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoopEventEmitter));

        let ctx = Arc::new(SessionContext::new(self.kind, self.config, self.user, emitter));

        Ok(WorkflowEngine {
            ingest: IngestCoordinator::new(ctx.clone(), insight_service, progress),
            review: InsightsReview::new(ctx.clone(), regenerator),
            push: PushCoordinator::new(ctx.clone(), crm, history),
            ctx,
        })
    }
}
