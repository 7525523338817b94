// Session service
//
// Keeps one WorkflowEngine per session in memory. Collaborators, config and
// the history store are shared; each engine is built with the current user as
// it was when the session was created.

use dealflow_core::memory::{MockCrmClient, MockInsightService, MockRegenerator};
use dealflow_core::{
    ArtifactKind, CrmClient, CurrentUser, EventEmitter, InsightService, ProfileUpdate,
    ProgressSource, Regenerator, SessionHistoryStore, SessionRecord, TickerProgress,
    WorkflowConfig, WorkflowEngine, WorkflowError,
};
use dealflow_webhooks::{WebhookConfig, WebhookCrmClient, WebhookInsightService, WebhookRegenerator};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// External services shared by every session
#[derive(Clone)]
pub struct Collaborators {
    pub insight_service: Arc<dyn InsightService>,
    pub regenerator: Arc<dyn Regenerator>,
    pub crm: Arc<dyn CrmClient>,
}

impl Collaborators {
    /// Webhook-backed collaborators
    pub fn webhooks(config: &WebhookConfig) -> anyhow::Result<Self> {
        Ok(Self {
            insight_service: Arc::new(WebhookInsightService::new(config)?),
            regenerator: Arc::new(WebhookRegenerator::new(config)?),
            crm: Arc::new(WebhookCrmClient::new(config)?),
        })
    }

    /// Simulated collaborators that answer with canned insights
    pub fn simulated() -> Self {
        Self {
            insight_service: Arc::new(MockInsightService::new()),
            regenerator: Arc::new(MockRegenerator::new()),
            crm: Arc::new(MockCrmClient::new()),
        }
    }
}

pub struct SessionService {
    sessions: RwLock<HashMap<Uuid, Arc<WorkflowEngine>>>,
    user: RwLock<CurrentUser>,
    collaborators: Collaborators,
    config: WorkflowConfig,
    progress: Arc<dyn ProgressSource>,
    history: Arc<dyn SessionHistoryStore>,
    emitter: Arc<dyn EventEmitter>,
}

impl SessionService {
    pub fn new(
        config: WorkflowConfig,
        user: CurrentUser,
        collaborators: Collaborators,
        history: Arc<dyn SessionHistoryStore>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        let progress = Arc::new(TickerProgress::from_config(&config));
        Self {
            sessions: RwLock::new(HashMap::new()),
            user: RwLock::new(user),
            collaborators,
            config,
            progress,
            history,
            emitter,
        }
    }

    /// Replace the progress source used for new sessions
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSource>) -> Self {
        self.progress = progress;
        self
    }

    /// Start a session for the artifact kind named `kind`
    pub fn create(&self, kind: &str) -> Result<Arc<WorkflowEngine>, WorkflowError> {
        let kind = ArtifactKind::by_name(kind, &self.config)
            .ok_or_else(|| WorkflowError::config(format!("unknown artifact kind: {kind}")))?;

        let engine = WorkflowEngine::builder(kind)
            .config(self.config.clone())
            .user(self.current_user())
            .insight_service(self.collaborators.insight_service.clone())
            .regenerator(self.collaborators.regenerator.clone())
            .crm(self.collaborators.crm.clone())
            .history(self.history.clone())
            .emitter(self.emitter.clone())
            .progress(self.progress.clone())
            .build()?;
        let engine = Arc::new(engine);

        self.sessions.write().insert(engine.id(), engine.clone());
        tracing::info!(session_id = %engine.id(), kind = %engine.kind().name, "Session created");
        Ok(engine)
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<WorkflowEngine>> {
        self.sessions.read().get(&id).cloned()
    }

    /// All sessions, oldest first
    pub fn list(&self) -> Vec<Arc<WorkflowEngine>> {
        let mut sessions: Vec<_> = self.sessions.read().values().cloned().collect();
        sessions.sort_by_key(|engine| engine.id());
        sessions
    }

    pub fn delete(&self, id: Uuid) -> bool {
        self.sessions.write().remove(&id).is_some()
    }

    pub fn current_user(&self) -> CurrentUser {
        self.user.read().clone()
    }

    /// Apply a profile update; sessions created afterwards see the new record
    pub fn update_user(&self, update: &ProfileUpdate) -> CurrentUser {
        let mut user = self.user.write();
        *user = update.apply(&user);
        user.clone()
    }

    /// Pushed sessions of the current user, newest first
    pub async fn history(&self) -> anyhow::Result<Vec<SessionRecord>> {
        let user_id = self.user.read().id;
        self.history.list(user_id).await
    }

    /// Whether the given kind name is known
    pub fn is_known_kind(&self, kind: &str) -> bool {
        ArtifactKind::by_name(kind, &self.config).is_some()
    }
}
