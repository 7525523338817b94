// In-memory implementations for examples and testing
//
// These implementations keep all data in memory, making them perfect for:
// - Unit and integration tests of the workflow engine
// - Running the API without any external webhooks configured
// - Quick prototyping

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use uuid::Uuid;

use crate::artifact::{Artifact, ArtifactKind};
use crate::error::Result;
use crate::events::WorkflowEvent;
use crate::insights::{FieldValue, InsightField, InsightsBundle, SentimentPoint};
use crate::progress::{ProgressSource, ProgressStream};
use crate::traits::{
    CrmClient, CrmPushRequest, CrmReceipt, EventEmitter, InsightService, RegenerateRequest,
    Regenerator, SessionHistoryStore, SessionRecord,
};
use crate::user::CurrentUser;

/// A complete bundle suitable for tests and demos
pub fn sample_insights() -> InsightsBundle {
    InsightsBundle {
        summary_text: "Prospect is evaluating vendors for Q3 rollout.".to_string(),
        sentiment_series: vec![
            SentimentPoint::new(0.0, 0.1),
            SentimentPoint::new(120.0, 0.4),
            SentimentPoint::new(300.0, 0.7),
        ],
        key_points: vec![
            "Budget approved for Q3".to_string(),
            "Security review required".to_string(),
        ],
        email_draft: "Thanks for your time today.".to_string(),
        presentation_draft: "Slide 1: Rollout plan".to_string(),
    }
}

// ============================================================================
// InMemoryEventEmitter - Collects events in memory
// ============================================================================

/// In-memory event emitter
///
/// Collects all emitted events in a Vec for later inspection.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEventEmitter {
    events: Arc<RwLock<Vec<WorkflowEvent>>>,
}

impl InMemoryEventEmitter {
    /// Create a new in-memory event emitter
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected events
    pub async fn events(&self) -> Vec<WorkflowEvent> {
        self.events.read().await.clone()
    }

    /// Percentages of all IngestProgress events, in emission order
    pub async fn progress_values(&self) -> Vec<u8> {
        self.events
            .read()
            .await
            .iter()
            .filter_map(|event| match event {
                WorkflowEvent::IngestProgress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    /// Notification texts of failure events
    pub async fn failure_notifications(&self) -> Vec<String> {
        self.events
            .read()
            .await
            .iter()
            .filter(|event| event.is_failure())
            .filter_map(|event| event.notification().map(str::to_string))
            .collect()
    }

    /// Clear all events
    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl EventEmitter for InMemoryEventEmitter {
    async fn emit(&self, event: WorkflowEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}

// ============================================================================
// InMemoryHistoryStore - Stores session history in memory
// ============================================================================

/// In-memory session history
#[derive(Debug, Default, Clone)]
pub struct InMemoryHistoryStore {
    records: Arc<RwLock<Vec<SessionRecord>>>,
}

impl InMemoryHistoryStore {
    /// Create a new in-memory history store
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, in insertion order
    pub async fn records(&self) -> Vec<SessionRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl SessionHistoryStore for InMemoryHistoryStore {
    async fn record(&self, record: SessionRecord) -> anyhow::Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn list(&self, user_id: Uuid) -> anyhow::Result<Vec<SessionRecord>> {
        let mut records: Vec<SessionRecord> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.pushed_at.cmp(&a.pushed_at));
        Ok(records)
    }
}

// ============================================================================
// Gate - Lets tests decide when a mock call returns
// ============================================================================

/// Holds mock calls until released
#[derive(Debug, Default, Clone)]
pub struct Gate {
    notify: Arc<Notify>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let one waiting (or the next) call through
    pub fn release(&self) {
        self.notify.notify_one();
    }

    async fn wait(&self) {
        self.notify.notified().await;
    }
}

// ============================================================================
// MockInsightService - Returns predefined bundles
// ============================================================================

/// Mock insight service
///
/// Returns queued responses in order. An empty queue answers with
/// `sample_insights()`.
#[derive(Debug, Default)]
pub struct MockInsightService {
    responses: RwLock<VecDeque<std::result::Result<InsightsBundle, String>>>,
    gate: Option<Gate>,
    calls: AtomicUsize,
}

impl MockInsightService {
    /// Create a new mock insight service
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call until `gate` is released
    pub fn with_gate(gate: Gate) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    /// Queue a successful response
    pub async fn add_response(&self, bundle: InsightsBundle) {
        self.responses.write().await.push_back(Ok(bundle));
    }

    /// Queue a failure
    pub async fn add_failure(&self, message: impl Into<String>) {
        self.responses.write().await.push_back(Err(message.into()));
    }

    /// Number of analyze calls made
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InsightService for MockInsightService {
    async fn analyze(
        &self,
        _artifact: &Artifact,
        _kind: &ArtifactKind,
        _user: &CurrentUser,
    ) -> anyhow::Result<InsightsBundle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.responses.write().await.pop_front();

        if let Some(gate) = &self.gate {
            gate.wait().await;
        }

        match response {
            Some(Ok(bundle)) => Ok(bundle),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(sample_insights()),
        }
    }
}

// ============================================================================
// MockRegenerator - Returns predefined field values
// ============================================================================

/// Mock regeneration service
#[derive(Debug, Default)]
pub struct MockRegenerator {
    responses: RwLock<VecDeque<std::result::Result<FieldValue, String>>>,
    gate: Option<Gate>,
    call_log: RwLock<Vec<InsightField>>,
}

impl MockRegenerator {
    /// Create a new mock regenerator
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call until `gate` is released
    pub fn with_gate(gate: Gate) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    /// Queue a successful value
    pub async fn add_response(&self, value: FieldValue) {
        self.responses.write().await.push_back(Ok(value));
    }

    /// Queue a failure
    pub async fn add_failure(&self, message: impl Into<String>) {
        self.responses.write().await.push_back(Err(message.into()));
    }

    /// Fields requested so far
    pub async fn calls(&self) -> Vec<InsightField> {
        self.call_log.read().await.clone()
    }
}

#[async_trait]
impl Regenerator for MockRegenerator {
    async fn regenerate(
        &self,
        request: &RegenerateRequest,
        _user: &CurrentUser,
    ) -> anyhow::Result<FieldValue> {
        self.call_log.write().await.push(request.field);
        let response = self.responses.write().await.pop_front();

        if let Some(gate) = &self.gate {
            gate.wait().await;
        }

        match response {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(request.insights.get(request.field)),
        }
    }
}

// ============================================================================
// MockCrmClient - Records pushes
// ============================================================================

/// Mock CRM client
///
/// Answers queued results in order; an empty queue accepts the push.
#[derive(Debug, Default)]
pub struct MockCrmClient {
    responses: RwLock<VecDeque<std::result::Result<CrmReceipt, String>>>,
    gate: Option<Gate>,
    requests: RwLock<Vec<CrmPushRequest>>,
}

impl MockCrmClient {
    /// Create a new mock CRM client
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call until `gate` is released
    pub fn with_gate(gate: Gate) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    /// Queue a receipt
    pub async fn add_receipt(&self, receipt: CrmReceipt) {
        self.responses.write().await.push_back(Ok(receipt));
    }

    /// Queue a transport failure
    pub async fn add_failure(&self, message: impl Into<String>) {
        self.responses.write().await.push_back(Err(message.into()));
    }

    /// Requests received so far
    pub async fn requests(&self) -> Vec<CrmPushRequest> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl CrmClient for MockCrmClient {
    async fn push(&self, request: &CrmPushRequest) -> anyhow::Result<CrmReceipt> {
        self.requests.write().await.push(request.clone());
        let response = self.responses.write().await.pop_front();

        if let Some(gate) = &self.gate {
            gate.wait().await;
        }

        match response {
            Some(Ok(receipt)) => Ok(receipt),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(CrmReceipt {
                record_id: Some(format!("crm-{}", request.session_id)),
            }),
        }
    }
}

// ============================================================================
// ScriptedProgress - Emits a fixed sequence of values
// ============================================================================

/// Progress source that yields a fixed script, each value after its delay
#[derive(Debug, Clone, Default)]
pub struct ScriptedProgress {
    script: Vec<(Duration, u8)>,
}

impl ScriptedProgress {
    pub fn new(script: Vec<(Duration, u8)>) -> Self {
        Self { script }
    }
}

impl ProgressSource for ScriptedProgress {
    fn start(&self) -> ProgressStream {
        let script = self.script.clone();
        Box::pin(futures::stream::iter(script).then(|(delay, percent)| async move {
            tokio::time::sleep(delay).await;
            percent
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_mock_insight_service_queue() {
        let service = MockInsightService::new();
        service.add_failure("boom").await;

        let artifact = Artifact::recording("gong", "1");
        let kind = ArtifactKind::call_recording(&Default::default());
        let user = CurrentUser::anonymous();

        assert!(service.analyze(&artifact, &kind, &user).await.is_err());
        assert_eq!(
            service.analyze(&artifact, &kind, &user).await.unwrap(),
            sample_insights()
        );
        assert_eq!(service.call_count(), 2);
    }

    #[tokio::test]
    async fn test_history_lists_newest_first_per_user() {
        let store = InMemoryHistoryStore::new();
        let user_id = Uuid::now_v7();
        let older = Utc::now() - chrono::Duration::minutes(5);

        for (pushed_at, owner) in [(older, user_id), (Utc::now(), user_id), (Utc::now(), Uuid::nil())] {
            store
                .record(SessionRecord {
                    session_id: Uuid::now_v7(),
                    user_id: owner,
                    kind: "call_transcript".to_string(),
                    prospect_id: "acme".to_string(),
                    artifact_label: "call.txt".to_string(),
                    summary_text: "S".to_string(),
                    crm_record_id: None,
                    pushed_at,
                })
                .await
                .unwrap();
        }

        let records = store.list(user_id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].pushed_at > records[1].pushed_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_progress() {
        let progress = ScriptedProgress::new(vec![
            (Duration::from_millis(10), 20),
            (Duration::from_millis(10), 10),
        ]);
        let values: Vec<u8> = progress.start().collect().await;
        assert_eq!(values, vec![20, 10]);
    }
}
