// Ingest coordinator
//
// Validates an artifact synchronously, then runs the insight service on a
// spawned task while forwarding progress. The task tags its work with the
// session generation it started under; if the session was reset in the
// meantime the result is discarded instead of applied.

use chrono::Utc;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::artifact::{Artifact, ArtifactRef};
use crate::context::SessionContext;
use crate::error::{Result, WorkflowError};
use crate::events::WorkflowEvent;
use crate::insights::InsightsBundle;
use crate::progress::{ProgressReporter, ProgressSource};
use crate::session::Phase;
use crate::traits::InsightService;

/// Handle to an ingest that has been accepted and is running
#[derive(Debug)]
pub struct IngestHandle {
    generation: u64,
    artifact: ArtifactRef,
    progress: watch::Receiver<u8>,
    task: JoinHandle<Result<InsightsBundle>>,
}

impl IngestHandle {
    /// Session generation the ingest belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reference to the accepted artifact
    pub fn artifact(&self) -> &ArtifactRef {
        &self.artifact
    }

    /// Receiver for this ingest's progress, non-decreasing in [0, 100]
    pub fn progress(&self) -> watch::Receiver<u8> {
        self.progress.clone()
    }

    /// Wait for the ingest to resolve
    ///
    /// Resolves to the applied bundle, `IngestFailure`, or `Cancelled` when
    /// the session was reset before the result arrived.
    pub async fn wait(self) -> Result<InsightsBundle> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(WorkflowError::Cancelled),
            Err(e) => Err(WorkflowError::Internal(anyhow::anyhow!(
                "ingest task panicked: {e}"
            ))),
        }
    }
}

struct InflightIngest {
    generation: u64,
    progress: watch::Receiver<u8>,
}

/// Accepts artifacts and turns them into insights
pub struct IngestCoordinator {
    ctx: Arc<SessionContext>,
    service: Arc<dyn InsightService>,
    progress_source: Arc<dyn ProgressSource>,
    inflight: Mutex<Option<InflightIngest>>,
}

impl IngestCoordinator {
    pub(crate) fn new(
        ctx: Arc<SessionContext>,
        service: Arc<dyn InsightService>,
        progress_source: Arc<dyn ProgressSource>,
    ) -> Self {
        Self {
            ctx,
            service,
            progress_source,
            inflight: Mutex::new(None),
        }
    }

    /// Validate `artifact` and start the insight pipeline
    ///
    /// Validation failures return immediately and leave the session idle;
    /// no task is spawned and no collaborator is called.
    pub async fn ingest(&self, artifact: Artifact) -> Result<IngestHandle> {
        let artifact_ref = match self.ctx.kind.validate(&artifact) {
            Ok(artifact_ref) => artifact_ref,
            Err(e) => return Err(self.ctx.reject(e.into()).await),
        };

        let begun = self.ctx.session.lock().begin_ingest(artifact_ref.clone());
        let generation = match begun {
            Ok(generation) => generation,
            Err(e) => return Err(self.ctx.reject(e).await),
        };

        let (reporter, progress) = ProgressReporter::channel();
        {
            // a newer generation may have started while the session was unlocked
            let mut inflight = self.inflight.lock();
            if inflight.as_ref().map_or(true, |i| i.generation <= generation) {
                *inflight = Some(InflightIngest {
                    generation,
                    progress: progress.clone(),
                });
            }
        }

        tracing::info!(
            session_id = %self.ctx.session_id,
            generation,
            artifact = %artifact_ref.label,
            "Ingest started"
        );
        self.ctx
            .emit(WorkflowEvent::IngestStarted {
                session_id: self.ctx.session_id,
                artifact_label: artifact_ref.label.clone(),
                generation,
                timestamp: Utc::now(),
            })
            .await;

        let task = tokio::spawn(run_ingest(
            self.ctx.clone(),
            self.service.clone(),
            self.progress_source.clone(),
            artifact,
            generation,
            reporter,
        ));

        Ok(IngestHandle {
            generation,
            artifact: artifact_ref,
            progress,
            task,
        })
    }

    /// Progress of the ingest belonging to the current generation
    pub fn progress(&self) -> Option<u8> {
        let generation = self.ctx.session.lock().generation;
        self.inflight
            .lock()
            .as_ref()
            .filter(|inflight| inflight.generation == generation)
            .map(|inflight| *inflight.progress.borrow())
    }

    /// Forget any in-flight ingest older than `generation`
    ///
    /// An ingest already started under `generation` stays tracked. Detached
    /// tasks find out through the generation when their result arrives.
    pub(crate) fn detach(&self, generation: u64) {
        let mut inflight = self.inflight.lock();
        if inflight.as_ref().is_some_and(|i| i.generation < generation) {
            inflight.take();
        }
    }
}

async fn run_ingest(
    ctx: Arc<SessionContext>,
    service: Arc<dyn InsightService>,
    progress_source: Arc<dyn ProgressSource>,
    artifact: Artifact,
    generation: u64,
    reporter: ProgressReporter,
) -> Result<InsightsBundle> {
    let timeout = ctx.config.ingest_timeout;
    let analysis = tokio::time::timeout(timeout, service.analyze(&artifact, &ctx.kind, &ctx.user));
    tokio::pin!(analysis);
    let mut ticks = progress_source.start().fuse();

    let outcome = loop {
        tokio::select! {
            result = &mut analysis => break result,
            Some(percent) = ticks.next() => {
                let current = ctx.session.lock().generation == generation;
                if reporter.report(percent) && current {
                    ctx.emit(WorkflowEvent::IngestProgress {
                        session_id: ctx.session_id,
                        generation,
                        percent: reporter.current(),
                        timestamp: Utc::now(),
                    })
                    .await;
                }
            }
        }
    };

    let result = match outcome {
        Err(_) => Err(WorkflowError::ingest(format!(
            "insight service timed out after {timeout:?}"
        ))),
        Ok(Err(e)) => Err(WorkflowError::ingest(format!("{e:#}"))),
        Ok(Ok(bundle)) => bundle
            .validate(&ctx.kind.required_fields)
            .map(|()| bundle)
            .map_err(|reason| WorkflowError::ingest(format!("malformed insights payload: {reason}"))),
    };

    let applied = {
        let mut session = ctx.session.lock();
        if session.is_current(generation, Phase::Ingesting) {
            match &result {
                Ok(bundle) => session.complete_ingest(bundle.clone()),
                Err(_) => session.fail_ingest(),
            }
            true
        } else {
            false
        }
    };

    if !applied {
        tracing::info!(session_id = %ctx.session_id, generation, "Discarding stale ingest result");
        ctx.emit(WorkflowEvent::StaleResultDiscarded {
            session_id: ctx.session_id,
            generation,
            timestamp: Utc::now(),
        })
        .await;
        return Err(WorkflowError::Cancelled);
    }

    match result {
        Ok(bundle) => {
            reporter.finish();
            tracing::info!(session_id = %ctx.session_id, generation, "Ingest completed");
            ctx.emit(WorkflowEvent::IngestProgress {
                session_id: ctx.session_id,
                generation,
                percent: 100,
                timestamp: Utc::now(),
            })
            .await;
            ctx.emit(WorkflowEvent::IngestCompleted {
                session_id: ctx.session_id,
                generation,
                timestamp: Utc::now(),
            })
            .await;
            Ok(bundle)
        }
        Err(e) => {
            tracing::warn!(session_id = %ctx.session_id, generation, error = %e, "Ingest failed");
            ctx.emit(WorkflowEvent::IngestFailed {
                session_id: ctx.session_id,
                generation,
                message: e.to_string(),
                timestamp: Utc::now(),
            })
            .await;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactKind;
    use crate::config::WorkflowConfig;
    use crate::events::NoopEventEmitter;
    use crate::memory::{Gate, MockInsightService};
    use crate::progress::NoProgress;
    use crate::user::CurrentUser;

    fn coordinator(gate: Gate) -> IngestCoordinator {
        let config = WorkflowConfig::default();
        let ctx = Arc::new(SessionContext::new(
            ArtifactKind::call_transcript(&config),
            config,
            CurrentUser::anonymous(),
            Arc::new(NoopEventEmitter),
        ));
        IngestCoordinator::new(
            ctx,
            Arc::new(MockInsightService::with_gate(gate)),
            Arc::new(NoProgress),
        )
    }

    fn transcript() -> Artifact {
        Artifact::upload("call.txt", "text/plain", b"Rep: hello".to_vec())
    }

    #[tokio::test]
    async fn test_detach_keeps_ingest_of_newer_generation() {
        let gate = Gate::new();
        let coordinator = coordinator(gate.clone());

        let stale = coordinator.ingest(transcript()).await.unwrap();

        // A new ingest starts between the reset and the detach
        let generation = {
            let mut session = coordinator.ctx.session.lock();
            session.reset();
            session.generation
        };
        let current = coordinator.ingest(transcript()).await.unwrap();
        assert_eq!(current.generation(), generation);
        coordinator.detach(generation);

        assert_eq!(coordinator.progress(), Some(0));

        // both calls are parked on the gate before it opens twice
        tokio::task::yield_now().await;
        gate.release();
        gate.release();
        assert!(matches!(stale.wait().await, Err(WorkflowError::Cancelled)));
        assert!(current.wait().await.is_ok());
        assert_eq!(coordinator.ctx.session.lock().phase, Phase::Reviewing);
        assert_eq!(coordinator.progress(), Some(100));
    }

    #[tokio::test]
    async fn test_detach_drops_older_generation() {
        let gate = Gate::new();
        let coordinator = coordinator(gate.clone());

        let stale = coordinator.ingest(transcript()).await.unwrap();
        let generation = {
            let mut session = coordinator.ctx.session.lock();
            session.reset();
            session.generation
        };
        coordinator.detach(generation);
        assert!(coordinator.inflight.lock().is_none());

        gate.release();
        assert!(matches!(stale.wait().await, Err(WorkflowError::Cancelled)));
    }
}
