// Insights review
//
// Edits replace one field synchronously. Regeneration asks the external
// service for one field and, on success, writes only that field into the
// live bundle, so edits made to other fields while the call was out survive.

use chrono::Utc;
use std::sync::Arc;

use crate::context::SessionContext;
use crate::error::{Result, WorkflowError};
use crate::events::WorkflowEvent;
use crate::insights::{FieldValue, InsightField};
use crate::session::Phase;
use crate::traits::{RegenerateRequest, Regenerator};

/// Editable view over the session's insights
pub struct InsightsReview {
    ctx: Arc<SessionContext>,
    regenerator: Arc<dyn Regenerator>,
}

impl InsightsReview {
    pub(crate) fn new(ctx: Arc<SessionContext>, regenerator: Arc<dyn Regenerator>) -> Self {
        Self { ctx, regenerator }
    }

    /// Replace `field` with `value`
    pub async fn edit(&self, field: InsightField, value: FieldValue) -> Result<()> {
        let edited = {
            let mut session = self.ctx.session.lock();
            session.ensure_reviewing().and_then(|()| {
                let phase = session.phase;
                session
                    .insights
                    .as_mut()
                    .ok_or_else(|| WorkflowError::transition(phase, "session has no insights"))?
                    .set(field, value)
            })
        };

        if let Err(e) = edited {
            return Err(self.ctx.reject(e).await);
        }

        tracing::debug!(session_id = %self.ctx.session_id, %field, "Insight field edited");
        self.ctx
            .emit(WorkflowEvent::FieldEdited {
                session_id: self.ctx.session_id,
                field,
                timestamp: Utc::now(),
            })
            .await;
        Ok(())
    }

    /// Ask the regeneration service for a new value of `field`
    ///
    /// On failure the prior value stays in place and `RegenerationFailure`
    /// is returned.
    pub async fn regenerate(&self, field: InsightField) -> Result<FieldValue> {
        let prepared = {
            let session = self.ctx.session.lock();
            session.ensure_reviewing().and_then(|()| {
                let insights = session.insights.clone();
                let artifact = session.artifact.clone();
                match (insights, artifact) {
                    (Some(insights), Some(artifact)) => Ok((
                        session.generation,
                        RegenerateRequest {
                            session_id: session.id,
                            field,
                            artifact,
                            insights,
                        },
                    )),
                    _ => Err(WorkflowError::transition(
                        session.phase,
                        "session has no insights to regenerate",
                    )),
                }
            })
        };

        let (generation, request) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return Err(self.ctx.reject(e).await),
        };

        let timeout = self.ctx.config.regenerate_timeout;
        let outcome = tokio::time::timeout(
            timeout,
            self.regenerator.regenerate(&request, &self.ctx.user),
        )
        .await;

        let value = match outcome {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => return Err(self.failed(field, format!("{e:#}")).await),
            Err(_) => {
                return Err(self
                    .failed(field, format!("timed out after {timeout:?}"))
                    .await)
            }
        };

        let applied = {
            let mut session = self.ctx.session.lock();
            if session.generation != generation {
                Err(WorkflowError::Cancelled)
            } else if !session.is_current(generation, Phase::Reviewing) {
                Err(WorkflowError::regeneration(
                    field,
                    format!("session is {} and no longer in review", session.phase),
                ))
            } else {
                match session.insights.as_mut() {
                    Some(insights) => insights
                        .set(field, value.clone())
                        .map_err(|e| WorkflowError::regeneration(field, e.to_string())),
                    None => Err(WorkflowError::Cancelled),
                }
            }
        };

        match applied {
            Ok(()) => {
                tracing::info!(session_id = %self.ctx.session_id, %field, "Insight field regenerated");
                self.ctx
                    .emit(WorkflowEvent::FieldRegenerated {
                        session_id: self.ctx.session_id,
                        field,
                        timestamp: Utc::now(),
                    })
                    .await;
                Ok(value)
            }
            Err(WorkflowError::RegenerationFailure { reason, .. }) => {
                Err(self.failed(field, reason).await)
            }
            Err(e) => Err(e),
        }
    }

    async fn failed(&self, field: InsightField, reason: String) -> WorkflowError {
        tracing::warn!(session_id = %self.ctx.session_id, %field, reason = %reason, "Regeneration failed");
        let err = WorkflowError::regeneration(field, reason);
        self.ctx
            .emit(WorkflowEvent::RegenerationFailed {
                session_id: self.ctx.session_id,
                field,
                message: err.to_string(),
                timestamp: Utc::now(),
            })
            .await;
        err
    }
}
