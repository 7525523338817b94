// Push coordinator
//
// At most one successful push per session. The session moves to Pushing
// before the CRM is called, which also rejects a concurrent second push. On
// transport failure the session returns to Reviewing without recording any
// completed step so the user can retry.

use chrono::Utc;
use std::sync::Arc;

use crate::context::SessionContext;
use crate::error::{Result, ValidationError, WorkflowError};
use crate::events::WorkflowEvent;
use crate::session::{Phase, PushResult};
use crate::traits::{CrmClient, CrmPushRequest, SessionHistoryStore, SessionRecord};

/// Commits reviewed insights to the CRM
pub struct PushCoordinator {
    ctx: Arc<SessionContext>,
    crm: Arc<dyn CrmClient>,
    history: Arc<dyn SessionHistoryStore>,
}

impl PushCoordinator {
    pub(crate) fn new(
        ctx: Arc<SessionContext>,
        crm: Arc<dyn CrmClient>,
        history: Arc<dyn SessionHistoryStore>,
    ) -> Self {
        Self { ctx, crm, history }
    }

    /// Push the session's current insights for `prospect_id`
    pub async fn push(&self, prospect_id: &str) -> Result<PushResult> {
        let prospect_id = prospect_id.trim();

        // AlreadyPushed wins over every other rejection, including a blank prospect
        let begun = {
            let mut session = self.ctx.session.lock();
            let guarded = if session.is_pushed() {
                Err(WorkflowError::AlreadyPushed)
            } else if prospect_id.is_empty() {
                Err(ValidationError::MissingProspectId.into())
            } else {
                session.begin_push()
            };
            guarded.map(|(generation, insights)| {
                let artifact_label = session
                    .artifact
                    .as_ref()
                    .map(|a| a.label.clone())
                    .unwrap_or_default();
                (generation, insights, artifact_label)
            })
        };
        let (generation, insights, artifact_label) = match begun {
            Ok(begun) => begun,
            Err(e) => return Err(self.ctx.reject(e).await),
        };

        let request = CrmPushRequest {
            session_id: self.ctx.session_id,
            prospect_id: prospect_id.to_string(),
            target: self.ctx.kind.push_target,
            artifact_label,
            insights,
            user_id: self.ctx.user.id,
            user_email: self.ctx.user.email.clone(),
        };

        tracing::info!(
            session_id = %self.ctx.session_id,
            prospect_id,
            target = ?request.target,
            "Pushing insights to CRM"
        );

        let timeout = self.ctx.config.push_timeout;
        let outcome = match tokio::time::timeout(timeout, self.crm.push(&request)).await {
            Ok(Ok(receipt)) => Ok(receipt),
            Ok(Err(e)) => Err(WorkflowError::push(format!("{e:#}"))),
            Err(_) => Err(WorkflowError::push(format!(
                "CRM did not respond within {timeout:?}"
            ))),
        };

        let receipt = match outcome {
            Ok(receipt) => receipt,
            Err(e) => {
                let current = {
                    let mut session = self.ctx.session.lock();
                    let current = session.is_current(generation, Phase::Pushing);
                    if current {
                        session.fail_push();
                    }
                    current
                };
                if !current {
                    return Err(WorkflowError::Cancelled);
                }
                tracing::warn!(session_id = %self.ctx.session_id, error = %e, "CRM push failed");
                self.ctx
                    .emit(WorkflowEvent::PushFailed {
                        session_id: self.ctx.session_id,
                        message: e.to_string(),
                        timestamp: Utc::now(),
                    })
                    .await;
                return Err(e);
            }
        };

        let result = PushResult {
            success: true,
            timestamp: Utc::now(),
            crm_record_id: receipt.record_id.clone(),
        };

        let current = {
            let mut session = self.ctx.session.lock();
            let current = session.is_current(generation, Phase::Pushing);
            if current {
                session.complete_push(result.clone());
            }
            current
        };

        if !current {
            // the CRM has the data, but the session it belonged to is gone
            tracing::warn!(
                session_id = %self.ctx.session_id,
                generation,
                "Push completed after session reset; result not applied"
            );
            self.ctx
                .emit(WorkflowEvent::StaleResultDiscarded {
                    session_id: self.ctx.session_id,
                    generation,
                    timestamp: Utc::now(),
                })
                .await;
            return Err(WorkflowError::Cancelled);
        }

        let record = SessionRecord {
            session_id: self.ctx.session_id,
            user_id: self.ctx.user.id,
            kind: self.ctx.kind.name.clone(),
            prospect_id: request.prospect_id.clone(),
            artifact_label: request.artifact_label.clone(),
            summary_text: request.insights.summary_text.clone(),
            crm_record_id: receipt.record_id,
            pushed_at: result.timestamp,
        };
        if let Err(e) = self.history.record(record).await {
            tracing::warn!(session_id = %self.ctx.session_id, error = %e, "Failed to record session history");
        }

        tracing::info!(session_id = %self.ctx.session_id, "Insights pushed to CRM");
        self.ctx
            .emit(WorkflowEvent::PushSucceeded {
                session_id: self.ctx.session_id,
                crm_record_id: result.crm_record_id.clone(),
                timestamp: Utc::now(),
            })
            .await;

        Ok(result)
    }
}
