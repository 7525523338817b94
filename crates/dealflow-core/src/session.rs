// Workflow session domain types
//
// WorkflowSession is the single piece of mutable state a workflow owns. All
// transitions below are pure and synchronous; the coordinators call them while
// holding the session lock and never across an await point.
//
// Phase machine:
//   Idle -> Ingesting -> Reviewing -> Pushing -> Done
//   Ingesting -> Idle      (ingest failure)
//   Pushing -> Reviewing   (push failure)
//   Done is terminal until reset

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::artifact::ArtifactRef;
use crate::error::{Result, WorkflowError};
use crate::insights::InsightsBundle;

/// Step of the upload wizard that holds the artifact
pub const UPLOAD_STEP: u32 = 1;
/// Step of the wizard where insights are reviewed
pub const REVIEW_STEP: u32 = 2;

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Ingesting,
    Reviewing,
    Pushing,
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Ingesting => write!(f, "ingesting"),
            Phase::Reviewing => write!(f, "reviewing"),
            Phase::Pushing => write!(f, "pushing"),
            Phase::Done => write!(f, "done"),
        }
    }
}

/// Outcome of the CRM push, set once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct PushResult {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    /// Identifier of the record created at the CRM, when it reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crm_record_id: Option<String>,
}

/// State of one pass through the upload, review and push wizard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WorkflowSession {
    pub id: Uuid,
    /// Name of the ArtifactKind driving this session
    pub kind: String,
    pub step_count: u32,
    pub current_step: u32,
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<u32>))]
    pub completed_steps: BTreeSet<u32>,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<InsightsBundle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_result: Option<PushResult>,
    /// Bumped on every reset; async results tagged with an older value are dropped
    pub generation: u64,
    pub created_at: DateTime<Utc>,
}

impl WorkflowSession {
    /// Create a fresh session for an artifact kind with `step_count` steps
    pub fn new(kind: impl Into<String>, step_count: u32) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind: kind.into(),
            step_count: step_count.max(1),
            current_step: UPLOAD_STEP,
            completed_steps: BTreeSet::new(),
            phase: Phase::Idle,
            artifact: None,
            insights: None,
            push_result: None,
            generation: 0,
            created_at: Utc::now(),
        }
    }

    /// Final, success step of the wizard
    pub fn terminal_step(&self) -> u32 {
        self.step_count
    }

    /// Highest step the gate will currently let the user enter
    pub fn max_reachable_step(&self) -> u32 {
        let highest_completed = self.completed_steps.iter().next_back().copied().unwrap_or(0);
        (highest_completed.max(UPLOAD_STEP) + 1).min(self.step_count)
    }

    /// Whether insights have been pushed successfully
    pub fn is_pushed(&self) -> bool {
        self.push_result.as_ref().is_some_and(|r| r.success)
    }

    /// Move to `to_step`
    ///
    /// Allowed when `to_step` is within the wizard and no further than one
    /// step past the highest completed step. Once pushed, only the terminal
    /// step may be entered.
    pub fn advance(&mut self, to_step: u32) -> Result<()> {
        if to_step < UPLOAD_STEP || to_step > self.step_count {
            return Err(WorkflowError::transition(
                self.phase,
                format!("step {to_step} is outside 1..={}", self.step_count),
            ));
        }

        if self.phase == Phase::Done && to_step != self.terminal_step() {
            return Err(WorkflowError::transition(
                self.phase,
                "session is complete; reset to start over",
            ));
        }

        let reachable = self.max_reachable_step();
        if to_step > reachable {
            return Err(WorkflowError::transition(
                self.phase,
                format!("step {to_step} is locked; furthest reachable step is {reachable}"),
            ));
        }

        self.current_step = to_step;
        Ok(())
    }

    /// Record `step` as completed; idempotent
    pub fn mark_completed(&mut self, step: u32) -> Result<()> {
        if step < UPLOAD_STEP || step > self.step_count {
            return Err(WorkflowError::transition(
                self.phase,
                format!("cannot complete step {step}; steps are 1..={}", self.step_count),
            ));
        }
        self.completed_steps.insert(step);
        Ok(())
    }

    /// Clear every field back to its initial value and start a new generation
    ///
    /// The session id, kind and creation time are kept so callers can keep
    /// addressing the same session.
    pub fn reset(&mut self) {
        self.current_step = UPLOAD_STEP;
        self.completed_steps.clear();
        self.phase = Phase::Idle;
        self.artifact = None;
        self.insights = None;
        self.push_result = None;
        self.generation += 1;
    }

    /// Idle -> Ingesting
    pub(crate) fn begin_ingest(&mut self, artifact: ArtifactRef) -> Result<u64> {
        match self.phase {
            Phase::Idle => {}
            Phase::Ingesting => return Err(WorkflowError::Busy { operation: "ingest" }),
            Phase::Pushing => return Err(WorkflowError::Busy { operation: "push" }),
            phase => {
                return Err(WorkflowError::transition(
                    phase,
                    "an artifact was already ingested; reset to start a new session",
                ))
            }
        }
        self.phase = Phase::Ingesting;
        self.artifact = Some(artifact);
        Ok(self.generation)
    }

    /// Whether an async result started at `generation` may still be applied
    pub(crate) fn is_current(&self, generation: u64, phase: Phase) -> bool {
        self.generation == generation && self.phase == phase
    }

    /// Ingesting -> Reviewing
    pub(crate) fn complete_ingest(&mut self, insights: InsightsBundle) {
        self.insights = Some(insights);
        self.phase = Phase::Reviewing;
        self.completed_steps.insert(UPLOAD_STEP);
    }

    /// Ingesting -> Idle
    pub(crate) fn fail_ingest(&mut self) {
        self.phase = Phase::Idle;
        self.artifact = None;
        self.insights = None;
    }

    /// Reviewing -> Pushing, returns the snapshot to send
    pub(crate) fn begin_push(&mut self) -> Result<(u64, InsightsBundle)> {
        if self.is_pushed() {
            return Err(WorkflowError::AlreadyPushed);
        }
        match self.phase {
            Phase::Reviewing => {}
            Phase::Pushing => return Err(WorkflowError::Busy { operation: "push" }),
            Phase::Ingesting => return Err(WorkflowError::Busy { operation: "ingest" }),
            phase => {
                return Err(WorkflowError::transition(
                    phase,
                    "nothing to push; ingest an artifact first",
                ))
            }
        }
        let insights = self
            .insights
            .clone()
            .ok_or_else(|| WorkflowError::transition(self.phase, "session has no insights"))?;
        self.phase = Phase::Pushing;
        Ok((self.generation, insights))
    }

    /// Pushing -> Done; marks every step after upload completed
    pub(crate) fn complete_push(&mut self, result: PushResult) {
        self.push_result = Some(result);
        self.phase = Phase::Done;
        for step in REVIEW_STEP..=self.step_count {
            self.completed_steps.insert(step);
        }
    }

    /// Pushing -> Reviewing; no completion marks are recorded
    pub(crate) fn fail_push(&mut self) {
        self.phase = Phase::Reviewing;
    }

    /// Guard shared by edit and regenerate
    pub(crate) fn ensure_reviewing(&self) -> Result<()> {
        match self.phase {
            Phase::Reviewing => Ok(()),
            Phase::Pushing => Err(WorkflowError::Busy { operation: "push" }),
            Phase::Ingesting => Err(WorkflowError::Busy { operation: "ingest" }),
            phase => Err(WorkflowError::transition(
                phase,
                "insights can only be changed while reviewing",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactRef;

    fn artifact() -> ArtifactRef {
        ArtifactRef {
            id: Uuid::now_v7(),
            label: "call.txt".to_string(),
            content_type: Some("text/plain".to_string()),
            size_bytes: Some(4),
            sha256: None,
            accepted_at: Utc::now(),
        }
    }

    fn invariant_holds(session: &WorkflowSession) -> bool {
        let highest = session.completed_steps.iter().copied().chain([1]).max().unwrap_or(1);
        session.current_step <= highest + 1
    }

    #[test]
    fn test_new_session() {
        let session = WorkflowSession::new("call_transcript", 3);
        assert_eq!(session.current_step, 1);
        assert!(session.completed_steps.is_empty());
        assert_eq!(session.phase, Phase::Idle);
        assert_eq!(session.max_reachable_step(), 2);
    }

    #[test]
    fn test_advance_respects_gate() {
        let mut session = WorkflowSession::new("call_transcript", 3);

        assert!(session.advance(3).is_err());
        assert_eq!(session.current_step, 1);

        session.mark_completed(1).unwrap();
        session.advance(2).unwrap();
        assert!(invariant_holds(&session));

        let err = session.advance(3).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));

        session.mark_completed(2).unwrap();
        session.advance(3).unwrap();
        assert!(invariant_holds(&session));
    }

    #[test]
    fn test_advance_rejects_out_of_range() {
        let mut session = WorkflowSession::new("call_transcript", 3);
        assert!(session.advance(0).is_err());
        assert!(session.advance(4).is_err());
    }

    #[test]
    fn test_mark_completed_is_idempotent() {
        let mut session = WorkflowSession::new("call_transcript", 3);
        session.mark_completed(1).unwrap();
        session.mark_completed(1).unwrap();
        assert_eq!(session.completed_steps.len(), 1);
        assert!(session.mark_completed(9).is_err());
    }

    #[test]
    fn test_reset_restores_initial_values() {
        let mut session = WorkflowSession::new("call_transcript", 3);
        session.begin_ingest(artifact()).unwrap();
        session.complete_ingest(InsightsBundle::default());
        session.advance(2).unwrap();

        session.reset();

        assert_eq!(session.current_step, 1);
        assert!(session.completed_steps.is_empty());
        assert_eq!(session.phase, Phase::Idle);
        assert!(session.artifact.is_none());
        assert!(session.insights.is_none());
        assert_eq!(session.generation, 1);
    }

    #[test]
    fn test_begin_ingest_rejects_second_ingest() {
        let mut session = WorkflowSession::new("call_transcript", 3);
        session.begin_ingest(artifact()).unwrap();
        let err = session.begin_ingest(artifact()).unwrap_err();
        assert!(matches!(err, WorkflowError::Busy { operation: "ingest" }));
    }

    #[test]
    fn test_push_lifecycle() {
        let mut session = WorkflowSession::new("call_transcript", 3);
        assert!(matches!(
            session.begin_push(),
            Err(WorkflowError::InvalidTransition { .. })
        ));

        session.begin_ingest(artifact()).unwrap();
        session.complete_ingest(InsightsBundle::default());

        session.begin_push().unwrap();
        assert!(matches!(session.begin_push(), Err(WorkflowError::Busy { .. })));

        session.fail_push();
        assert_eq!(session.phase, Phase::Reviewing);
        assert!(!session.completed_steps.contains(&2));

        session.begin_push().unwrap();
        session.complete_push(PushResult {
            success: true,
            timestamp: Utc::now(),
            crm_record_id: None,
        });
        assert_eq!(session.phase, Phase::Done);
        assert_eq!(session.completed_steps, BTreeSet::from([1, 2, 3]));
        assert!(matches!(session.begin_push(), Err(WorkflowError::AlreadyPushed)));
    }

    #[test]
    fn test_done_is_terminal() {
        let mut session = WorkflowSession::new("call_transcript", 3);
        session.begin_ingest(artifact()).unwrap();
        session.complete_ingest(InsightsBundle::default());
        session.begin_push().unwrap();
        session.complete_push(PushResult {
            success: true,
            timestamp: Utc::now(),
            crm_record_id: None,
        });

        assert!(session.advance(1).is_err());
        assert!(session.advance(3).is_ok());
        assert!(session.ensure_reviewing().is_err());
        assert!(session.begin_ingest(artifact()).is_err());
    }
}
