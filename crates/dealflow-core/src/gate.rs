// Step gate
//
// Pure mapping from session state to what a client may render and do next.
// Nothing here mutates the session; the coordinators enforce the same rules
// when an action is actually invoked.

use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::session::{Phase, WorkflowSession, REVIEW_STEP, UPLOAD_STEP};

/// Actions a client may currently offer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct EnabledActions {
    pub ingest: bool,
    pub edit: bool,
    pub regenerate: bool,
    pub push: bool,
    pub reset: bool,
    /// Steps `advance` would accept right now
    pub advance_to: Vec<u32>,
}

/// Result of evaluating the gate against a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct GateView {
    /// Step whose view has the data it needs
    pub renderable_step: u32,
    pub phase: Phase,
    pub actions: EnabledActions,
}

/// Step gate evaluator
pub struct StepGate;

impl StepGate {
    /// Evaluate the gate for `session`
    pub fn evaluate(session: &WorkflowSession) -> GateView {
        GateView {
            renderable_step: Self::renderable_step(session),
            phase: session.phase,
            actions: Self::actions(session),
        }
    }

    /// Current step, pulled back to the last step whose data is present
    pub fn renderable_step(session: &WorkflowSession) -> u32 {
        let data_limit = if session.is_pushed() {
            session.terminal_step()
        } else if session.insights.is_some() {
            REVIEW_STEP.min(session.terminal_step())
        } else {
            UPLOAD_STEP
        };
        session.current_step.min(data_limit).max(UPLOAD_STEP)
    }

    /// Actions enabled for the session's phase
    pub fn actions(session: &WorkflowSession) -> EnabledActions {
        let reviewing = session.phase == Phase::Reviewing;
        let reachable = session.max_reachable_step();

        let advance_to = if session.phase == Phase::Done {
            vec![session.terminal_step()]
        } else {
            (UPLOAD_STEP..=reachable)
                .filter(|step| *step != session.current_step)
                .collect()
        };

        EnabledActions {
            ingest: session.phase == Phase::Idle,
            edit: reviewing && session.insights.is_some(),
            regenerate: reviewing && session.insights.is_some(),
            push: reviewing && session.insights.is_some() && !session.is_pushed(),
            reset: true,
            advance_to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::InsightsBundle;
    use crate::session::PushResult;
    use chrono::Utc;

    #[test]
    fn test_fresh_session() {
        let session = WorkflowSession::new("call_transcript", 3);
        let view = StepGate::evaluate(&session);

        assert_eq!(view.renderable_step, 1);
        assert!(view.actions.ingest);
        assert!(!view.actions.push);
        assert_eq!(view.actions.advance_to, vec![2]);
    }

    #[test]
    fn test_review_without_insights_renders_upload() {
        let mut session = WorkflowSession::new("call_transcript", 3);
        session.advance(2).unwrap();

        assert_eq!(StepGate::renderable_step(&session), 1);
    }

    #[test]
    fn test_reviewing_enables_edit_and_push() {
        let mut session = WorkflowSession::new("call_transcript", 3);
        session.phase = Phase::Reviewing;
        session.insights = Some(InsightsBundle::default());
        session.completed_steps.insert(1);
        session.current_step = 2;

        let view = StepGate::evaluate(&session);
        assert_eq!(view.renderable_step, 2);
        assert!(view.actions.edit && view.actions.regenerate && view.actions.push);
        assert!(!view.actions.ingest);
        assert_eq!(view.actions.advance_to, vec![1]);
    }

    #[test]
    fn test_done_only_allows_terminal_step() {
        let mut session = WorkflowSession::new("call_transcript", 3);
        session.phase = Phase::Done;
        session.insights = Some(InsightsBundle::default());
        session.push_result = Some(PushResult {
            success: true,
            timestamp: Utc::now(),
            crm_record_id: None,
        });
        session.completed_steps.extend([1, 2, 3]);
        session.current_step = 3;

        let view = StepGate::evaluate(&session);
        assert_eq!(view.renderable_step, 3);
        assert!(!view.actions.push && !view.actions.edit);
        assert_eq!(view.actions.advance_to, vec![3]);
    }
}
