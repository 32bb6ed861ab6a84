use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::termination::TerminationReason;
use crate::ReasoningStep;

/// How the step loop ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionTermination {
    /// Aggregate met the target after the minimum steps
    TargetReached { steps: usize },
    /// Hit the step ceiling
    MaxStepsReached { steps: usize },
    /// A step generation call failed; the recorded steps were kept
    Aborted { step_index: usize, error: String },
}

impl SessionTermination {
    /// Map a stopping reason to a termination. `None` for reasons that continue.
    pub fn from_reason(reason: TerminationReason, steps: usize) -> Option<Self> {
        match reason {
            TerminationReason::TargetReached => Some(Self::TargetReached { steps }),
            TerminationReason::MaxStepsReached => Some(Self::MaxStepsReached { steps }),
            TerminationReason::MinimumStepsRequired | TerminationReason::Continuing => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::TargetReached { .. } => "target_reached",
            Self::MaxStepsReached { .. } => "max_steps_reached",
            Self::Aborted { .. } => "aborted",
        }
    }
}

/// The final outcome of a reasoning session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcome {
    pub run_id: String,
    pub steps: Vec<ReasoningStep>,
    pub termination: SessionTermination,
    pub answer: String,
    /// False when the answer is the synthesis-failure diagnostic
    pub synthesized: bool,
    pub total_duration_secs: f64,
}

impl SessionOutcome {
    pub fn new(
        run_id: String,
        steps: Vec<ReasoningStep>,
        termination: SessionTermination,
        answer: String,
        synthesized: bool,
        duration: Duration,
    ) -> Self {
        Self {
            run_id,
            steps,
            termination,
            answer,
            synthesized,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn exit_code(&self) -> i32 {
        match self.termination {
            SessionTermination::TargetReached { .. } => 0,
            SessionTermination::MaxStepsReached { .. } => 1,
            SessionTermination::Aborted { .. } => 2,
        }
    }
}
