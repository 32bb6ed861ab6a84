use serde::{Deserialize, Serialize};

/// Fixed exploration floor. Not configurable.
pub const MINIMUM_STEPS: usize = 4;

/// Why the controller continued or stopped after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    MaxStepsReached,
    MinimumStepsRequired,
    TargetReached,
    Continuing,
}

impl TerminationReason {
    pub fn should_stop(&self) -> bool {
        matches!(
            self,
            TerminationReason::MaxStepsReached | TerminationReason::TargetReached
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::MaxStepsReached => "max_steps_reached",
            TerminationReason::MinimumStepsRequired => "minimum_steps_required",
            TerminationReason::TargetReached => "target_reached",
            TerminationReason::Continuing => "continuing",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    Continue,
    Stop,
}

/// Routing metadata attached to each step for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRouting {
    pub reason: TerminationReason,
    pub next_action: NextAction,
}

impl From<TerminationReason> for StepRouting {
    fn from(reason: TerminationReason) -> Self {
        Self {
            reason,
            next_action: if reason.should_stop() {
                NextAction::Stop
            } else {
                NextAction::Continue
            },
        }
    }
}

/// Strict priority chain: ceiling, then floor, then target.
///
/// The ceiling is checked first so a configuration with
/// `max_steps < MINIMUM_STEPS` still terminates at `max_steps`.
pub fn decide(step_index: usize, max_steps: usize, aggregate: f64, target: f64) -> TerminationReason {
    if step_index >= max_steps {
        TerminationReason::MaxStepsReached
    } else if step_index < MINIMUM_STEPS {
        TerminationReason::MinimumStepsRequired
    } else if aggregate >= target {
        TerminationReason::TargetReached
    } else {
        TerminationReason::Continuing
    }
}
