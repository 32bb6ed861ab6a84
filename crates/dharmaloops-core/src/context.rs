use std::time::{Duration, Instant};

use dharmaloops_agent::{ChatMessage, Role};
use dharmaloops_critic::ScoreHistoryEntry;
use uuid::Uuid;

use crate::error::LoopError;
use crate::prompts::StepPrompts;
use crate::ReasoningStep;

pub const DEFAULT_TARGET: f64 = 0.75;
pub const DEFAULT_MAX_STEPS: usize = 10;

/// Resolved per-session policy values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    /// Aggregate score that allows an early stop, in (0, 1]
    pub target: f64,
    /// Hard ceiling on generated steps
    pub max_steps: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl SessionSettings {
    pub fn new(target: f64, max_steps: usize) -> Result<Self, LoopError> {
        let settings = Self { target, max_steps };
        settings.validate()?;
        Ok(settings)
    }

    /// A target of 0 or less would always stop at the floor and one above 1
    /// could never be met, so both are rejected up front
    pub fn validate(&self) -> Result<(), LoopError> {
        if !(self.target > 0.0 && self.target <= 1.0) {
            return Err(LoopError::InvalidSettings(format!(
                "target must be in (0, 1], got {}",
                self.target
            )));
        }
        if self.max_steps == 0 {
            return Err(LoopError::InvalidSettings(
                "max_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Request-scoped mutable state, owned by the loop runner
#[derive(Debug, Clone)]
pub struct SessionState {
    pub run_id: String,
    /// Inbound conversation that seeded the session
    pub conversation: Vec<ChatMessage>,
    /// Number of completed steps
    pub step_index: usize,
    pub steps: Vec<ReasoningStep>,
    /// Feedback from the most recent step, injected into the next request
    pub previous_feedback: Option<String>,
    /// Score trajectory of completed steps, in step order
    pub history: Vec<ScoreHistoryEntry>,
    started_at: Instant,
}

impl SessionState {
    pub fn new(conversation: Vec<ChatMessage>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            conversation,
            step_index: 0,
            steps: Vec::new(),
            previous_feedback: None,
            history: Vec::new(),
            started_at: Instant::now(),
        }
    }

    /// Record a completed step. The step's feedback becomes the previous
    /// feedback for the next iteration.
    pub fn record(&mut self, step: ReasoningStep) {
        self.history.push(ScoreHistoryEntry::new(
            step.step_index,
            step.scores,
            step.content.clone(),
        ));
        self.step_index = step.step_index;
        self.previous_feedback = step.feedback.clone();
        self.steps.push(step);
    }

    /// Inbound messages followed by every recorded step as an assistant turn
    pub fn step_conversation(&self) -> Vec<ChatMessage> {
        let mut messages = self.conversation.clone();
        messages.extend(
            self.steps
                .iter()
                .map(|step| ChatMessage::assistant(StepPrompts::step_message(step))),
        );
        messages
    }

    /// Most recent user message, for logging
    pub fn question(&self) -> &str {
        self.conversation
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }

    pub fn total_duration(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::termination::{StepRouting, TerminationReason};
    use dharmaloops_critic::DharmaScores;

    fn step(index: usize, feedback: &str) -> ReasoningStep {
        ReasoningStep {
            title: format!("Title {}", index),
            content: format!("Content {}", index),
            scores: DharmaScores::uniform(0.5),
            rationale: String::new(),
            step_index: index,
            max_steps: 10,
            feedback: Some(feedback.to_string()),
            degraded: false,
            routing: StepRouting::from(TerminationReason::MinimumStepsRequired),
        }
    }

    #[test]
    fn test_settings_validation() {
        assert!(SessionSettings::default().validate().is_ok());
        assert!(SessionSettings::new(1.0, 1).is_ok());
        assert!(SessionSettings::new(0.0, 10).is_err());
        assert!(SessionSettings::new(1.01, 10).is_err());
        assert!(SessionSettings::new(f64::NAN, 10).is_err());
        assert!(SessionSettings::new(0.75, 0).is_err());
    }

    #[test]
    fn test_record_updates_history_and_feedback() {
        let mut state = SessionState::new(vec![ChatMessage::user("q")]);
        state.record(step(1, "first"));
        state.record(step(2, "second"));

        assert_eq!(state.step_index, 2);
        assert_eq!(state.previous_feedback.as_deref(), Some("second"));
        let indices: Vec<usize> = state.history.iter().map(|e| e.step_index).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn test_step_conversation_appends_steps_as_assistant_turns() {
        let mut state = SessionState::new(vec![ChatMessage::user("q")]);
        state.record(step(1, "f"));

        let messages = state.step_conversation();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
        assert!(messages[1].content.starts_with("Step 1: Title 1"));
        assert_eq!(state.question(), "q");
    }
}
