use std::time::Duration;

use dharmaloops_agent::{
    ChatMessage, GenerationRequest, ReasoningService, ServiceError, ServiceOutput,
};
use tracing::{debug, info, warn};

use crate::prompts::{StepPrompts, STEP_OPTIONS};
use crate::step::{parse_step, StepDraft};

/// A step draft plus how long the service took to produce it
#[derive(Debug, Clone)]
pub struct GeneratedStep {
    pub draft: StepDraft,
    pub duration: Duration,
}

/// Produces one reasoning step per call
pub struct StepGenerator<'a> {
    service: &'a dyn ReasoningService,
}

impl<'a> StepGenerator<'a> {
    pub fn new(service: &'a dyn ReasoningService) -> Self {
        Self { service }
    }

    /// Assemble the request for step `step_index`. Prior feedback, when
    /// present, goes right before the step instruction.
    pub fn build_request(
        conversation: &[ChatMessage],
        step_index: usize,
        max_steps: usize,
        injected_feedback: Option<&str>,
    ) -> GenerationRequest {
        let mut messages = conversation.to_vec();

        if let Some(feedback) = injected_feedback {
            if step_index > 1 {
                messages.push(ChatMessage::user(StepPrompts::feedback_note(
                    step_index - 1,
                    feedback,
                )));
            }
        }
        messages.push(ChatMessage::user(StepPrompts::step_instruction(
            step_index, max_steps,
        )));

        GenerationRequest::new(StepPrompts::system_prompt(max_steps), messages)
            .with_options(STEP_OPTIONS)
    }

    /// Generate a step. Only a failed service call is an error; malformed
    /// output comes back as a degraded draft.
    pub async fn generate(
        &self,
        conversation: &[ChatMessage],
        step_index: usize,
        max_steps: usize,
        injected_feedback: Option<&str>,
    ) -> Result<GeneratedStep, ServiceError> {
        let request = Self::build_request(conversation, step_index, max_steps, injected_feedback);

        debug!(
            service = self.service.name(),
            step_index,
            messages = request.messages.len(),
            has_feedback = injected_feedback.is_some(),
            "Requesting reasoning step"
        );

        // An empty completion is non-compliant output, not a failed call
        let output = match self.service.generate(&request).await {
            Ok(output) => output,
            Err(ServiceError::EmptyResponse) => {
                warn!(step_index, "Reasoning service returned no text, degrading step");
                ServiceOutput::new(String::new(), Duration::ZERO)
            }
            Err(e) => return Err(e),
        };
        let draft = parse_step(&output.text, step_index);

        info!(
            step_index,
            degraded = draft.is_degraded(),
            duration_secs = output.duration.as_secs_f64(),
            "Reasoning step generated"
        );

        Ok(GeneratedStep {
            draft,
            duration: output.duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dharmaloops_agent::Role;

    #[test]
    fn test_first_step_has_no_feedback_note() {
        let conversation = vec![ChatMessage::user("How do I forgive?")];
        let request = StepGenerator::build_request(&conversation, 1, 10, Some("ignored"));

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1].content, StepPrompts::step_instruction(1, 10));
        assert_eq!(request.options, STEP_OPTIONS);
    }

    #[test]
    fn test_feedback_note_precedes_instruction() {
        let conversation = vec![ChatMessage::user("How do I forgive?")];
        let request = StepGenerator::build_request(&conversation, 3, 10, Some("Widen the view."));

        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[1].role, Role::User);
        assert!(request.messages[1]
            .content
            .starts_with("Feedback on step 2: Widen the view."));
        assert!(request.messages[2].content.starts_with("Generate step 3 of 10."));
    }
}
