use dharmaloops_agent::{ChatMessage, GenerationRequest, ReasoningService, ServiceError};
use tracing::{debug, warn};

use crate::prompts::{StepPrompts, SYNTHESIS_OPTIONS, SYNTHESIS_SYSTEM_PROMPT};
use crate::ReasoningStep;

pub const SYNTHESIS_FAILURE_MESSAGE: &str = "A final answer could not be synthesized. \
The reasoning steps above contain the full analysis; please review them directly.";

/// The session's answer: synthesized, or the fixed diagnostic
#[derive(Debug, Clone, PartialEq)]
pub enum FinalAnswer {
    Synthesized(String),
    Diagnostic { reason: String },
}

impl FinalAnswer {
    pub fn text(&self) -> &str {
        match self {
            FinalAnswer::Synthesized(text) => text,
            FinalAnswer::Diagnostic { .. } => SYNTHESIS_FAILURE_MESSAGE,
        }
    }

    pub fn is_synthesized(&self) -> bool {
        matches!(self, FinalAnswer::Synthesized(_))
    }
}

/// Summarizes the recorded steps into a user-facing answer
pub struct Synthesizer<'a> {
    service: &'a dyn ReasoningService,
}

impl<'a> Synthesizer<'a> {
    pub fn new(service: &'a dyn ReasoningService) -> Self {
        Self { service }
    }

    pub fn build_request(conversation: &[ChatMessage], steps: &[ReasoningStep]) -> GenerationRequest {
        let mut messages = conversation.to_vec();
        messages.push(ChatMessage::user(StepPrompts::synthesis_prompt(steps)));
        GenerationRequest::new(SYNTHESIS_SYSTEM_PROMPT, messages).with_options(SYNTHESIS_OPTIONS)
    }

    pub async fn synthesize(
        &self,
        conversation: &[ChatMessage],
        steps: &[ReasoningStep],
    ) -> FinalAnswer {
        let request = Self::build_request(conversation, steps);
        debug!(steps = steps.len(), "Requesting synthesis");

        let result = match self.service.generate(&request).await {
            Ok(output) if output.is_blank() => Err(ServiceError::EmptyResponse),
            Ok(output) => Ok(output.text.trim().to_string()),
            Err(e) => Err(e),
        };

        match result {
            Ok(text) => FinalAnswer::Synthesized(text),
            Err(e) => {
                warn!(error = %e, "Synthesis failed");
                FinalAnswer::Diagnostic {
                    reason: e.to_string(),
                }
            }
        }
    }
}
