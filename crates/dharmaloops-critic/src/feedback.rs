use dharmaloops_agent::{
    ChatMessage, GenerationOptions, GenerationRequest, ReasoningService, ServiceError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{DharmaScores, Dimension, FeedbackPrompts};

/// Low temperature keeps feedback consistent across calls
pub const FEEDBACK_TEMPERATURE: f32 = 0.3;
/// Feedback is 2-3 sentences, so the output budget stays small
pub const FEEDBACK_MAX_TOKENS: u32 = 200;

pub const ALL_ALIGNED_MESSAGE: &str =
    "All four principles are well aligned. Keep deepening the inquiry while holding this balance.";

/// Projection of a completed step used as trajectory context for feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreHistoryEntry {
    pub step_index: usize,
    pub scores: DharmaScores,
    pub aggregate_mean: f64,
    pub content: String,
}

impl ScoreHistoryEntry {
    pub fn new(step_index: usize, scores: DharmaScores, content: impl Into<String>) -> Self {
        Self {
            step_index,
            scores,
            aggregate_mean: scores.aggregate(),
            content: content.into(),
        }
    }
}

/// Which branch produced the feedback text
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackOutcome {
    /// Guidance written by the reasoning service
    Service { text: String },
    /// Deterministic rule-based guidance used when the service call failed
    Fallback { text: String, reason: String },
}

impl FeedbackOutcome {
    pub fn text(&self) -> &str {
        match self {
            FeedbackOutcome::Service { text } => text,
            FeedbackOutcome::Fallback { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            FeedbackOutcome::Service { text } => text,
            FeedbackOutcome::Fallback { text, .. } => text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, FeedbackOutcome::Fallback { .. })
    }

    /// Short label for logging
    pub fn source(&self) -> &'static str {
        match self {
            FeedbackOutcome::Service { .. } => "service",
            FeedbackOutcome::Fallback { .. } => "fallback",
        }
    }
}

/// Canned remedy for a dimension scoring below target
fn remedy(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Mindfulness => {
            "Mindfulness is below target: slow down and name plainly what is being observed, including the assumptions behind the last step."
        }
        Dimension::Emptiness => {
            "Emptiness is below target: hold the current position more lightly and examine the causes and conditions it depends on."
        }
        Dimension::NonDuality => {
            "Non-duality is below target: look for the perspective that joins the opposing views instead of choosing one side."
        }
        Dimension::BoundlessCare => {
            "Boundless care is below target: bring the wellbeing of everyone affected into the next step and let compassion shape the conclusion."
        }
    }
}

/// Rule-based feedback: one sentence per dimension below `target`, or a
/// single all-aligned message. Same inputs always give the same text.
pub fn fallback_feedback(current: &DharmaScores, target: f64) -> String {
    let weak = current.below(target);
    if weak.is_empty() {
        return ALL_ALIGNED_MESSAGE.to_string();
    }

    weak.into_iter().map(remedy).collect::<Vec<_>>().join(" ")
}

/// Produces guidance for the next step from the current scores and trajectory
pub struct FeedbackGenerator<'a> {
    service: &'a dyn ReasoningService,
}

impl<'a> FeedbackGenerator<'a> {
    pub fn new(service: &'a dyn ReasoningService) -> Self {
        Self { service }
    }

    pub fn build_request(
        current: &DharmaScores,
        history: &[ScoreHistoryEntry],
        target: f64,
    ) -> GenerationRequest {
        GenerationRequest::new(
            FeedbackPrompts::system_prompt(),
            vec![ChatMessage::user(FeedbackPrompts::build_feedback_prompt(
                current, history, target,
            ))],
        )
        .with_options(GenerationOptions::new(
            FEEDBACK_TEMPERATURE,
            FEEDBACK_MAX_TOKENS,
        ))
    }

    /// Generate feedback. Never fails: any service error or blank reply
    /// selects the rule-based fallback.
    pub async fn generate(
        &self,
        current: &DharmaScores,
        history: &[ScoreHistoryEntry],
        target: f64,
    ) -> FeedbackOutcome {
        let request = Self::build_request(current, history, target);

        debug!(
            service = self.service.name(),
            history_len = history.len(),
            target,
            "Requesting feedback"
        );

        let result = match self.service.generate(&request).await {
            Ok(output) if output.is_blank() => Err(ServiceError::EmptyResponse),
            Ok(output) => Ok(output.text.trim().to_string()),
            Err(e) => Err(e),
        };

        match result {
            Ok(text) => FeedbackOutcome::Service { text },
            Err(e) => {
                warn!(error = %e, "Feedback service failed, using rule-based feedback");
                FeedbackOutcome::Fallback {
                    text: fallback_feedback(current, target),
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dharmaloops_agent::{ServiceKind, ServiceOutput};
    use std::sync::Mutex;
    use std::time::Duration;

    struct StaticService {
        reply: Result<String, String>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl StaticService {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ReasoningService for StaticService {
        fn name(&self) -> &str {
            "static"
        }

        fn kind(&self) -> ServiceKind {
            ServiceKind::OpenAi
        }

        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> Result<ServiceOutput, ServiceError> {
            self.requests.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(ServiceOutput::new(text.clone(), Duration::ZERO)),
                Err(message) => Err(ServiceError::Request(message.clone())),
            }
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_fallback_names_each_weak_dimension() {
        let text = fallback_feedback(&DharmaScores::new(0.2, 0.9, 0.3, 0.8), 0.75);
        assert!(text.starts_with("Mindfulness is below target"));
        assert!(text.contains("Non-duality is below target"));
        assert!(!text.contains("Emptiness is below target"));
        assert!(!text.contains("Boundless care is below target"));
    }

    #[test]
    fn test_fallback_all_aligned() {
        assert_eq!(
            fallback_feedback(&DharmaScores::uniform(0.8), 0.75),
            ALL_ALIGNED_MESSAGE
        );
    }

    #[test]
    fn test_fallback_is_reproducible() {
        let scores = DharmaScores::new(0.1, 0.2, 0.3, 0.4);
        let first = fallback_feedback(&scores, 0.75);
        assert!(!first.is_empty());
        assert_eq!(first, fallback_feedback(&scores, 0.75));
    }

    #[tokio::test]
    async fn test_generate_uses_service_text() {
        let service = StaticService::replying("  Rest in the breath before answering.\n");
        let generator = FeedbackGenerator::new(&service);

        let outcome = generator
            .generate(&DharmaScores::uniform(0.5), &[], 0.75)
            .await;

        assert_eq!(
            outcome,
            FeedbackOutcome::Service {
                text: "Rest in the breath before answering.".to_string()
            }
        );

        let requests = service.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].options.temperature, Some(FEEDBACK_TEMPERATURE));
        assert_eq!(requests[0].options.max_tokens, Some(FEEDBACK_MAX_TOKENS));
        assert!(requests[0].system.contains("Evaluation Dimensions"));
    }

    #[tokio::test]
    async fn test_generate_falls_back_on_error() {
        let service = StaticService::failing("connection refused");
        let generator = FeedbackGenerator::new(&service);
        let scores = DharmaScores::new(0.1, 0.9, 0.9, 0.9);

        let outcome = generator.generate(&scores, &[], 0.75).await;

        assert!(outcome.is_fallback());
        assert_eq!(outcome.text(), fallback_feedback(&scores, 0.75));
        if let FeedbackOutcome::Fallback { reason, .. } = outcome {
            assert!(reason.contains("connection refused"));
        }
    }

    #[tokio::test]
    async fn test_generate_falls_back_on_blank_reply() {
        let service = StaticService::replying("   ");
        let generator = FeedbackGenerator::new(&service);

        let outcome = generator
            .generate(&DharmaScores::uniform(0.9), &[], 0.75)
            .await;

        assert!(outcome.is_fallback());
        assert_eq!(outcome.text(), ALL_ALIGNED_MESSAGE);
    }

    #[test]
    fn test_history_entry_computes_mean() {
        let entry = ScoreHistoryEntry::new(3, DharmaScores::new(0.0, 0.5, 0.5, 1.0), "x");
        assert_eq!(entry.step_index, 3);
        assert!((entry.aggregate_mean - 0.5).abs() < 1e-12);
    }
}
