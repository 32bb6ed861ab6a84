use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use dharmaloops_agent::{ChatMessage, ReasoningService};
use dharmaloops_critic::FeedbackGenerator;
use dharmaloops_logging::{LogEvent, Logger};

use crate::context::{SessionSettings, SessionState};
use crate::error::LoopError;
use crate::events::StreamEvent;
use crate::generator::StepGenerator;
use crate::outcome::{SessionOutcome, SessionTermination};
use crate::step::ReasoningStep;
use crate::synthesis::Synthesizer;
use crate::termination::{decide, StepRouting, TerminationReason};

/// Drives a session: step, feedback, route, repeat, then synthesize
pub struct LoopRunner {
    reasoner: Arc<dyn ReasoningService>,
    feedback: Arc<dyn ReasoningService>,
    settings: SessionSettings,
    logger: Arc<Logger>,
}

impl LoopRunner {
    /// `reasoner` serves step generation and synthesis; `feedback` serves
    /// feedback generation. Both may be the same service.
    pub fn new(
        reasoner: Arc<dyn ReasoningService>,
        feedback: Arc<dyn ReasoningService>,
        settings: SessionSettings,
        logger: Arc<Logger>,
    ) -> Result<Self, LoopError> {
        settings.validate()?;
        Ok(Self {
            reasoner,
            feedback,
            settings,
            logger,
        })
    }

    /// Run one session to completion. Steps and the final answer are sent
    /// on `events` as they become available. Never fails: service errors
    /// end the loop early and the session still completes.
    pub async fn run(
        &self,
        conversation: Vec<ChatMessage>,
        events: UnboundedSender<StreamEvent>,
    ) -> SessionOutcome {
        let mut state = SessionState::new(conversation);

        self.logger.log(&LogEvent::SessionStarted {
            run_id: state.run_id.clone(),
            question_preview: state.question().chars().take(100).collect(),
            max_steps: self.settings.max_steps,
            target: self.settings.target,
        });

        let termination = loop {
            match self.run_iteration(&mut state, &events).await {
                Ok(reason) => {
                    if let Some(termination) =
                        SessionTermination::from_reason(reason, state.steps.len())
                    {
                        break termination;
                    }
                }
                Err(e) => {
                    let step_index = state.step_index + 1;
                    warn!(step_index, error = %e, "Step generation failed, ending loop");
                    self.logger.log(&LogEvent::StepFailed {
                        step_index,
                        error: e.to_string(),
                    });
                    break SessionTermination::Aborted {
                        step_index,
                        error: e.to_string(),
                    };
                }
            }
        };

        info!(
            steps = state.steps.len(),
            termination = termination.label(),
            "Reasoning loop finished"
        );

        self.logger.log(&LogEvent::SynthesisStarted {
            steps: state.steps.len(),
        });
        let answer = Synthesizer::new(self.reasoner.as_ref())
            .synthesize(&state.conversation, &state.steps)
            .await;
        self.logger.log(&LogEvent::SynthesisCompleted {
            synthesized: answer.is_synthesized(),
            answer_len: answer.text().len(),
        });
        Self::emit(&events, StreamEvent::text(answer.text()));

        let duration = state.total_duration();
        self.logger.log(&LogEvent::SessionCompleted {
            run_id: state.run_id.clone(),
            steps: state.steps.len(),
            termination: termination.label().to_string(),
            duration_secs: duration.as_secs_f64(),
        });

        SessionOutcome::new(
            state.run_id,
            state.steps,
            termination,
            answer.text().to_string(),
            answer.is_synthesized(),
            duration,
        )
    }

    /// Run a single iteration and return the routing decision for it
    async fn run_iteration(
        &self,
        state: &mut SessionState,
        events: &UnboundedSender<StreamEvent>,
    ) -> Result<TerminationReason, LoopError> {
        let step_index = state.step_index + 1;
        let max_steps = self.settings.max_steps;
        let target = self.settings.target;
        let started = Instant::now();

        self.logger.log(&LogEvent::StepStarted {
            step_index,
            max_steps,
        });

        let generated = StepGenerator::new(self.reasoner.as_ref())
            .generate(
                &state.step_conversation(),
                step_index,
                max_steps,
                state.previous_feedback.as_deref(),
            )
            .await?;

        let degraded = generated.draft.is_degraded();
        let payload = generated.draft.into_payload();
        let aggregate = payload.scores.aggregate();

        self.logger.log(&LogEvent::StepCompleted {
            step_index,
            title: payload.title.clone(),
            aggregate,
            degraded,
            duration_secs: generated.duration.as_secs_f64(),
        });

        // History holds steps 1..step_index-1 here; the current step is
        // recorded only after its feedback exists
        let feedback = FeedbackGenerator::new(self.feedback.as_ref())
            .generate(&payload.scores, &state.history, target)
            .await;

        self.logger.log(&LogEvent::FeedbackGenerated {
            step_index,
            source: feedback.source().to_string(),
            length: feedback.text().len(),
        });

        let reason = decide(step_index, max_steps, aggregate, target);
        let feedback_len = feedback.text().len();

        let step = ReasoningStep {
            title: payload.title,
            content: payload.content,
            scores: payload.scores,
            rationale: payload.rationale,
            step_index,
            max_steps,
            feedback: Some(feedback.into_text()),
            degraded,
            routing: StepRouting::from(reason),
        };

        Self::emit(events, StreamEvent::reasoning_step(&step));

        self.logger.log(&LogEvent::StepTelemetry {
            run_id: state.run_id.clone(),
            step_index,
            max_steps,
            aggregate,
            mindfulness: step.scores.mindfulness,
            emptiness: step.scores.emptiness,
            non_duality: step.scores.non_duality,
            boundless_care: step.scores.boundless_care,
            target,
            target_reached: aggregate >= target,
            termination_reason: reason.to_string(),
            latency_ms: started.elapsed().as_millis() as u64,
            feedback_len,
        });

        state.record(step);
        Ok(reason)
    }

    fn emit(events: &UnboundedSender<StreamEvent>, event: StreamEvent) {
        let kind = event.kind();
        if events.send(event).is_err() {
            debug!(kind, "Event receiver dropped, continuing without transport");
        }
    }
}
