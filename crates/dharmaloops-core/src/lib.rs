mod context;
mod error;
mod events;
mod generator;
mod loop_runner;
mod outcome;
pub mod prompts;
mod step;
mod synthesis;
mod termination;

pub use context::{SessionSettings, SessionState, DEFAULT_MAX_STEPS, DEFAULT_TARGET};
pub use error::LoopError;
pub use events::{StepDisplay, StreamEvent};
pub use generator::{GeneratedStep, StepGenerator};
pub use loop_runner::LoopRunner;
pub use outcome::{SessionOutcome, SessionTermination};
pub use step::{
    parse_payload, parse_step, payload_candidates, ReasoningStep, StepDraft, StepParseError,
    StepPayload,
};
pub use synthesis::{FinalAnswer, Synthesizer, SYNTHESIS_FAILURE_MESSAGE};
pub use termination::{decide, NextAction, StepRouting, TerminationReason, MINIMUM_STEPS};
