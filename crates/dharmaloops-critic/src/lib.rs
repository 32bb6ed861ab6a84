mod feedback;
pub mod prompts;
mod scores;

pub use feedback::{
    fallback_feedback, FeedbackGenerator, FeedbackOutcome, ScoreHistoryEntry, ALL_ALIGNED_MESSAGE,
    FEEDBACK_MAX_TOKENS, FEEDBACK_TEMPERATURE,
};
pub use prompts::FeedbackPrompts;
pub use scores::{aggregate, DharmaScores, Dimension, ScoreError};
