use serde::{Deserialize, Serialize};

use crate::ReasoningStep;

/// A step as shown to clients: the recorded step plus derived display fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDisplay {
    #[serde(flatten)]
    pub step: ReasoningStep,
    pub aggregate: f64,
}

impl From<&ReasoningStep> for StepDisplay {
    fn from(step: &ReasoningStep) -> Self {
        Self {
            aggregate: step.aggregate(),
            step: step.clone(),
        }
    }
}

/// Events streamed to the transport as the session progresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StreamEvent {
    /// Emitted once per completed step, in order
    #[serde(rename = "reasoning-step")]
    ReasoningStep { step: StepDisplay },
    /// Emitted exactly once, after the loop, with the final answer
    #[serde(rename = "text")]
    Text { content: String },
}

impl StreamEvent {
    pub fn reasoning_step(step: &ReasoningStep) -> Self {
        StreamEvent::ReasoningStep {
            step: StepDisplay::from(step),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        StreamEvent::Text {
            content: content.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::ReasoningStep { .. } => "reasoning-step",
            StreamEvent::Text { .. } => "text",
        }
    }
}
