use dharmaloops_agent::GenerationOptions;
use dharmaloops_critic::prompts::render_definitions;

use crate::ReasoningStep;

pub const STEP_OPTIONS: GenerationOptions = GenerationOptions {
    temperature: Some(0.7),
    max_tokens: Some(1500),
};

pub const SYNTHESIS_OPTIONS: GenerationOptions = GenerationOptions {
    temperature: Some(0.5),
    max_tokens: Some(1000),
};

pub const SYNTHESIS_SYSTEM_PROMPT: &str = "You turn a recorded sequence of reasoning steps into the final answer for the user. \
Be concise and directive: state the answer and the concrete guidance that follows from the reasoning. \
Do not restate every step, do not mention scores, and do not add new lines of inquiry.";

/// Prompt templates for step generation and synthesis
pub struct StepPrompts;

impl StepPrompts {
    pub fn system_prompt(max_steps: usize) -> String {
        format!(
            r#"You are a contemplative reasoner. You work through a question one step at a time, for at most {max_steps} steps, and honestly assess each step against four dimensions.

## Evaluation Dimensions
{definitions}

## Scoring
Score every dimension from 0.0 to 1.0. Score what the step actually shows, not what you intended. Low scores are useful; inflated scores are not.

## Output Format
Reply with exactly one JSON object inside a step block:

<step>
{{"title": "Short title for this step", "content": "The substantive reasoning for this step", "scores": {{"mindfulness": 0.0, "emptiness": 0.0, "nonDuality": 0.0, "boundlessCare": 0.0}}, "rationale": "Why these scores"}}
</step>"#,
            max_steps = max_steps,
            definitions = render_definitions(),
        )
    }

    pub fn step_instruction(step_index: usize, max_steps: usize) -> String {
        format!(
            "Generate step {} of {}. Build on the previous steps rather than repeating them.",
            step_index, max_steps
        )
    }

    /// Attributed note carrying the previous step's feedback
    pub fn feedback_note(previous_step: usize, feedback: &str) -> String {
        format!(
            "Feedback on step {}: {}\n\nIncorporate this guidance in the next step.",
            previous_step, feedback
        )
    }

    /// How a recorded step re-enters the conversation
    pub fn step_message(step: &ReasoningStep) -> String {
        format!("Step {}: {}\n\n{}", step.step_index, step.title, step.content)
    }

    pub fn synthesis_prompt(steps: &[ReasoningStep]) -> String {
        let transcript = if steps.is_empty() {
            "(No reasoning steps were recorded.)".to_string()
        } else {
            steps
                .iter()
                .map(|s| format!("### Step {}: {}\n{}", s.step_index, s.title, s.content))
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        format!(
            "## Reasoning Transcript\n\n{}\n\n---\n\nUsing the transcript above, give a concise, directive final answer to the question.",
            transcript
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_describes_format_and_dimensions() {
        let prompt = StepPrompts::system_prompt(7);
        assert!(prompt.contains("at most 7 steps"));
        assert!(prompt.contains("<step>"));
        assert!(prompt.contains("\"boundlessCare\""));
        assert!(prompt.contains("Non-duality"));
    }

    #[test]
    fn test_step_instruction() {
        assert!(StepPrompts::step_instruction(3, 10).starts_with("Generate step 3 of 10."));
    }

    #[test]
    fn test_feedback_note_is_attributed() {
        let note = StepPrompts::feedback_note(2, "Soften the conclusion.");
        assert!(note.starts_with("Feedback on step 2: Soften the conclusion."));
    }

    #[test]
    fn test_synthesis_prompt_without_steps() {
        assert!(StepPrompts::synthesis_prompt(&[]).contains("No reasoning steps were recorded"));
    }
}
