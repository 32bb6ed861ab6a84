use crate::{DharmaScores, Dimension, ScoreHistoryEntry};

/// Qualitative definition of a dimension. Included verbatim in every step
/// and feedback request so judgments stay anchored across calls.
pub fn definition(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Mindfulness => {
            "Clear, present-moment awareness of the question and of one's own reasoning: \
             noticing assumptions, reactions and gaps without being carried away by them."
        }
        Dimension::Emptiness => {
            "Recognizing that concepts, positions and identities lack a fixed, independent \
             essence: holding views lightly and seeing how things arise from causes and conditions."
        }
        Dimension::NonDuality => {
            "Seeing beyond rigid binaries such as self and other or right and wrong: \
             integrating apparent opposites into a more complete understanding."
        }
        Dimension::BoundlessCare => {
            "Genuine compassion for the wellbeing of everyone affected: reasoning that aims \
             to reduce suffering and is offered with warmth rather than detachment."
        }
    }
}

/// Markdown list of all four definitions
pub fn render_definitions() -> String {
    Dimension::ALL
        .iter()
        .map(|d| format!("- **{}** (`{}`): {}", d.label(), d.key(), definition(*d)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One trajectory line per prior step
pub fn render_trajectory(history: &[ScoreHistoryEntry]) -> String {
    if history.is_empty() {
        return "- (no prior steps)".to_string();
    }

    history
        .iter()
        .map(|entry| {
            format!(
                "- Step {}: aggregate {:.2} (mindfulness {:.2}, emptiness {:.2}, non-duality {:.2}, boundless care {:.2})",
                entry.step_index,
                entry.aggregate_mean,
                entry.scores.mindfulness,
                entry.scores.emptiness,
                entry.scores.non_duality,
                entry.scores.boundless_care,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt templates for the feedback call
pub struct FeedbackPrompts;

impl FeedbackPrompts {
    pub fn system_prompt() -> String {
        format!(
            r#"You are a contemplative reasoning coach. You review self-assessed scores for a step of reasoning and give short, practical guidance for the next step.

## Evaluation Dimensions
{definitions}

## Rules
- Judge against the definitions above, not against your own preferences.
- Refer to the qualities described in the definitions rather than quoting raw numbers.
- Reply with 2-3 sentences of plain prose. No headings, lists or preamble."#,
            definitions = render_definitions(),
        )
    }

    /// Build the user message for one feedback request
    pub fn build_feedback_prompt(
        current: &DharmaScores,
        history: &[ScoreHistoryEntry],
        target: f64,
    ) -> String {
        format!(
            r#"## Current Step Scores
- Mindfulness: {m:.2}
- Emptiness: {e:.2}
- Non-duality: {n:.2}
- Boundless care: {c:.2}
- Aggregate: {aggregate:.2}

## Prior Trajectory
{trajectory}

## Target
The aggregate target is {target:.2}.

---

1. Assess whether the trajectory is approaching the target.
2. Identify the weakest dimension(s), meaning those below the target.
3. Give 2-3 sentences of actionable guidance for the next step."#,
            m = current.mindfulness,
            e = current.emptiness,
            n = current.non_duality,
            c = current.boundless_care,
            aggregate = current.aggregate(),
            trajectory = render_trajectory(history),
            target = target,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(step_index: usize, value: f64) -> ScoreHistoryEntry {
        ScoreHistoryEntry::new(step_index, DharmaScores::uniform(value), "content")
    }

    #[test]
    fn test_definitions_cover_every_dimension() {
        let rendered = render_definitions();
        for dimension in Dimension::ALL {
            assert!(rendered.contains(dimension.label()));
            assert!(rendered.contains(dimension.key()));
        }
    }

    #[test]
    fn test_trajectory_one_line_per_entry() {
        let rendered = render_trajectory(&[entry(1, 0.4), entry(2, 0.6)]);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("- Step 1: aggregate 0.40"));
        assert!(lines[1].starts_with("- Step 2: aggregate 0.60"));
        assert!(lines[1].contains("boundless care 0.60"));
    }

    #[test]
    fn test_trajectory_empty() {
        assert_eq!(render_trajectory(&[]), "- (no prior steps)");
    }

    #[test]
    fn test_feedback_prompt_contains_scores_and_target() {
        let current = DharmaScores::new(0.9, 0.5, 0.6, 0.8);
        let prompt = FeedbackPrompts::build_feedback_prompt(&current, &[entry(1, 0.3)], 0.75);
        assert!(prompt.contains("- Emptiness: 0.50"));
        assert!(prompt.contains("- Aggregate: 0.70"));
        assert!(prompt.contains("- Step 1: aggregate 0.30"));
        assert!(prompt.contains("target is 0.75"));
    }
}
