use dharmaloops_critic::{DharmaScores, ScoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::termination::StepRouting;

/// One completed unit of reasoning, immutable once recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningStep {
    pub title: String,
    pub content: String,
    pub scores: DharmaScores,
    pub rationale: String,
    /// 1-based position in the session
    pub step_index: usize,
    pub max_steps: usize,
    /// Guidance generated for this step, consumed by the next one
    pub feedback: Option<String>,
    /// True when the service output could not be parsed
    pub degraded: bool,
    pub routing: StepRouting,
}

impl ReasoningStep {
    pub fn aggregate(&self) -> f64 {
        self.scores.aggregate()
    }
}

/// The structured fields a step generation call must yield
#[derive(Debug, Clone, PartialEq)]
pub struct StepPayload {
    pub title: String,
    pub content: String,
    pub scores: DharmaScores,
    pub rationale: String,
}

/// Result of interpreting a step response: either it validated, or a
/// well-formed stand-in was synthesized from the raw text
#[derive(Debug, Clone, PartialEq)]
pub enum StepDraft {
    Validated(StepPayload),
    Degraded { payload: StepPayload, reason: String },
}

impl StepDraft {
    pub fn payload(&self) -> &StepPayload {
        match self {
            StepDraft::Validated(payload) => payload,
            StepDraft::Degraded { payload, .. } => payload,
        }
    }

    pub fn into_payload(self) -> StepPayload {
        match self {
            StepDraft::Validated(payload) => payload,
            StepDraft::Degraded { payload, .. } => payload,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StepDraft::Degraded { .. })
    }
}

#[derive(Error, Debug)]
pub enum StepParseError {
    #[error("No structured step payload found in response")]
    NoPayload,

    #[error("Failed to parse step JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Step payload is missing a non-empty `{0}`")]
    MissingField(&'static str),

    #[error("Invalid scores: {0}")]
    Scores(#[from] ScoreError),
}

#[derive(Deserialize)]
struct RawStepPayload {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    scores: DharmaScores,
    #[serde(default)]
    rationale: String,
}

const EMPTY_RESPONSE_PLACEHOLDER: &str = "(The reasoning service returned no text for this step.)";

/// Interpret a step response, degrading instead of failing
pub fn parse_step(response: &str, step_index: usize) -> StepDraft {
    match parse_payload(response) {
        Ok(payload) => StepDraft::Validated(payload),
        Err(e) => {
            debug!(step_index, error = %e, "Step payload rejected, degrading");
            StepDraft::Degraded {
                payload: degraded_payload(response, step_index, &e),
                reason: e.to_string(),
            }
        }
    }
}

/// Strict parse: try each candidate payload in order and keep the first
/// that deserializes and validates
pub fn parse_payload(response: &str) -> Result<StepPayload, StepParseError> {
    let mut first_error = None;
    for candidate in payload_candidates(response) {
        match parse_candidate(candidate) {
            Ok(payload) => return Ok(payload),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    Err(first_error.unwrap_or(StepParseError::NoPayload))
}

fn parse_candidate(json: &str) -> Result<StepPayload, StepParseError> {
    let raw: RawStepPayload = serde_json::from_str(json)?;

    let title = raw.title.trim();
    if title.is_empty() {
        return Err(StepParseError::MissingField("title"));
    }
    let content = raw.content.trim();
    if content.is_empty() {
        return Err(StepParseError::MissingField("content"));
    }
    raw.scores.validate()?;

    Ok(StepPayload {
        title: title.to_string(),
        content: content.to_string(),
        scores: raw.scores,
        rationale: raw.rationale.trim().to_string(),
    })
}

/// Possible JSON payloads, most specific first. The `<step>` body is
/// searched before the whole response; within each, the body itself, then a
/// fenced json block, then every complete JSON object in order of position.
pub fn payload_candidates(response: &str) -> Vec<&str> {
    let mut scopes = Vec::new();
    if let Some(block) = between(response, "<step>", "</step>") {
        scopes.push(block);
    }
    scopes.push(response.trim());

    let mut candidates = Vec::new();
    for scope in scopes {
        if scope.starts_with('{') {
            candidates.push(scope);
        }
        if let Some(fenced) = between(scope, "```json", "```") {
            candidates.push(fenced);
        }
        candidates.extend(
            scope
                .match_indices('{')
                .filter_map(move |(start, _)| object_at(&scope[start..])),
        );
    }
    candidates.dedup();
    candidates
}

/// The complete JSON object at the start of `text`, ignoring what follows
fn object_at(text: &str) -> Option<&str> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<serde_json::Value>();
    match stream.next() {
        Some(Ok(serde_json::Value::Object(_))) => Some(&text[..stream.byte_offset()]),
        _ => None,
    }
}

fn between<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let end = text[start..].find(close)? + start;
    Some(text[start..end].trim())
}

fn degraded_payload(response: &str, step_index: usize, error: &StepParseError) -> StepPayload {
    let content = response.trim();
    StepPayload {
        title: format!("Reasoning Step {}", step_index),
        content: if content.is_empty() {
            EMPTY_RESPONSE_PLACEHOLDER.to_string()
        } else {
            content.to_string()
        },
        scores: DharmaScores::midpoint(),
        rationale: format!(
            "Score parsing failed ({}); all dimensions defaulted to {}.",
            error,
            DharmaScores::MIDPOINT
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_JSON: &str = r#"{"title": "Seeing the question", "content": "The question rests on a fixed idea of self.", "scores": {"mindfulness": 0.8, "emptiness": 0.7, "nonDuality": 0.6, "boundlessCare": 0.9}, "rationale": "Clear but still dualistic."}"#;

    #[test]
    fn test_parse_step_block() {
        let response = format!("Here is my step.\n<step>\n{}\n</step>\nDone.", VALID_JSON);
        let draft = parse_step(&response, 1);
        assert!(!draft.is_degraded());
        let payload = draft.payload();
        assert_eq!(payload.title, "Seeing the question");
        assert_eq!(payload.scores.boundless_care, 0.9);
        assert_eq!(payload.rationale, "Clear but still dualistic.");
    }

    #[test]
    fn test_parse_fenced_json() {
        let response = format!("```json\n{}\n```", VALID_JSON);
        assert!(!parse_step(&response, 2).is_degraded());
    }

    #[test]
    fn test_parse_bare_json_with_surrounding_text() {
        let response = format!("Sure! {} Hope this helps.", VALID_JSON);
        let payload = parse_step(&response, 3).into_payload();
        assert_eq!(payload.content, "The question rests on a fixed idea of self.");
    }

    #[test]
    fn test_plain_text_degrades() {
        let response = "I think the answer is to sit with it.";
        let draft = parse_step(response, 4);
        assert!(draft.is_degraded());

        let payload = draft.payload();
        assert_eq!(payload.title, "Reasoning Step 4");
        assert_eq!(payload.content, response);
        assert_eq!(payload.scores, DharmaScores::midpoint());
        assert!(payload.rationale.contains("parsing failed"));
    }

    #[test]
    fn test_out_of_range_scores_degrade() {
        let response = r#"<step>{"title": "t", "content": "c", "scores": {"mindfulness": 1.5, "emptiness": 0.5, "nonDuality": 0.5, "boundlessCare": 0.5}}</step>"#;
        let draft = parse_step(response, 1);
        assert!(draft.is_degraded());
        assert_eq!(draft.payload().scores, DharmaScores::midpoint());
        if let StepDraft::Degraded { reason, .. } = draft {
            assert!(reason.contains("Mindfulness"));
        }
    }

    #[test]
    fn test_missing_score_field_degrades() {
        let response = r#"<step>{"title": "t", "content": "c", "scores": {"mindfulness": 0.5}}</step>"#;
        assert!(matches!(
            parse_payload(response),
            Err(StepParseError::Json(_))
        ));
        assert!(parse_step(response, 1).is_degraded());
    }

    #[test]
    fn test_empty_title_rejected() {
        let response = r#"{"title": "  ", "content": "c", "scores": {"mindfulness": 0.5, "emptiness": 0.5, "nonDuality": 0.5, "boundlessCare": 0.5}}"#;
        assert!(matches!(
            parse_payload(response),
            Err(StepParseError::MissingField("title"))
        ));
    }

    #[test]
    fn test_step_block_wrapping_fence() {
        let response = format!("<step>\n```json\n{}\n```\n</step>", VALID_JSON);
        let draft = parse_step(&response, 1);
        assert!(!draft.is_degraded());
        assert_eq!(draft.payload().scores.mindfulness, 0.8);
    }

    #[test]
    fn test_step_block_with_leading_prose() {
        let response = format!("<step>Here is step 2: {}</step>", VALID_JSON);
        let draft = parse_step(&response, 2);
        assert!(!draft.is_degraded());
        assert_eq!(draft.payload().title, "Seeing the question");
    }

    #[test]
    fn test_trailing_brace_in_prose() {
        let response = format!("{}\nNote: the set {{self}} is empty.", VALID_JSON);
        let draft = parse_step(&response, 3);
        assert!(!draft.is_degraded());
        assert_eq!(draft.payload().rationale, "Clear but still dualistic.");
    }

    #[test]
    fn test_invalid_block_falls_back_to_later_object() {
        let response = format!("<step>not json</step>\n{}", VALID_JSON);
        assert!(!parse_step(&response, 1).is_degraded());
    }

    #[test]
    fn test_no_braces_is_no_payload() {
        assert!(matches!(
            parse_payload("just words"),
            Err(StepParseError::NoPayload)
        ));
    }

    #[test]
    fn test_empty_response_uses_placeholder() {
        let payload = parse_step("   ", 2).into_payload();
        assert_eq!(payload.content, EMPTY_RESPONSE_PLACEHOLDER);
    }
}
