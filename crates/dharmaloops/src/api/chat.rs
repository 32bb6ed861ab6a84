use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Json;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::info;

use dharmaloops_agent::ChatMessage;
use dharmaloops_core::LoopRunner;

use super::sse::{done_event, to_sse_event};
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

/// Reject requests the loop cannot start from
pub fn validate_request(request: &ChatRequest) -> Result<(), (StatusCode, String)> {
    if request.messages.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "messages must contain at least one message".to_string(),
        ));
    }
    Ok(())
}

/// Run a reasoning session and stream its steps and answer as SSE.
///
/// The session runs on its own task; a client disconnect only drops the
/// receiving end.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)>
{
    validate_request(&request)?;

    let runner = LoopRunner::new(
        state.reasoner.clone(),
        state.feedback.clone(),
        state.settings,
        state.logger.clone(),
    )
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let outcome = runner.run(request.messages, tx).await;
        info!(
            run_id = %outcome.run_id,
            steps = outcome.step_count(),
            termination = outcome.termination.label(),
            "Chat session finished"
        );
    });

    let stream = UnboundedReceiverStream::new(rx)
        .map(|event| Ok(to_sse_event(&event)))
        .chain(tokio_stream::once(Ok(done_event())));

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_messages_rejected() {
        let request: ChatRequest = serde_json::from_str(r#"{"messages": []}"#).unwrap();
        let err = validate_request(&request).unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_request_parses_roles() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"messages": [{"role": "user", "content": "What is emptiness?"}]}"#,
        )
        .unwrap();
        assert!(validate_request(&request).is_ok());
        assert_eq!(request.messages[0], ChatMessage::user("What is emptiness?"));
    }
}
