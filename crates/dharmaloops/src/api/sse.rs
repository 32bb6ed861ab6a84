use axum::response::sse::Event;

use dharmaloops_core::StreamEvent;

/// Data of the terminal event sent after the final answer
pub const DONE_MARKER: &str = "[DONE]";

/// Event name and JSON data for one stream event
pub fn event_parts(event: &StreamEvent) -> (&'static str, String) {
    (
        event.kind(),
        serde_json::to_string(event).unwrap_or_default(),
    )
}

pub fn to_sse_event(event: &StreamEvent) -> Event {
    let (name, data) = event_parts(event);
    Event::default().event(name).data(data)
}

pub fn done_event() -> Event {
    Event::default().data(DONE_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_event_parts() {
        let (name, data) = event_parts(&StreamEvent::text("Be present."));
        assert_eq!(name, "text");

        let value: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(value["kind"], "text");
        assert_eq!(value["content"], "Be present.");
    }
}
