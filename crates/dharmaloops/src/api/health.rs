use axum::extract::State;
use axum::response::Json;
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub reasoner: String,
    pub feedback: String,
    pub target: f64,
    pub max_steps: usize,
}

pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        reasoner: state.reasoner.name().to_string(),
        feedback: state.feedback.name().to_string(),
        target: state.settings.target,
        max_steps: state.settings.max_steps,
    })
}
