mod chat;
mod health;
mod sse;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use dharmaloops_agent::ReasoningService;
use dharmaloops_core::SessionSettings;
use dharmaloops_logging::Logger;

/// Shared by every request; each chat request runs its own session
#[derive(Clone)]
pub struct AppState {
    pub reasoner: Arc<dyn ReasoningService>,
    pub feedback: Arc<dyn ReasoningService>,
    pub settings: SessionSettings,
    pub logger: Arc<Logger>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::get_health))
        .route("/api/chat", post(chat::chat))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
