//! OpenAI-compatible chat completions backend.
//!
//! Works against any endpoint that speaks the `/chat/completions` wire
//! format. The API key is read from an environment variable at construction.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::{
    ChatMessage, GenerationRequest, ReasoningService, Role, ServiceError, ServiceKind,
    ServiceOutput,
};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Reasoning service that talks to an OpenAI-compatible HTTP API
#[derive(Clone)]
pub struct OpenAiService {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiService {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }

    /// Read the API key from `key_env`.
    pub fn from_env(key_env: &str, model: impl Into<String>) -> Result<Self, ServiceError> {
        let api_key = std::env::var(key_env)
            .map_err(|_| ServiceError::Config(format!("{} is not set", key_env)))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ServiceError> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(self)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_body<'a>(&'a self, request: &'a GenerationRequest) -> ChatCompletionRequest<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.is_empty() {
            messages.push(WireMessage {
                role: Role::System,
                content: &request.system,
            });
        }
        messages.extend(request.messages.iter().map(WireMessage::from));

        ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: request.options.temperature,
            max_tokens: request.options.max_tokens,
        }
    }
}

#[async_trait]
impl ReasoningService for OpenAiService {
    fn name(&self) -> &str {
        "OpenAI"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::OpenAi
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<ServiceOutput, ServiceError> {
        let start = Instant::now();
        let body = self.build_body(request);

        debug!(
            model = %self.model,
            messages = body.messages.len(),
            temperature = ?body.temperature,
            max_tokens = ?body.max_tokens,
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        let text = extract_text(parsed)?;
        let duration = start.elapsed();

        debug!(
            duration_ms = duration.as_millis(),
            response_len = text.len(),
            "Chat completion finished"
        );

        Ok(ServiceOutput::new(text, duration))
    }
}

fn extract_text(response: ChatCompletionResponse) -> Result<String, ServiceError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::InvalidResponse("response has no choices".into()))?;

    match choice.message.content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ServiceError::EmptyResponse),
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

impl<'a> From<&'a ChatMessage> for WireMessage<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        Self {
            role: message.role,
            content: &message.content,
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
