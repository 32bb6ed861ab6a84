use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::ServiceOutput;

/// Errors that can occur while calling a reasoning service
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Reasoning service request failed: {0}")]
    Request(String),

    #[error("Reasoning service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid reasoning service response: {0}")]
    InvalidResponse(String),

    #[error("Reasoning service returned an empty response")]
    EmptyResponse,

    #[error("Failed to spawn reasoning process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Reasoning service timed out after {0:?}")]
    Timeout(Duration),

    #[error("Reasoning process failed: {0}")]
    ExecutionFailed(String),

    #[error("Reasoning service configuration error: {0}")]
    Config(String),
}

/// Author of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One role/content message of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Sampling settings forwarded to the service when it supports them
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerationOptions {
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
        }
    }
}

/// A single generation call: system instruction plus ordered messages
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub options: GenerationOptions,
}

impl GenerationRequest {
    pub fn new(system: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            system: system.into(),
            messages,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Render the whole request as one prompt, for backends without
    /// native message lists
    pub fn render_prompt(&self) -> String {
        let mut prompt = String::new();
        if !self.system.is_empty() {
            prompt.push_str(&self.system);
            prompt.push_str("\n\n---\n\n");
        }
        for message in &self.messages {
            prompt.push_str(&format!("**{}**: {}\n\n", message.role, message.content));
        }
        prompt.trim_end().to_string()
    }
}

/// Supported service backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    OpenAi,
    ClaudeCli,
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceKind::OpenAi => write!(f, "openai"),
            ServiceKind::ClaudeCli => write!(f, "claude-cli"),
        }
    }
}

impl std::str::FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "open-ai" => Ok(ServiceKind::OpenAi),
            "claude" | "claude-cli" | "claudecli" => Ok(ServiceKind::ClaudeCli),
            _ => Err(format!("Unknown service kind: {}", s)),
        }
    }
}

/// The core abstraction for text-generation backends
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Human-readable name of the service (e.g., "OpenAI", "Claude CLI")
    fn name(&self) -> &str;

    /// The service kind
    fn kind(&self) -> ServiceKind;

    /// Run one generation call and return the raw text
    async fn generate(&self, request: &GenerationRequest) -> Result<ServiceOutput, ServiceError>;

    /// Check whether the service can be reached or invoked
    async fn is_available(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prompt_includes_system_and_roles() {
        let request = GenerationRequest::new(
            "You are careful.",
            vec![
                ChatMessage::user("What is suffering?"),
                ChatMessage::assistant("Step 1: Looking closely"),
            ],
        );
        let prompt = request.render_prompt();
        assert!(prompt.starts_with("You are careful."));
        assert!(prompt.contains("**user**: What is suffering?"));
        assert!(prompt.contains("**assistant**: Step 1: Looking closely"));
    }

    #[test]
    fn test_service_kind_from_str() {
        assert_eq!("openai".parse::<ServiceKind>(), Ok(ServiceKind::OpenAi));
        assert_eq!("Claude".parse::<ServiceKind>(), Ok(ServiceKind::ClaudeCli));
        assert!("gemini".parse::<ServiceKind>().is_err());
    }
}
