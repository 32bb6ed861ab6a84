use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::{
    GenerationRequest, ProcessSpawner, ReasoningService, ServiceError, ServiceKind, ServiceOutput,
};

/// Reasoning service backed by the `claude` CLI in print mode
pub struct ClaudeCliService {
    binary_path: PathBuf,
    model: Option<String>,
    timeout: Option<Duration>,
}

impl ClaudeCliService {
    pub fn new() -> Self {
        Self {
            binary_path: PathBuf::from("claude"),
            model: None,
            timeout: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for ClaudeCliService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningService for ClaudeCliService {
    fn name(&self) -> &str {
        "Claude CLI"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::ClaudeCli
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary_path)
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<ServiceOutput, ServiceError> {
        // The CLI exposes no sampling flags
        if request.options.temperature.is_some() || request.options.max_tokens.is_some() {
            debug!(
                service = self.name(),
                "Ignoring sampling options unsupported by the CLI"
            );
        }

        let prompt = request.render_prompt();
        debug!(
            service = self.name(),
            prompt_len = prompt.len(),
            "Executing generation"
        );

        let mut args = vec!["--print"];

        let model_arg;
        if let Some(ref model) = self.model {
            args.push("--model");
            model_arg = model.clone();
            args.push(&model_arg);
        }

        // Prompts starting with '-' must not be read as options
        args.push("--");
        args.push(&prompt);

        let output = ProcessSpawner::spawn(&self.binary_path, &args, self.timeout).await?;

        if !output.success() {
            return Err(ServiceError::ExecutionFailed(format!(
                "claude exited with code {}: {}",
                output.exit_code,
                output.stderr.lines().last().unwrap_or_default()
            )));
        }

        Ok(ServiceOutput::new(output.stdout, output.duration))
    }
}
