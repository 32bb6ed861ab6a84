mod claude;
mod openai;
mod output;
mod spawner;
mod traits;

use std::sync::Arc;
use std::time::Duration;

pub use claude::ClaudeCliService;
pub use openai::{
    OpenAiService, DEFAULT_API_KEY_ENV, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL,
};
pub use output::ServiceOutput;
pub use spawner::{ProcessOutput, ProcessSpawner};
pub use traits::{
    ChatMessage, GenerationOptions, GenerationRequest, ReasoningService, Role, ServiceError,
    ServiceKind,
};

/// Resolved settings for constructing a service
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Environment variable holding the API key (HTTP backends only)
    pub api_key_env: Option<String>,
    pub timeout: Option<Duration>,
}

/// Create a service by kind
pub fn create_service(
    kind: ServiceKind,
    config: &ServiceConfig,
) -> Result<Arc<dyn ReasoningService>, ServiceError> {
    match kind {
        ServiceKind::OpenAi => {
            let key_env = config.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV);
            let model = config.model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL);
            let mut service = OpenAiService::from_env(key_env, model)?;
            if let Some(ref base_url) = config.base_url {
                service = service.with_base_url(base_url.as_str());
            }
            if let Some(timeout) = config.timeout {
                service = service.with_timeout(timeout)?;
            }
            Ok(Arc::new(service))
        }
        ServiceKind::ClaudeCli => {
            let mut service = ClaudeCliService::new();
            if let Some(ref model) = config.model {
                service = service.with_model(model.as_str());
            }
            if let Some(timeout) = config.timeout {
                service = service.with_timeout(timeout);
            }
            Ok(Arc::new(service))
        }
    }
}
