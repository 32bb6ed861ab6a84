//! Configuration file support for dharmaloops.
//!
//! Settings come from CLI flags, then `dharmaloops.toml` in the working
//! directory, then the global `<config_dir>/dharmaloops/config.toml`, then
//! built-in defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dharmaloops_agent::{ServiceConfig, ServiceKind};
use dharmaloops_core::{SessionSettings, DEFAULT_MAX_STEPS, DEFAULT_TARGET};

/// The project config file name
pub const CONFIG_FILE_NAME: &str = "dharmaloops.toml";

/// Configuration loaded from a TOML file (project or global)
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Aggregate score that ends the session
    pub target: Option<f64>,
    /// Step ceiling
    pub max_steps: Option<usize>,
    /// Default service (applies to both reasoner and feedback)
    pub service: Option<String>,
    /// Default model (applies to both reasoner and feedback)
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Reasoner-specific configuration
    #[serde(default)]
    pub reasoner: RoleConfig,
    /// Feedback-specific configuration
    #[serde(default)]
    pub feedback: RoleConfig,
}

/// Configuration for a specific role (reasoner or feedback)
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    pub service: Option<String>,
    pub model: Option<String>,
}

impl RoleConfig {
    fn or(self, base: RoleConfig) -> RoleConfig {
        RoleConfig {
            service: self.service.or(base.service),
            model: self.model.or(base.model),
        }
    }
}

impl FileConfig {
    /// Load configuration from a file.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(Some(config))
    }

    /// Load `dharmaloops.toml` from the working directory
    pub fn load_project(working_dir: &Path) -> Result<Option<Self>> {
        Self::load_from(&working_dir.join(CONFIG_FILE_NAME))
    }

    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dharmaloops").join("config.toml"))
    }

    pub fn load_global() -> Result<Option<Self>> {
        match Self::global_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    /// Load project and global config and layer them
    pub fn load_layered(working_dir: &Path) -> Result<Self> {
        let global = Self::load_global()?.unwrap_or_default();
        let project = Self::load_project(working_dir)?.unwrap_or_default();
        Ok(project.layered_over(global))
    }

    /// Values set in `self` win over `base`
    pub fn layered_over(self, base: FileConfig) -> FileConfig {
        FileConfig {
            target: self.target.or(base.target),
            max_steps: self.max_steps.or(base.max_steps),
            service: self.service.or(base.service),
            model: self.model.or(base.model),
            base_url: self.base_url.or(base.base_url),
            api_key_env: self.api_key_env.or(base.api_key_env),
            timeout_secs: self.timeout_secs.or(base.timeout_secs),
            reasoner: self.reasoner.or(base.reasoner),
            feedback: self.feedback.or(base.feedback),
        }
    }

    /// Priority: [reasoner].service > global service > None
    pub fn reasoner_service(&self) -> Option<&str> {
        self.reasoner.service.as_deref().or(self.service.as_deref())
    }

    /// Priority: [reasoner].model > global model > None
    pub fn reasoner_model(&self) -> Option<&str> {
        self.reasoner.model.as_deref().or(self.model.as_deref())
    }

    /// Priority: [feedback].service > global service > None
    pub fn feedback_service(&self) -> Option<&str> {
        self.feedback.service.as_deref().or(self.service.as_deref())
    }

    /// Priority: [feedback].model > global model > None
    pub fn feedback_model(&self) -> Option<&str> {
        self.feedback.model.as_deref().or(self.model.as_deref())
    }
}

/// Values given on the command line; these win over any file
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub target: Option<f64>,
    pub max_steps: Option<usize>,
    pub service: Option<ServiceKind>,
    pub reasoner_service: Option<ServiceKind>,
    pub feedback_service: Option<ServiceKind>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Which backend a role uses and how to build it
#[derive(Debug, Clone)]
pub struct RoleSelection {
    pub kind: ServiceKind,
    pub config: ServiceConfig,
}

/// Fully resolved settings for a run or a server
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub settings: SessionSettings,
    pub reasoner: RoleSelection,
    pub feedback: RoleSelection,
}

fn parse_kind(value: Option<&str>) -> Result<Option<ServiceKind>> {
    value
        .map(|s| s.parse::<ServiceKind>().map_err(anyhow::Error::msg))
        .transpose()
}

/// Combine CLI overrides with file configuration.
///
/// Fails when a configured service name is unknown or the session
/// settings are out of range.
pub fn resolve(cli: &CliOverrides, file: &FileConfig) -> Result<ResolvedConfig> {
    let settings = SessionSettings::new(
        cli.target.or(file.target).unwrap_or(DEFAULT_TARGET),
        cli.max_steps.or(file.max_steps).unwrap_or(DEFAULT_MAX_STEPS),
    )
    .context("Invalid session settings")?;

    let base_url = cli.base_url.clone().or_else(|| file.base_url.clone());
    let timeout = cli
        .timeout_secs
        .or(file.timeout_secs)
        .map(Duration::from_secs);

    let role = |cli_kind: Option<ServiceKind>,
                file_kind: Option<&str>,
                file_model: Option<&str>|
     -> Result<RoleSelection> {
        let kind = match cli_kind.or(cli.service) {
            Some(kind) => kind,
            None => parse_kind(file_kind)?.unwrap_or(ServiceKind::OpenAi),
        };
        Ok(RoleSelection {
            kind,
            config: ServiceConfig {
                model: cli.model.clone().or_else(|| file_model.map(String::from)),
                base_url: base_url.clone(),
                api_key_env: file.api_key_env.clone(),
                timeout,
            },
        })
    };

    let reasoner = role(
        cli.reasoner_service,
        file.reasoner_service(),
        file.reasoner_model(),
    )?;
    let feedback = role(
        cli.feedback_service,
        file.feedback_service(),
        file.feedback_model(),
    )?;

    Ok(ResolvedConfig {
        settings,
        reasoner,
        feedback,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, content: &str) {
        std::fs::write(dir.join(CONFIG_FILE_NAME), content).unwrap();
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(FileConfig::load_project(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_full_config() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            r#"
target = 0.8
max_steps = 6
service = "openai"
model = "gpt-4o"
timeout_secs = 90

[feedback]
service = "claude"
model = "haiku"
"#,
        );

        let config = FileConfig::load_project(dir.path()).unwrap().unwrap();
        assert_eq!(config.target, Some(0.8));
        assert_eq!(config.max_steps, Some(6));
        assert_eq!(config.reasoner_service(), Some("openai"));
        assert_eq!(config.reasoner_model(), Some("gpt-4o"));
        assert_eq!(config.feedback_service(), Some("claude"));
        assert_eq!(config.feedback_model(), Some("haiku"));
    }

    #[test]
    fn test_unknown_key_is_error() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "temperature = 0.2\n");
        assert!(FileConfig::load_project(dir.path()).is_err());
    }

    #[test]
    fn test_project_layers_over_global() {
        let global = FileConfig {
            target: Some(0.6),
            max_steps: Some(8),
            model: Some("global-model".into()),
            ..Default::default()
        };
        let project = FileConfig {
            target: Some(0.9),
            ..Default::default()
        };

        let merged = project.layered_over(global);
        assert_eq!(merged.target, Some(0.9));
        assert_eq!(merged.max_steps, Some(8));
        assert_eq!(merged.model.as_deref(), Some("global-model"));
    }

    #[test]
    fn test_resolve_defaults() {
        let resolved = resolve(&CliOverrides::default(), &FileConfig::default()).unwrap();
        assert_eq!(resolved.settings, SessionSettings::default());
        assert_eq!(resolved.reasoner.kind, ServiceKind::OpenAi);
        assert_eq!(resolved.feedback.kind, ServiceKind::OpenAi);
        assert!(resolved.reasoner.config.model.is_none());
    }

    #[test]
    fn test_cli_wins_over_file() {
        let file = FileConfig {
            target: Some(0.6),
            max_steps: Some(8),
            service: Some("claude".into()),
            model: Some("file-model".into()),
            ..Default::default()
        };
        let cli = CliOverrides {
            max_steps: Some(3),
            service: Some(ServiceKind::OpenAi),
            model: Some("cli-model".into()),
            ..Default::default()
        };

        let resolved = resolve(&cli, &file).unwrap();
        assert_eq!(resolved.settings.target, 0.6);
        assert_eq!(resolved.settings.max_steps, 3);
        assert_eq!(resolved.reasoner.kind, ServiceKind::OpenAi);
        assert_eq!(resolved.reasoner.config.model.as_deref(), Some("cli-model"));
    }

    #[test]
    fn test_role_overrides() {
        let file = FileConfig {
            service: Some("openai".into()),
            feedback: RoleConfig {
                service: Some("claude-cli".into()),
                model: None,
            },
            ..Default::default()
        };
        let cli = CliOverrides {
            reasoner_service: Some(ServiceKind::ClaudeCli),
            ..Default::default()
        };

        let resolved = resolve(&cli, &file).unwrap();
        assert_eq!(resolved.reasoner.kind, ServiceKind::ClaudeCli);
        assert_eq!(resolved.feedback.kind, ServiceKind::ClaudeCli);

        let resolved = resolve(&CliOverrides::default(), &file).unwrap();
        assert_eq!(resolved.reasoner.kind, ServiceKind::OpenAi);
        assert_eq!(resolved.feedback.kind, ServiceKind::ClaudeCli);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let file = FileConfig {
            target: Some(1.5),
            ..Default::default()
        };
        assert!(resolve(&CliOverrides::default(), &file).is_err());

        let cli = CliOverrides {
            max_steps: Some(0),
            ..Default::default()
        };
        assert!(resolve(&cli, &FileConfig::default()).is_err());
    }

    #[test]
    fn test_unknown_service_name_rejected() {
        let file = FileConfig {
            service: Some("gemini".into()),
            ..Default::default()
        };
        assert!(resolve(&CliOverrides::default(), &file).is_err());
    }
}
