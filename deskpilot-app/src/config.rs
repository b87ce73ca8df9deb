use anyhow::{bail, Context, Result};
use deskpilot_core::MAX_TURNS;
use deskpilot_executor::SandboxLimits;
use deskpilot_providers::{AnthropicAdapter, ProviderAdapter, ResponsesAdapter, RetryPolicy};
use deskpilot_tools::screenshot::DEFAULT_MAX_ENCODED_BYTES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "deskpilot.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    Openai,
}

impl ProviderKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" => Ok(Self::Openai),
            other => bail!("Unknown provider '{}': expected anthropic or openai", other),
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Openai => "openai",
        }
    }

    pub fn adapter(self) -> Arc<dyn ProviderAdapter> {
        match self {
            Self::Anthropic => Arc::new(AnthropicAdapter::new()),
            Self::Openai => Arc::new(ResponsesAdapter::new()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub default_timeout_secs: u64,
    pub max_timeout_secs: u64,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        let limits = SandboxLimits::default();
        Self {
            default_timeout_secs: limits.default_timeout.as_secs(),
            max_timeout_secs: limits.max_timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderKind,
    /// Overrides the model named by the prompt.
    pub model: Option<String>,
    pub prompt_dir: PathBuf,
    pub prompt_name: String,
    /// Enables the file-backed trace, call and screenshot logs.
    pub log_dir: Option<PathBuf>,
    pub credentials_file: PathBuf,
    pub max_screenshot_bytes: usize,
    pub attach_screenshots: bool,
    pub retry: RetryConfig,
    pub terminal: TerminalConfig,
    pub max_turns: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Anthropic,
            model: None,
            prompt_dir: PathBuf::from("prompts"),
            prompt_name: "default".to_string(),
            log_dir: None,
            credentials_file: default_credentials_file(),
            max_screenshot_bytes: DEFAULT_MAX_ENCODED_BYTES,
            attach_screenshots: true,
            retry: RetryConfig::default(),
            terminal: TerminalConfig::default(),
            max_turns: MAX_TURNS,
        }
    }
}

fn default_credentials_file() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("deskpilot")
        .join("credentials.yaml")
}

impl AppConfig {
    /// Load from YAML; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if content.trim().is_empty() {
                Self::default()
            } else {
                serde_yaml::from_str(&content)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("DESKPILOT_PROVIDER").filter(|v| !v.trim().is_empty()) {
            self.provider = ProviderKind::parse(&provider)?;
        }
        if let Some(model) = lookup("DESKPILOT_MODEL").filter(|v| !v.trim().is_empty()) {
            self.model = Some(model);
        }
        Ok(())
    }

    pub fn validate(&mut self) -> Result<()> {
        if self.prompt_name.trim().is_empty() {
            bail!("prompt_name cannot be empty");
        }
        if self.max_screenshot_bytes < 1024 {
            bail!(
                "max_screenshot_bytes must be at least 1024, got {}",
                self.max_screenshot_bytes
            );
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        self.max_turns = self.max_turns.clamp(1, MAX_TURNS);
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    pub fn sandbox_limits(&self) -> SandboxLimits {
        let max_timeout = Duration::from_secs(self.terminal.max_timeout_secs.max(1));
        SandboxLimits {
            default_timeout: Duration::from_secs(self.terminal.default_timeout_secs.max(1))
                .min(max_timeout),
            max_timeout,
            ..SandboxLimits::default()
        }
    }
}
