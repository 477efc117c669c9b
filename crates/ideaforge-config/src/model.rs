use ideaforge_utils::error::ConfigError;
use ideaforge_utils::types::{ConfigSource, ExecutionMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Supported HTTP LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    OpenRouter,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Anthropic, ProviderKind::OpenRouter];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenRouter => "openrouter",
        }
    }

    #[must_use]
    pub const fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-5",
            Self::OpenRouter => "openai/gpt-4o-mini",
        }
    }

    #[must_use]
    pub const fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }

    #[must_use]
    pub const fn default_api_key_env(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openrouter" => Ok(Self::OpenRouter),
            other => Err(ConfigError::InvalidValue {
                key: "llm.provider".to_string(),
                value: format!("'{other}' (expected 'anthropic' or 'openrouter')"),
            }),
        }
    }
}

/// Per-provider connection settings. The API key itself is never stored;
/// only the name of the environment variable holding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub model: String,
    pub api_key_env: String,
    pub base_url: String,
    pub max_tokens: u32,
}

impl ProviderSettings {
    #[must_use]
    pub fn defaults_for(kind: ProviderKind) -> Self {
        Self {
            model: kind.default_model().to_string(),
            api_key_env: kind.default_api_key_env().to_string(),
            base_url: kind.default_base_url().to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Read the API key from the configured environment variable.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// `[llm]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub provider: ProviderKind,
    pub fallback_provider: Option<ProviderKind>,
    pub anthropic: ProviderSettings,
    pub openrouter: ProviderSettings,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Anthropic,
            fallback_provider: None,
            anthropic: ProviderSettings::defaults_for(ProviderKind::Anthropic),
            openrouter: ProviderSettings::defaults_for(ProviderKind::OpenRouter),
        }
    }
}

impl LlmSettings {
    #[must_use]
    pub fn settings_for(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::OpenRouter => &self.openrouter,
        }
    }

    pub fn settings_for_mut(&mut self, kind: ProviderKind) -> &mut ProviderSettings {
        match kind {
            ProviderKind::Anthropic => &mut self.anthropic,
            ProviderKind::OpenRouter => &mut self.openrouter,
        }
    }
}

/// `[resilience]` section: timeout, retry and circuit breaker tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResilienceSettings {
    pub timeout_secs: u64,
    /// Total attempts against the primary provider, first one included.
    pub retry_attempts: u32,
    pub backoff_base_ms: u64,
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            retry_attempts: 3,
            backoff_base_ms: 1000,
            failure_threshold: 5,
            cooldown_secs: 60,
        }
    }
}

impl ResilienceSettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// `[executor]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub mode: ExecutionMode,
    pub batch_size: usize,
    pub inter_task_delay_ms: u64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Parallel,
            batch_size: 3,
            inter_task_delay_ms: 100,
        }
    }
}

impl ExecutorSettings {
    #[must_use]
    pub fn inter_task_delay(&self) -> Duration {
        Duration::from_millis(self.inter_task_delay_ms)
    }
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        let path = dirs::config_dir()
            .map(|dir| dir.join("ideaforge").join("settings.json"))
            .unwrap_or_else(|| PathBuf::from(".ideaforge").join("settings.json"));
        Self { path }
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmSettings,
    pub resilience: ResilienceSettings,
    pub executor: ExecutorSettings,
    pub store: StoreSettings,
    /// The config file that was loaded, if any.
    pub config_path: Option<PathBuf>,
    /// Source of each value, keyed by dotted name (`resilience.timeout_secs`).
    pub source_attribution: HashMap<String, ConfigSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmSettings::default(),
            resilience: ResilienceSettings::default(),
            executor: ExecutorSettings::default(),
            store: StoreSettings::default(),
            config_path: None,
            source_attribution: HashMap::new(),
        }
    }
}

impl Config {
    /// Source of `key`; unset keys come from defaults.
    #[must_use]
    pub fn source_of(&self, key: &str) -> ConfigSource {
        self.source_attribution
            .get(key)
            .copied()
            .unwrap_or(ConfigSource::Default)
    }

    /// Settings of the primary provider.
    #[must_use]
    pub fn primary(&self) -> &ProviderSettings {
        self.llm.settings_for(self.llm.provider)
    }

    /// Settings of the fallback provider, if one is configured.
    #[must_use]
    pub fn fallback(&self) -> Option<&ProviderSettings> {
        self.llm.fallback_provider.map(|kind| self.llm.settings_for(kind))
    }
}

/// CLI-level overrides. Every field is optional; set fields win over every
/// other source.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub provider: Option<String>,
    pub fallback_provider: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub batch_size: Option<usize>,
    pub retry_attempts: Option<u32>,
    pub mode: Option<ExecutionMode>,
    pub store_path: Option<PathBuf>,
}

/// Shape of `.ideaforge/config.toml`. Everything optional.
#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct TomlConfig {
    pub llm: Option<TomlLlm>,
    pub resilience: Option<TomlResilience>,
    pub executor: Option<TomlExecutor>,
    pub store: Option<TomlStore>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct TomlLlm {
    pub provider: Option<String>,
    pub fallback_provider: Option<String>,
    pub anthropic: Option<TomlProvider>,
    pub openrouter: Option<TomlProvider>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct TomlProvider {
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct TomlResilience {
    pub timeout_secs: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub backoff_base_ms: Option<u64>,
    pub failure_threshold: Option<u32>,
    pub cooldown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct TomlExecutor {
    pub mode: Option<ExecutionMode>,
    pub batch_size: Option<usize>,
    pub inter_task_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct TomlStore {
    pub path: Option<PathBuf>,
}
