use ideaforge_utils::error::ConfigError;
use ideaforge_utils::types::{ConfigSource, ExecutionMode};
use std::path::PathBuf;
use std::time::Duration;

use crate::model::{Config, ProviderKind};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when embedding ideaforge: no environment variables or config
    /// files are consulted.
    ///
    /// ```rust
    /// use ideaforge_config::{Config, ProviderKind};
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .provider(ProviderKind::OpenRouter)
    ///     .fallback_provider(ProviderKind::Anthropic)
    ///     .timeout(Duration::from_secs(20))
    ///     .batch_size(2)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.executor.batch_size, 2);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Fluent builder for [`Config`].
///
/// Every value set through the builder is attributed to
/// [`ConfigSource::Programmatic`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    provider: Option<ProviderKind>,
    fallback_provider: Option<Option<ProviderKind>>,
    models: Vec<(ProviderKind, String)>,
    base_urls: Vec<(ProviderKind, String)>,
    api_key_envs: Vec<(ProviderKind, String)>,
    timeout: Option<Duration>,
    retry_attempts: Option<u32>,
    backoff_base: Option<Duration>,
    failure_threshold: Option<u32>,
    cooldown: Option<Duration>,
    mode: Option<ExecutionMode>,
    batch_size: Option<usize>,
    inter_task_delay: Option<Duration>,
    store_path: Option<PathBuf>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn provider(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn fallback_provider(mut self, provider: ProviderKind) -> Self {
        self.fallback_provider = Some(Some(provider));
        self
    }

    #[must_use]
    pub fn no_fallback(mut self) -> Self {
        self.fallback_provider = Some(None);
        self
    }

    #[must_use]
    pub fn model(mut self, provider: ProviderKind, model: impl Into<String>) -> Self {
        self.models.push((provider, model.into()));
        self
    }

    /// Point a provider at a different endpoint (e.g. a local mock server).
    #[must_use]
    pub fn base_url(mut self, provider: ProviderKind, url: impl Into<String>) -> Self {
        self.base_urls.push((provider, url.into()));
        self
    }

    #[must_use]
    pub fn api_key_env(mut self, provider: ProviderKind, var: impl Into<String>) -> Self {
        self.api_key_envs.push((provider, var.into()));
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = Some(attempts);
        self
    }

    #[must_use]
    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = Some(base);
        self
    }

    #[must_use]
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    #[must_use]
    pub fn inter_task_delay(mut self, delay: Duration) -> Self {
        self.inter_task_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Build and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationFailed`] if the result is invalid.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        let src = ConfigSource::Programmatic;
        let mark = |config: &mut Config, key: String| {
            config.source_attribution.insert(key, src);
        };

        if let Some(provider) = self.provider {
            config.llm.provider = provider;
            mark(&mut config, "llm.provider".into());
        }
        if let Some(fallback) = self.fallback_provider {
            config.llm.fallback_provider = fallback;
            mark(&mut config, "llm.fallback_provider".into());
        }
        for (kind, model) in self.models {
            config.llm.settings_for_mut(kind).model = model;
            mark(&mut config, format!("llm.{kind}.model"));
        }
        for (kind, url) in self.base_urls {
            config.llm.settings_for_mut(kind).base_url = url;
            mark(&mut config, format!("llm.{kind}.base_url"));
        }
        for (kind, var) in self.api_key_envs {
            config.llm.settings_for_mut(kind).api_key_env = var;
            mark(&mut config, format!("llm.{kind}.api_key_env"));
        }
        if let Some(timeout) = self.timeout {
            config.resilience.timeout_secs = timeout.as_secs();
            mark(&mut config, "resilience.timeout_secs".into());
        }
        if let Some(attempts) = self.retry_attempts {
            config.resilience.retry_attempts = attempts;
            mark(&mut config, "resilience.retry_attempts".into());
        }
        if let Some(base) = self.backoff_base {
            config.resilience.backoff_base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
            mark(&mut config, "resilience.backoff_base_ms".into());
        }
        if let Some(threshold) = self.failure_threshold {
            config.resilience.failure_threshold = threshold;
            mark(&mut config, "resilience.failure_threshold".into());
        }
        if let Some(cooldown) = self.cooldown {
            config.resilience.cooldown_secs = cooldown.as_secs();
            mark(&mut config, "resilience.cooldown_secs".into());
        }
        if let Some(mode) = self.mode {
            config.executor.mode = mode;
            mark(&mut config, "executor.mode".into());
        }
        if let Some(size) = self.batch_size {
            config.executor.batch_size = size;
            mark(&mut config, "executor.batch_size".into());
        }
        if let Some(delay) = self.inter_task_delay {
            config.executor.inter_task_delay_ms =
                u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            mark(&mut config, "executor.inter_task_delay_ms".into());
        }
        if let Some(path) = self.store_path {
            config.store.path = path;
            mark(&mut config, "store.path".into());
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_attributes_programmatic() {
        let config = Config::builder()
            .mode(ExecutionMode::Sequential)
            .model(ProviderKind::Anthropic, "claude-haiku-4-5")
            .build()
            .unwrap();
        assert_eq!(config.executor.mode, ExecutionMode::Sequential);
        assert_eq!(config.primary().model, "claude-haiku-4-5");
        assert_eq!(config.source_of("executor.mode"), ConfigSource::Programmatic);
        assert_eq!(
            config.source_of("llm.anthropic.model"),
            ConfigSource::Programmatic
        );
        assert_eq!(config.source_of("executor.batch_size"), ConfigSource::Default);
    }

    #[test]
    fn test_builder_validates() {
        let result = Config::builder()
            .provider(ProviderKind::OpenRouter)
            .fallback_provider(ProviderKind::OpenRouter)
            .build();
        assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));
    }

    #[test]
    fn test_builder_base_url_for_mock_servers() {
        let config = Config::builder()
            .base_url(ProviderKind::OpenRouter, "http://127.0.0.1:9999")
            .fallback_provider(ProviderKind::OpenRouter)
            .build()
            .unwrap();
        assert_eq!(config.fallback().unwrap().base_url, "http://127.0.0.1:9999");
    }
}
