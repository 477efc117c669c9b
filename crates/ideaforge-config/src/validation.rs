use ideaforge_utils::error::ConfigError;

use crate::model::{Config, ProviderKind};

/// Upper bound for `resilience.timeout_secs`.
pub const MAX_TIMEOUT_SECS: u64 = 600;

impl Config {
    /// Check cross-field and range constraints, reporting every problem at
    /// once.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ValidationFailed`] listing each violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.llm.fallback_provider == Some(self.llm.provider) {
            errors.push(format!(
                "llm.fallback_provider must differ from llm.provider (both are '{}')",
                self.llm.provider
            ));
        }

        for kind in ProviderKind::ALL {
            let settings = self.llm.settings_for(kind);
            if settings.model.trim().is_empty() {
                errors.push(format!("llm.{kind}.model must not be empty"));
            }
            if settings.api_key_env.trim().is_empty() {
                errors.push(format!("llm.{kind}.api_key_env must not be empty"));
            }
            if !(settings.base_url.starts_with("http://") || settings.base_url.starts_with("https://")) {
                errors.push(format!(
                    "llm.{kind}.base_url must be an http(s) URL, got '{}'",
                    settings.base_url
                ));
            }
            if settings.max_tokens == 0 {
                errors.push(format!("llm.{kind}.max_tokens must be greater than 0"));
            }
        }

        let res = &self.resilience;
        if res.timeout_secs == 0 {
            errors.push("resilience.timeout_secs must be greater than 0".to_string());
        } else if res.timeout_secs > MAX_TIMEOUT_SECS {
            errors.push(format!(
                "resilience.timeout_secs must be at most {MAX_TIMEOUT_SECS} (10 minutes), got {}",
                res.timeout_secs
            ));
        }
        if res.retry_attempts == 0 {
            errors.push("resilience.retry_attempts must be greater than 0".to_string());
        }
        if res.failure_threshold == 0 {
            errors.push("resilience.failure_threshold must be greater than 0".to_string());
        }
        if self.executor.batch_size == 0 {
            errors.push("executor.batch_size must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed {
                error_count: errors.len(),
                errors,
            })
        }
    }
}
