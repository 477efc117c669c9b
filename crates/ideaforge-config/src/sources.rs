use std::collections::BTreeMap;

use crate::model::{Config, ProviderKind};

impl Config {
    /// Effective configuration as `key -> (value, source)`, sorted by key.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut config = BTreeMap::new();
        let mut add = |key: &str, value: String| {
            config.insert(key.to_string(), (value, self.source_of(key).to_string()));
        };

        add("llm.provider", self.llm.provider.to_string());
        add(
            "llm.fallback_provider",
            self.llm
                .fallback_provider
                .map_or_else(|| "none".to_string(), |k| k.to_string()),
        );
        for kind in ProviderKind::ALL {
            let settings = self.llm.settings_for(kind);
            add(&format!("llm.{kind}.model"), settings.model.clone());
            add(&format!("llm.{kind}.api_key_env"), settings.api_key_env.clone());
            add(&format!("llm.{kind}.base_url"), settings.base_url.clone());
            add(&format!("llm.{kind}.max_tokens"), settings.max_tokens.to_string());
        }

        add("resilience.timeout_secs", self.resilience.timeout_secs.to_string());
        add("resilience.retry_attempts", self.resilience.retry_attempts.to_string());
        add("resilience.backoff_base_ms", self.resilience.backoff_base_ms.to_string());
        add("resilience.failure_threshold", self.resilience.failure_threshold.to_string());
        add("resilience.cooldown_secs", self.resilience.cooldown_secs.to_string());

        add("executor.mode", self.executor.mode.to_string());
        add("executor.batch_size", self.executor.batch_size.to_string());
        add("executor.inter_task_delay_ms", self.executor.inter_task_delay_ms.to_string());

        add("store.path", self.store.path.display().to_string());

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaforge_utils::types::ConfigSource;

    #[test]
    fn test_effective_config_reports_sources() {
        let mut config = Config::default();
        config.executor.batch_size = 4;
        config
            .source_attribution
            .insert("executor.batch_size".into(), ConfigSource::Cli);

        let effective = config.effective_config();
        assert_eq!(
            effective.get("executor.batch_size"),
            Some(&("4".to_string(), "cli".to_string()))
        );
        assert_eq!(
            effective.get("llm.provider"),
            Some(&("anthropic".to_string(), "default".to_string()))
        );
        assert_eq!(effective["llm.fallback_provider"].0, "none");
        assert!(effective.contains_key("llm.openrouter.api_key_env"));
    }

    #[test]
    fn test_effective_config_never_contains_key_material() {
        let effective = Config::default().effective_config();
        assert!(effective.keys().all(|k| !k.ends_with(".api_key")));
    }
}
