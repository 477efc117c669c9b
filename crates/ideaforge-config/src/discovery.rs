use ideaforge_utils::error::ConfigError;
use ideaforge_utils::types::ConfigSource;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::model::{CliArgs, Config, ProviderKind, TomlConfig, TomlProvider};

/// Directory searched for upward from the working directory.
pub const CONFIG_DIR: &str = ".ideaforge";
/// File name inside [`CONFIG_DIR`] (or inside `IDEAFORGE_HOME`).
pub const CONFIG_FILE: &str = "config.toml";
/// Overrides discovery with a fixed directory.
pub const HOME_ENV: &str = "IDEAFORGE_HOME";

const ENV_PROVIDER: &str = "IDEAFORGE_PROVIDER";
const ENV_FALLBACK_PROVIDER: &str = "IDEAFORGE_FALLBACK_PROVIDER";
const ENV_TIMEOUT_SECS: &str = "IDEAFORGE_TIMEOUT_SECS";
const ENV_MAX_CONCURRENT_TASKS: &str = "IDEAFORGE_MAX_CONCURRENT_TASKS";
const ENV_RETRY_ATTEMPTS: &str = "IDEAFORGE_RETRY_ATTEMPTS";

impl Config {
    /// Discover and load configuration with precedence CLI > env > file >
    /// defaults, searching from the current directory and reading the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Unreadable or invalid config file, unparsable environment values, or
    /// a configuration that fails validation.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = std::env::current_dir().map_err(|e| ConfigError::DiscoveryFailed {
            reason: format!("cannot read current directory: {e}"),
        })?;
        Self::discover_from(&start_dir, cli_args, |key| std::env::var(key).ok())
    }

    /// Path-driven variant of [`Config::discover`] with an injectable
    /// environment lookup, so tests need not touch process state.
    ///
    /// # Errors
    ///
    /// See [`Config::discover`].
    pub fn discover_from<E>(start_dir: &Path, cli_args: &CliArgs, env: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    });
                }
                Some(explicit.clone())
            }
            None => match env(HOME_ENV).filter(|home| !home.trim().is_empty()) {
                Some(home) => {
                    let candidate = PathBuf::from(home).join(CONFIG_FILE);
                    candidate.exists().then_some(candidate)
                }
                None => Self::discover_config_file_from(start_dir),
            },
        };

        if let Some(path) = &config_path {
            debug!(path = %path.display(), "Loading config file");
            let file = Self::load_config_file(path)?;
            config.apply_file(file)?;
            config.config_path = Some(path.clone());
        }

        config.apply_env(&env)?;
        config.apply_cli(cli_args)?;
        config.validate()?;
        Ok(config)
    }

    /// Search upward from `start_dir` for `.ideaforge/config.toml`, stopping
    /// at a repository root or the filesystem root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current = Some(start_dir);
        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_DIR).join(CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
            if dir.join(".git").exists() || dir.join(".hg").exists() {
                break;
            }
            current = dir.parent();
        }
        None
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::InvalidFile(format!("cannot read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| ConfigError::InvalidFile(format!("{}: {e}", path.display())))
    }

    fn mark(&mut self, key: &str, source: ConfigSource) {
        self.source_attribution.insert(key.to_string(), source);
    }

    fn apply_file(&mut self, file: TomlConfig) -> Result<(), ConfigError> {
        let src = ConfigSource::Config;

        if let Some(llm) = file.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider.parse()?;
                self.mark("llm.provider", src);
            }
            if let Some(fallback) = llm.fallback_provider {
                self.llm.fallback_provider = parse_optional_provider(&fallback, "llm.fallback_provider")?;
                self.mark("llm.fallback_provider", src);
            }
            if let Some(section) = llm.anthropic {
                self.apply_provider_section(ProviderKind::Anthropic, section);
            }
            if let Some(section) = llm.openrouter {
                self.apply_provider_section(ProviderKind::OpenRouter, section);
            }
        }

        if let Some(res) = file.resilience {
            if let Some(v) = res.timeout_secs {
                self.resilience.timeout_secs = v;
                self.mark("resilience.timeout_secs", src);
            }
            if let Some(v) = res.retry_attempts {
                self.resilience.retry_attempts = v;
                self.mark("resilience.retry_attempts", src);
            }
            if let Some(v) = res.backoff_base_ms {
                self.resilience.backoff_base_ms = v;
                self.mark("resilience.backoff_base_ms", src);
            }
            if let Some(v) = res.failure_threshold {
                self.resilience.failure_threshold = v;
                self.mark("resilience.failure_threshold", src);
            }
            if let Some(v) = res.cooldown_secs {
                self.resilience.cooldown_secs = v;
                self.mark("resilience.cooldown_secs", src);
            }
        }

        if let Some(exec) = file.executor {
            if let Some(v) = exec.mode {
                self.executor.mode = v;
                self.mark("executor.mode", src);
            }
            if let Some(v) = exec.batch_size {
                self.executor.batch_size = v;
                self.mark("executor.batch_size", src);
            }
            if let Some(v) = exec.inter_task_delay_ms {
                self.executor.inter_task_delay_ms = v;
                self.mark("executor.inter_task_delay_ms", src);
            }
        }

        if let Some(store) = file.store
            && let Some(path) = store.path
        {
            self.store.path = expand_home(path);
            self.mark("store.path", src);
        }

        Ok(())
    }

    fn apply_provider_section(&mut self, kind: ProviderKind, section: TomlProvider) {
        let prefix = format!("llm.{}", kind.as_str());
        let mut touched = Vec::new();
        {
            let settings = self.llm.settings_for_mut(kind);
            if let Some(v) = section.model {
                settings.model = v;
                touched.push("model");
            }
            if let Some(v) = section.api_key_env {
                settings.api_key_env = v;
                touched.push("api_key_env");
            }
            if let Some(v) = section.base_url {
                settings.base_url = v;
                touched.push("base_url");
            }
            if let Some(v) = section.max_tokens {
                settings.max_tokens = v;
                touched.push("max_tokens");
            }
        }
        for field in touched {
            self.mark(&format!("{prefix}.{field}"), ConfigSource::Config);
        }
    }

    fn apply_env<E>(&mut self, env: &E) -> Result<(), ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let src = ConfigSource::Env;
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = lookup(ENV_PROVIDER) {
            self.llm.provider = v.parse()?;
            self.mark("llm.provider", src);
        }
        if let Some(v) = lookup(ENV_FALLBACK_PROVIDER) {
            self.llm.fallback_provider = parse_optional_provider(&v, ENV_FALLBACK_PROVIDER)?;
            self.mark("llm.fallback_provider", src);
        }
        if let Some(v) = lookup(ENV_TIMEOUT_SECS) {
            self.resilience.timeout_secs = parse_number(ENV_TIMEOUT_SECS, &v)?;
            self.mark("resilience.timeout_secs", src);
        }
        if let Some(v) = lookup(ENV_MAX_CONCURRENT_TASKS) {
            self.executor.batch_size = parse_number(ENV_MAX_CONCURRENT_TASKS, &v)?;
            self.mark("executor.batch_size", src);
        }
        if let Some(v) = lookup(ENV_RETRY_ATTEMPTS) {
            self.resilience.retry_attempts = parse_number(ENV_RETRY_ATTEMPTS, &v)?;
            self.mark("resilience.retry_attempts", src);
        }
        Ok(())
    }

    fn apply_cli(&mut self, cli: &CliArgs) -> Result<(), ConfigError> {
        let src = ConfigSource::Cli;

        if let Some(v) = &cli.provider {
            self.llm.provider = v.parse()?;
            self.mark("llm.provider", src);
        }
        if let Some(v) = &cli.fallback_provider {
            self.llm.fallback_provider = parse_optional_provider(v, "--fallback-provider")?;
            self.mark("llm.fallback_provider", src);
        }
        if let Some(model) = &cli.model {
            let kind = self.llm.provider;
            self.llm.settings_for_mut(kind).model = model.clone();
            self.mark(&format!("llm.{}.model", kind.as_str()), src);
        }
        if let Some(v) = cli.timeout_secs {
            self.resilience.timeout_secs = v;
            self.mark("resilience.timeout_secs", src);
        }
        if let Some(v) = cli.retry_attempts {
            self.resilience.retry_attempts = v;
            self.mark("resilience.retry_attempts", src);
        }
        if let Some(v) = cli.batch_size {
            self.executor.batch_size = v;
            self.mark("executor.batch_size", src);
        }
        if let Some(v) = cli.mode {
            self.executor.mode = v;
            self.mark("executor.mode", src);
        }
        if let Some(v) = &cli.store_path {
            self.store.path = v.clone();
            self.mark("store.path", src);
        }
        Ok(())
    }
}

/// `"none"` or an empty string disables the fallback.
fn parse_optional_provider(value: &str, key: &str) -> Result<Option<ProviderKind>, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    trimmed
        .parse::<ProviderKind>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn expand_home(path: PathBuf) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map(|home| home.join(rest)).unwrap_or(path),
        Err(_) => path,
    }
}
