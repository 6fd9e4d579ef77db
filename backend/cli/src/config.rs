use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use concierge_agent::ModelConfig;
use concierge_core::ConciergeError;

/// Concierge runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Key for the OpenAI-compatible endpoint
    pub api_key: Option<String>,
    /// Chat-completions base URL
    pub base_url: String,
    /// Registered provider used by every stage
    pub provider: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub history_window: usize,
    /// Route layer JSON consumed by the intent classifier
    pub layer_path: PathBuf,
    /// Product catalog JSON
    pub catalog_path: PathBuf,
    /// SQLite order database
    pub db_path: PathBuf,
    pub transcript_dir: PathBuf,
    /// New-intent log written by `concierge dev`
    pub intent_log_path: PathBuf,
    pub log_dir: Option<PathBuf>,
    /// Log level when `RUST_LOG` is unset
    pub log_level: String,
    /// Per-turn handler timeout; 0 disables it
    pub turn_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let model = ModelConfig::default();
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            provider: "openai".to_string(),
            model: model.model,
            max_tokens: model.max_tokens,
            temperature: model.temperature,
            history_window: model.history_window,
            layer_path: PathBuf::from("data/layer.json"),
            catalog_path: PathBuf::from("data/catalog.json"),
            db_path: PathBuf::from("data/orders.db"),
            transcript_dir: PathBuf::from("transcripts"),
            intent_log_path: PathBuf::from("data/new_intentions.json"),
            log_dir: None,
            log_level: "warn".to_string(),
            turn_timeout_secs: 120,
        }
    }
}

impl Config {
    /// Load configuration from `CONCIERGE_*` environment variables with defaults.
    pub fn from_env() -> Result<Self, ConciergeError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConciergeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            api_key: var("CONCIERGE_API_KEY").or_else(|| var("OPENAI_API_KEY")),
            base_url: var("CONCIERGE_BASE_URL").unwrap_or(defaults.base_url),
            provider: var("CONCIERGE_PROVIDER").unwrap_or(defaults.provider),
            model: var("CONCIERGE_MODEL").unwrap_or(defaults.model),
            max_tokens: parse(&var, "CONCIERGE_MAX_TOKENS", defaults.max_tokens)?,
            temperature: parse(&var, "CONCIERGE_TEMPERATURE", defaults.temperature)?,
            history_window: parse(&var, "CONCIERGE_HISTORY_WINDOW", defaults.history_window)?,
            layer_path: var("CONCIERGE_LAYER_PATH").map(PathBuf::from).unwrap_or(defaults.layer_path),
            catalog_path: var("CONCIERGE_CATALOG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.catalog_path),
            db_path: var("CONCIERGE_DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            transcript_dir: var("CONCIERGE_TRANSCRIPT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.transcript_dir),
            intent_log_path: var("CONCIERGE_INTENT_LOG")
                .map(PathBuf::from)
                .unwrap_or(defaults.intent_log_path),
            log_dir: var("CONCIERGE_LOG_DIR").map(PathBuf::from),
            log_level: var("CONCIERGE_LOG_LEVEL").unwrap_or(defaults.log_level),
            turn_timeout_secs: parse(&var, "CONCIERGE_TURN_TIMEOUT_SECS", defaults.turn_timeout_secs)?,
        })
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            history_window: self.history_window,
        }
    }

    pub fn turn_timeout(&self) -> Option<Duration> {
        (self.turn_timeout_secs > 0).then(|| Duration::from_secs(self.turn_timeout_secs))
    }

    /// The API key, or a configuration error naming the variable to set.
    pub fn require_api_key(&self) -> Result<&str, ConciergeError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ConciergeError::Config("CONCIERGE_API_KEY is not set".to_string()))
    }
}

fn parse<T, F>(var: &F, name: &str, default: T) -> Result<T, ConciergeError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConciergeError::Config(format!("{name}={raw:?}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConciergeError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = load(&[]).unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.db_path, PathBuf::from("data/orders.db"));
        assert_eq!(config.turn_timeout(), Some(Duration::from_secs(120)));
        assert!(config.api_key.is_none());
        assert!(matches!(config.require_api_key(), Err(ConciergeError::Config(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let config = load(&[
            ("OPENAI_API_KEY", "sk-fallback"),
            ("CONCIERGE_MODEL", "gpt-4o"),
            ("CONCIERGE_TURN_TIMEOUT_SECS", "0"),
            ("CONCIERGE_LOG_DIR", "/tmp/concierge-logs"),
            ("CONCIERGE_TEMPERATURE", "0.7"),
        ])
        .unwrap();
        assert_eq!(config.require_api_key().unwrap(), "sk-fallback");
        assert_eq!(config.model_config().model, "gpt-4o");
        assert_eq!(config.model_config().temperature, 0.7);
        assert_eq!(config.turn_timeout(), None);
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/concierge-logs")));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = load(&[("CONCIERGE_MODEL", "  "), ("CONCIERGE_API_KEY", "")]).unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_bad_number_is_config_error() {
        let err = load(&[("CONCIERGE_MAX_TOKENS", "lots")]).unwrap_err();
        assert!(matches!(err, ConciergeError::Config(ref msg) if msg.contains("CONCIERGE_MAX_TOKENS")));
        assert!(err.is_startup_fatal());
    }
}
