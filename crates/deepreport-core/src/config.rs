use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::DeepReportError;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const CONFIG_PATH_ENV: &str = "DEEPREPORT_CONFIG";

/// A secret resolved from the environment. Never printed in full.
#[derive(Clone)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

/// Read a required secret from the environment.
pub fn require_env(name: &str) -> Result<SecretValue, DeepReportError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(SecretValue(value)),
        _ => Err(DeepReportError::MissingSecret(name.to_string())),
    }
}

/// Top-level configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Resolve the configured LLM secret value (from environment only).
    pub fn llm_api_key(&self) -> Result<SecretValue, DeepReportError> {
        require_env(&self.llm.api_key_env)
    }
}

/// Helper to load configuration with best-practice guard rails.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument.
    /// 2. `DEEPREPORT_CONFIG` environment variable.
    /// 3. `config.toml` in the current working directory.
    pub fn load(path: Option<PathBuf>) -> Result<Config, DeepReportError> {
        let candidate = resolve_path(path);
        let raw = fs::read_to_string(&candidate)
            .map_err(|err| DeepReportError::config_io(candidate.clone(), err))?;
        let config: Config = toml::from_str(&raw)
            .map_err(|err| DeepReportError::InvalidConfiguration(err.to_string()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &Config) -> Result<(), DeepReportError> {
        if config.llm.api_key_env.trim().is_empty() {
            return Err(DeepReportError::InvalidConfiguration(
                "llm.api_key_env must reference an environment variable".into(),
            ));
        }
        if config.planner.initial_questions == 0 {
            return Err(DeepReportError::InvalidConfiguration(
                "planner.initial_questions must be at least 1".into(),
            ));
        }

        // Ensure the environment variable exists at load time to discourage
        // inline secrets.
        require_env(&config.llm.api_key_env)?;
        Ok(())
    }
}

fn resolve_path(path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = path {
        return path;
    }

    if let Ok(from_env) = env::var(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return PathBuf::from(from_env);
        }
    }

    Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key_env: String,
    #[serde(default = "LlmConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "LlmConfig::default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "LlmConfig::default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "LlmConfig::default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl LlmConfig {
    const fn default_timeout_secs() -> u64 {
        120
    }

    const fn default_max_retries() -> usize {
        2
    }

    const fn default_initial_backoff_ms() -> u64 {
        1_000
    }

    const fn default_max_backoff_ms() -> u64 {
        30_000
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    pub url: String,
    #[serde(default = "RetrievalConfig::default_mode")]
    pub mode: String,
    #[serde(default = "RetrievalConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RetrievalConfig {
    fn default_mode() -> String {
        "hybrid".to_string()
    }

    const fn default_timeout_secs() -> u64 {
        300
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "PlannerConfig::default_initial_questions")]
    pub initial_questions: usize,
    #[serde(default = "PlannerConfig::default_max_additional_questions")]
    pub max_additional_questions: usize,
}

impl PlannerConfig {
    const fn default_initial_questions() -> usize {
        5
    }

    const fn default_max_additional_questions() -> usize {
        2
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            initial_questions: Self::default_initial_questions(),
            max_additional_questions: Self::default_max_additional_questions(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [llm]
        base_url = "http://localhost:8000/v1"
        model = "qwen3-235b-a22b-instruct-2507"
        api_key_env = "DEEPREPORT_LLM_KEY"

        [retrieval]
        url = "http://localhost:9621/receive_string"
    "#;

    #[test]
    fn parses_config_with_defaults() {
        let config: Config = toml::from_str(SAMPLE).expect("sample config parses");
        assert_eq!(config.retrieval.mode, "hybrid");
        assert_eq!(config.planner.initial_questions, 5);
        assert_eq!(config.planner.max_additional_questions, 2);
        assert_eq!(config.llm.max_retries, 2);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn missing_secret_is_reported() {
        let err = require_env("DEEPREPORT_TEST_UNSET_VAR").unwrap_err();
        assert!(matches!(err, DeepReportError::MissingSecret(_)));
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = SecretValue("sk-very-secret".to_string());
        assert_eq!(format!("{secret:?}"), "SecretValue(***)");
    }
}
