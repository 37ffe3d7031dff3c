use crate::error::{PipelineError, PipelineResult};
use crate::retry::RetryConfig;
use crate::scoring::DEFAULT_CRITICAL_KEYS;
use anyhow::{Context, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2000;

#[derive(Debug, Clone)]
pub struct Config {
    // Generation service (OpenAI-compatible)
    pub openai_api_key: Option<String>,
    pub openai_api_url: String,
    pub openai_models_url: String,
    /// Unset means the availability probe picks the model tier
    pub openai_model: Option<String>,

    // Key/coverage store, required only by commands that touch it
    pub store_url: Option<String>,
    pub store_token: Option<String>,

    // Run parameters
    pub source_language: String,
    pub target_languages: Vec<String>,
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub critical_keys: Option<Vec<String>>,

    // Admin HTTP surface
    pub api_key: Option<String>,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            openai_api_key: optional_env("OPENAI_API_KEY"),
            openai_api_url: std::env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),
            openai_models_url: std::env::var("OPENAI_MODELS_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/models".to_string()),
            openai_model: optional_env("OPENAI_MODEL"),

            store_url: optional_env("STORE_URL"),
            store_token: optional_env("STORE_TOKEN"),

            source_language: std::env::var("SOURCE_LANGUAGE").unwrap_or_else(|_| "ru".to_string()),
            target_languages: optional_env("TARGET_LANGUAGES")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            batch_size: env_or("TRANSLATION_BATCH_SIZE", DEFAULT_BATCH_SIZE),
            max_retries: env_or("TRANSLATION_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            retry_delay_ms: env_or("TRANSLATION_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS),
            critical_keys: optional_env("CRITICAL_KEYS").map(|v| parse_list(&v)),

            api_key: optional_env("API_KEY"),
            port: env_or("PORT", 8080),
        })
    }

    pub fn store_url(&self) -> Result<&str> {
        self.store_url.as_deref().context("STORE_URL not set")
    }

    /// Credentials for one run. Missing values surface as a configuration
    /// error when the run starts, not here.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.openai_api_key.clone().unwrap_or_default(),
            self.store_token.clone().unwrap_or_default(),
        )
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        let delay = Duration::from_millis(self.retry_delay_ms);
        PipelineSettings {
            batch_size: self.batch_size,
            retry: RetryConfig::new(self.max_retries, delay),
            inter_batch_delay: delay,
            critical_keys: self
                .critical_keys
                .clone()
                .unwrap_or_else(default_critical_keys),
        }
    }
}

/// Secrets a run needs, passed explicitly instead of read from ambient state.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub generation_api_key: String,
    pub store_token: String,
}

impl Credentials {
    pub fn new(generation_api_key: impl Into<String>, store_token: impl Into<String>) -> Self {
        Self {
            generation_api_key: generation_api_key.into(),
            store_token: store_token.into(),
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.generation_api_key.trim().is_empty() {
            return Err(PipelineError::configuration("generation API key is missing"));
        }
        if self.store_token.trim().is_empty() {
            return Err(PipelineError::configuration("store write token is missing"));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("generation_api_key", &"<redacted>")
            .field("store_token", &"<redacted>")
            .finish()
    }
}

/// Tunables for one orchestration run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub batch_size: usize,
    /// Attempts and delay for one batch against the generation service
    pub retry: RetryConfig,
    /// Courtesy pause between consecutive batches
    pub inter_batch_delay: Duration,
    pub critical_keys: Vec<String>,
}

impl PipelineSettings {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.batch_size == 0 {
            return Err(PipelineError::configuration("batch size must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(PipelineError::configuration("max retries must be at least 1"));
        }
        Ok(())
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryConfig::translation_batch(),
            inter_batch_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            critical_keys: default_critical_keys(),
        }
    }
}

fn default_critical_keys() -> Vec<String> {
    DEFAULT_CRITICAL_KEYS.iter().map(|k| k.to_string()).collect()
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Split a comma-separated list, dropping blanks.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> Config {
        Config {
            openai_api_key: Some("test-openai-key".to_string()),
            openai_api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            openai_models_url: "https://api.openai.com/v1/models".to_string(),
            openai_model: None,
            store_url: Some("https://store.example.com".to_string()),
            store_token: Some("store-token".to_string()),
            source_language: "ru".to_string(),
            target_languages: vec!["en".to_string(), "fr".to_string()],
            batch_size: 20,
            max_retries: 3,
            retry_delay_ms: 2000,
            critical_keys: None,
            api_key: None,
            port: 8080,
        }
    }

    #[test]
    fn test_store_url_required_only_when_used() {
        let mut config = create_test_config();
        assert_eq!(config.store_url().unwrap(), "https://store.example.com");

        config.store_url = None;
        let err = config.store_url().unwrap_err();
        assert!(err.to_string().contains("STORE_URL"));
        // Settings that don't involve the store are still available
        assert_eq!(config.pipeline_settings().batch_size, 20);
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list("en, fr,,de "), vec!["en", "fr", "de"]);
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_pipeline_settings_from_config() {
        let settings = create_test_config().pipeline_settings();
        assert_eq!(settings.batch_size, 20);
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.initial_delay, Duration::from_secs(2));
        assert_eq!(settings.inter_batch_delay, Duration::from_secs(2));
        assert!(settings.critical_keys.contains(&"app_title".to_string()));
    }

    #[test]
    fn test_custom_critical_keys() {
        let mut config = create_test_config();
        config.critical_keys = Some(vec!["paywall_title".to_string()]);
        assert_eq!(config.pipeline_settings().critical_keys, vec!["paywall_title"]);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let mut config = create_test_config();
        config.batch_size = 0;
        let err = config.pipeline_settings().validate().unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_zero_retries_is_rejected() {
        let mut config = create_test_config();
        config.max_retries = 0;
        assert!(config.pipeline_settings().validate().is_err());
    }

    #[test]
    fn test_missing_credentials_are_rejected() {
        let mut config = create_test_config();
        assert!(config.credentials().validate().is_ok());

        config.store_token = None;
        let err = config.credentials().validate().unwrap_err();
        assert!(err.to_string().contains("store write token"));

        assert!(Credentials::new("", "token").validate().is_err());
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = Credentials::new("sk-secret", "store-secret");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("store-secret"));
    }
}
