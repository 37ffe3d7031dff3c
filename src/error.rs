//! Error taxonomy for the translation pipeline.
//!
//! Only `Configuration` ever escapes `translate_missing_keys`. Transport and
//! parse failures are retried inside the gateway, exhausted retries become
//! degraded results, and persistence failures are reported per language.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid settings or missing credentials, detected before any work starts
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network failure or non-success status from an external service
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body was not the expected structured data
    #[error("parse error: {0}")]
    Parse(String),

    /// All attempts for one batch failed
    #[error("gave up after {attempts} attempts: {last_error}")]
    ExhaustedRetries { attempts: u32, last_error: String },

    /// Store write failed for one language
    #[error("failed to persist translations for '{language}': {message}")]
    Persistence { language: String, message: String },
}

impl PipelineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether another attempt at the same request could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Parse(_))
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_and_parse_are_retryable() {
        assert!(PipelineError::Transport("timeout".into()).is_retryable());
        assert!(PipelineError::Parse("not json".into()).is_retryable());
    }

    #[test]
    fn test_configuration_and_persistence_are_not_retryable() {
        assert!(!PipelineError::configuration("batch size 0").is_retryable());
        assert!(!PipelineError::Persistence {
            language: "fr".into(),
            message: "500".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = PipelineError::ExhaustedRetries {
            attempts: 3,
            last_error: "transport error: 503".into(),
        };
        assert_eq!(err.to_string(), "gave up after 3 attempts: transport error: 503");

        let err = PipelineError::Persistence {
            language: "de".into(),
            message: "store returned 500".into(),
        };
        assert!(err.to_string().contains("'de'"));
    }
}
