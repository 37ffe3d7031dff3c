use crate::error::{PipelineError, PipelineResult};
use crate::model::{TranslationDraft, TranslationRequestBatch, TranslationResult};
use crate::retry::{with_retry, BackoffPolicy, RetryConfig};
use crate::scoring::{QualityScorer, ScoringProfile};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// OpenAI Chat Completion request for one translation batch
#[derive(Debug, Serialize)]
struct TranslationRequest {
    model: String,
    messages: Vec<Message>,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Check if a model is a reasoning model that doesn't support temperature
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("gpt-5")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// English display name for a language code, used in prompts
pub fn language_name(code: &str) -> &str {
    match code.split(['-', '_']).next().unwrap_or(code) {
        "en" => "English",
        "ru" => "Russian",
        "uk" => "Ukrainian",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "pl" => "Polish",
        "tr" => "Turkish",
        "nl" => "Dutch",
        "zh" => "Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "ar" => "Arabic",
        _ => code,
    }
}

/// Build the system prompt for translating a batch of UI strings
fn build_translation_system_prompt(source_language: &str, target_language: &str) -> String {
    format!(
        r#"You are a professional localizer for a personal diary app. Translate the values of the JSON object you receive from {} to {}.

## Translation Rules

### DO NOT translate or alter:
- The JSON keys
- Placeholders such as {{name}}, {{{{count}}}}, %s, %d, %1$s and $variable
- HTML or markup tags and line breaks (\n)
- Emoji

### Formatting:
- Keep punctuation, capitalization style and leading/trailing whitespace consistent with the source
- Keep each value roughly the same length so it fits the same UI element

### Tone:
- Warm, personal and encouraging, like a trusted journal
- Use the informal form of address where the target language has one

### Output:
- Return ONLY a JSON object with exactly the same keys, each mapped to its translated string
- No comments, no markdown, no extra keys"#,
        source_language, target_language
    )
}

/// Build the user prompt carrying the key -> source text payload
fn build_translation_user_prompt(payload: &str, target_language: &str) -> String {
    format!(
        "Translate these app strings to {}:\n\n{}",
        target_language, payload
    )
}

/// Serialize the batch as a flat key -> source text JSON object
fn build_payload(batch: &TranslationRequestBatch, source_texts: &HashMap<String, String>) -> String {
    let mut payload = serde_json::Map::new();
    for key in batch.keys() {
        let text = source_texts.get(key).cloned().unwrap_or_default();
        payload.insert(key.clone(), serde_json::Value::String(text));
    }
    serde_json::Value::Object(payload).to_string()
}

fn original_text<'a>(source_texts: &'a HashMap<String, String>, key: &str) -> &'a str {
    source_texts.get(key).map(String::as_str).unwrap_or_default()
}

/// Parse the model output as a flat key -> translated string mapping.
///
/// Tolerates the object being wrapped in a markdown code fence.
pub fn parse_translation_map(content: &str) -> PipelineResult<HashMap<String, String>> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(unfenced)
        .map_err(|e| PipelineError::Parse(format!("translation output is not a flat string map: {}", e)))
}

/// Settings for the generation service
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub api_url: String,
    pub model: String,
    pub max_completion_tokens: u32,
}

impl GatewaySettings {
    pub fn new(api_url: &str, model: &str) -> Self {
        Self {
            api_url: api_url.to_string(),
            model: model.to_string(),
            max_completion_tokens: 4000,
        }
    }
}

/// Results for one batch, one per requested key
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub results: Vec<TranslationResult>,
    /// Every attempt failed and the results are fallbacks
    pub degraded: bool,
}

/// Translates one batch at a time against the generation service
pub struct TranslationGateway {
    client: reqwest::Client,
    settings: GatewaySettings,
    api_key: String,
    backoff: Box<dyn BackoffPolicy + Send + Sync>,
    critical_keys: Vec<String>,
}

impl TranslationGateway {
    pub fn new(client: reqwest::Client, settings: GatewaySettings, api_key: impl Into<String>) -> Self {
        Self {
            client,
            settings,
            api_key: api_key.into(),
            backoff: Box::new(RetryConfig::translation_batch()),
            critical_keys: crate::scoring::DEFAULT_CRITICAL_KEYS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }

    pub fn with_backoff(mut self, backoff: impl BackoffPolicy + Send + Sync + 'static) -> Self {
        self.backoff = Box::new(backoff);
        self
    }

    pub fn with_critical_keys(mut self, critical_keys: Vec<String>) -> Self {
        self.critical_keys = critical_keys;
        self
    }

    fn build_request(&self, source_language: &str, target_language: &str, payload: &str) -> TranslationRequest {
        // Reasoning models need higher token limits and don't support temperature
        let is_reasoning = is_reasoning_model(&self.settings.model);
        let source_name = language_name(source_language);
        let target_name = language_name(target_language);

        TranslationRequest {
            model: self.settings.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: build_translation_system_prompt(source_name, target_name),
                },
                Message {
                    role: "user".to_string(),
                    content: build_translation_user_prompt(payload, target_name),
                },
            ],
            max_completion_tokens: if is_reasoning {
                16000
            } else {
                self.settings.max_completion_tokens
            },
            temperature: if is_reasoning { None } else { Some(0.3) },
            reasoning_effort: if is_reasoning {
                Some("low".to_string())
            } else {
                None
            },
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }

    async fn request_translations(
        &self,
        request: &TranslationRequest,
    ) -> PipelineResult<HashMap<String, String>> {
        let response = self
            .client
            .post(&self.settings.api_url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| PipelineError::Transport(format!("failed to reach generation service: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(PipelineError::Transport(format!(
                "generation service error ({}): {}",
                status, body
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Parse(format!("invalid generation response: {}", e)))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| PipelineError::Parse("generation response contained no choices".to_string()))?;

        parse_translation_map(&content)
    }

    /// Translate every key of `batch`. Never fails: once retries are
    /// exhausted each key gets a degraded fallback result.
    pub async fn translate_batch(
        &self,
        source_language: &str,
        target_language: &str,
        batch: &TranslationRequestBatch,
        source_texts: &HashMap<String, String>,
    ) -> BatchOutcome {
        let payload = build_payload(batch, source_texts);
        let request = self.build_request(source_language, target_language, &payload);
        let operation_name = format!("Translate {} keys to {}", batch.len(), target_language);

        match with_retry(self.backoff.as_ref(), &operation_name, || {
            self.request_translations(&request)
        })
        .await
        {
            Ok(mut translations) => {
                let scorer = QualityScorer::new(
                    ScoringProfile::for_language(target_language),
                    &self.critical_keys,
                );

                let results: Vec<TranslationResult> = batch
                    .keys()
                    .iter()
                    .map(|key| {
                        let translated_text = translations.remove(key).unwrap_or_else(|| {
                            warn!("Generation service omitted key '{}' for {}", key, target_language);
                            key.clone()
                        });
                        scorer.score_draft(TranslationDraft {
                            key: key.clone(),
                            original_text: original_text(source_texts, key).to_string(),
                            translated_text,
                        })
                    })
                    .collect();

                if !translations.is_empty() {
                    debug!(
                        "Dropped {} unrequested keys from {} response",
                        translations.len(),
                        target_language
                    );
                }

                BatchOutcome {
                    results,
                    degraded: false,
                }
            }
            Err(last_error) => {
                let exhausted = PipelineError::ExhaustedRetries {
                    attempts: self.backoff.max_attempts().max(1),
                    last_error: last_error.to_string(),
                };
                warn!(
                    "{}: {}; using fallback results for {} keys",
                    operation_name,
                    exhausted,
                    batch.len()
                );

                BatchOutcome {
                    results: batch
                        .keys()
                        .iter()
                        .map(|key| TranslationResult::fallback(key, original_text(source_texts, key)))
                        .collect(),
                    degraded: true,
                }
            }
        }
    }
}
