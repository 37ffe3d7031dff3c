//! Data model shared by every stage of a translation run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque localization key, stable across languages.
pub type TranslationKey = String;

/// Minimum confidence for a result to be published without a human pass.
pub const PUBLISH_THRESHOLD: f64 = 0.5;

/// A catalog entry in the source language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub key: TranslationKey,
    #[serde(rename = "value")]
    pub text: String,
}

impl SourceEntry {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
        }
    }
}

/// A translated pair stored for one target language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageEntry {
    pub key: TranslationKey,
    #[serde(rename = "value")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CoverageEntry {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
            updated_at: None,
        }
    }
}

/// Ordered, non-empty group of keys sent to the generation service in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequestBatch {
    keys: Vec<TranslationKey>,
}

impl TranslationRequestBatch {
    /// Returns `None` for an empty key list.
    pub fn new(keys: Vec<TranslationKey>) -> Option<Self> {
        if keys.is_empty() {
            None
        } else {
            Some(Self { keys })
        }
    }

    pub fn keys(&self) -> &[TranslationKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn into_keys(self) -> Vec<TranslationKey> {
        self.keys
    }
}

/// Unscored gateway output for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationDraft {
    pub key: TranslationKey,
    pub original_text: String,
    pub translated_text: String,
}

/// A translated entry with its trust score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub key: TranslationKey,
    pub original_text: String,
    pub translated_text: String,
    pub confidence: f64,
    pub needs_review: bool,
}

impl TranslationResult {
    /// Degraded placeholder used when the service never produced an answer.
    pub fn fallback(key: &str, original_text: &str) -> Self {
        Self {
            key: key.to_string(),
            original_text: original_text.to_string(),
            translated_text: key.to_string(),
            confidence: 0.0,
            needs_review: true,
        }
    }

    pub fn is_ready_to_publish(&self) -> bool {
        !self.needs_review && self.confidence >= PUBLISH_THRESHOLD
    }
}

/// Outcome of one target language within a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LanguageRunReport {
    pub language: String,
    pub results: Vec<TranslationResult>,
    pub batches: usize,
    pub degraded_batches: usize,
    /// Why this language's results were not stored, if they were not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LanguageRunReport {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            ..Default::default()
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.error.is_none()
    }

    pub fn review_count(&self) -> usize {
        self.results.iter().filter(|r| r.needs_review).count()
    }

    pub fn average_confidence(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.results.iter().map(|r| r.confidence).sum::<f64>() / self.results.len() as f64
    }
}

/// Aggregate of every language processed by one orchestration run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub languages: BTreeMap<String, LanguageRunReport>,
}

impl RunReport {
    pub fn insert(&mut self, report: LanguageRunReport) {
        self.languages.insert(report.language.clone(), report);
    }

    pub fn get(&self, language: &str) -> Option<&LanguageRunReport> {
        self.languages.get(language)
    }

    /// The `{language: results}` view handed to callers.
    pub fn results_by_language(&self) -> BTreeMap<String, Vec<TranslationResult>> {
        self.languages
            .iter()
            .map(|(lang, report)| (lang.clone(), report.results.clone()))
            .collect()
    }

    pub fn total_results(&self) -> usize {
        self.languages.values().map(|r| r.results.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_batch_is_rejected() {
        assert!(TranslationRequestBatch::new(vec![]).is_none());
    }

    #[test]
    fn test_batch_preserves_order() {
        let batch = TranslationRequestBatch::new(vec!["b".into(), "a".into()]).unwrap();
        assert_eq!(batch.keys(), &["b".to_string(), "a".to_string()]);
        assert!(batch.contains("a"));
        assert!(!batch.contains("c"));
    }

    #[test]
    fn test_fallback_result_is_degraded() {
        let result = TranslationResult::fallback("welcome_title", "Добро пожаловать");
        assert_eq!(result.translated_text, "welcome_title");
        assert_eq!(result.confidence, 0.0);
        assert!(result.needs_review);
        assert!(!result.is_ready_to_publish());
    }

    #[test]
    fn test_ready_to_publish_requires_confidence() {
        let mut result = TranslationResult {
            key: "k".into(),
            original_text: "Привет".into(),
            translated_text: "Hello there".into(),
            confidence: 0.9,
            needs_review: false,
        };
        assert!(result.is_ready_to_publish());

        result.confidence = 0.1;
        assert!(!result.is_ready_to_publish());
    }

    #[test]
    fn test_source_entry_wire_format() {
        let entry: SourceEntry =
            serde_json::from_str(r#"{"key": "hello", "value": "Привет"}"#).unwrap();
        assert_eq!(entry, SourceEntry::new("hello", "Привет"));
    }

    #[test]
    fn test_coverage_entry_without_timestamp() {
        let entry: CoverageEntry =
            serde_json::from_str(r#"{"key": "hello", "value": "Hello"}"#).unwrap();
        assert!(entry.updated_at.is_none());

        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("updated_at"));
    }

    #[test]
    fn test_run_report_results_by_language() {
        let mut report = RunReport::default();
        report.insert(LanguageRunReport::new("en"));
        let mut fr = LanguageRunReport::new("fr");
        fr.results.push(TranslationResult::fallback("x", "икс"));
        report.insert(fr);

        let by_lang = report.results_by_language();
        assert_eq!(by_lang["en"].len(), 0);
        assert_eq!(by_lang["fr"].len(), 1);
        assert_eq!(report.total_results(), 1);
    }

    #[test]
    fn test_language_report_statistics() {
        let mut report = LanguageRunReport::new("de");
        assert_eq!(report.average_confidence(), 0.0);

        report.results.push(TranslationResult::fallback("a", "а"));
        report.results.push(TranslationResult {
            key: "b".into(),
            original_text: "б".into(),
            translated_text: "Hallo Welt".into(),
            confidence: 1.0,
            needs_review: false,
        });
        assert_eq!(report.review_count(), 1);
        assert!((report.average_confidence() - 0.5).abs() < f64::EPSILON);
    }
}
