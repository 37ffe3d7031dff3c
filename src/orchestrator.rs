//! Drives a translation run: for each target language, gap analysis, batch
//! planning, translation and scoring per batch, then one idempotent write.
//!
//! Languages and batches are processed sequentially. Only configuration
//! problems abort a run; everything else degrades the affected language.

use crate::batch::plan;
use crate::config::{Credentials, PipelineSettings};
use crate::error::PipelineResult;
use crate::gaps::missing_keys;
use crate::gateway::{GatewaySettings, TranslationGateway};
use crate::model::{LanguageRunReport, RunReport, SourceEntry, TranslationResult};
use crate::persistence::{LanguageLocks, PersistenceWriter};
use crate::store::TranslationStore;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Where a run currently is, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    AnalyzingGaps,
    PlanningBatches,
    Translating { batch: usize, total: usize },
    Scoring,
    Persisting,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AnalyzingGaps => write!(f, "analyzing gaps"),
            Self::PlanningBatches => write!(f, "planning batches"),
            Self::Translating { batch, total } => write!(f, "translating {}/{}", batch, total),
            Self::Scoring => write!(f, "scoring"),
            Self::Persisting => write!(f, "persisting"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Spaces out consecutive calls to the generation service across a run.
struct Pacer {
    delay: Duration,
    called: bool,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        Self { delay, called: false }
    }

    async fn wait_turn(&mut self) {
        if self.called && !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.called = true;
    }
}

pub struct TranslationOrchestrator {
    client: reqwest::Client,
    store: Arc<dyn TranslationStore>,
    gateway_settings: GatewaySettings,
    settings: PipelineSettings,
    locks: LanguageLocks,
}

impl TranslationOrchestrator {
    pub fn new(
        client: reqwest::Client,
        store: Arc<dyn TranslationStore>,
        gateway_settings: GatewaySettings,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            client,
            store,
            gateway_settings,
            settings,
            locks: LanguageLocks::new(),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn store(&self) -> Arc<dyn TranslationStore> {
        Arc::clone(&self.store)
    }

    /// Translate every key missing from each target language.
    ///
    /// Fails only on configuration errors. Degraded batches and failed writes
    /// are reported per language in the returned report.
    pub async fn translate_missing_keys(
        &self,
        source_language: &str,
        target_languages: &[String],
        credentials: &Credentials,
    ) -> PipelineResult<RunReport> {
        self.settings.validate()?;
        credentials.validate()?;

        let gateway = TranslationGateway::new(
            self.client.clone(),
            self.gateway_settings.clone(),
            credentials.generation_api_key.clone(),
        )
        .with_backoff(self.settings.retry.clone())
        .with_critical_keys(self.settings.critical_keys.clone());
        let writer = PersistenceWriter::new(
            Arc::clone(&self.store),
            credentials.store_token.clone(),
            self.locks.clone(),
        );

        let targets = dedup_targets(source_language, target_languages);
        let mut report = RunReport::default();

        info!(
            "Starting translation run from {} to {:?} ({} phase)",
            source_language,
            targets,
            RunPhase::Idle
        );

        let catalog = match self.store.source_entries(source_language).await {
            Ok(catalog) => catalog,
            Err(e) => {
                error!("Failed to load {} key catalog: {}", source_language, e);
                for target in &targets {
                    let mut language_report = LanguageRunReport::new(target);
                    language_report.error = Some(format!("key catalog unavailable: {}", e));
                    report.insert(language_report);
                }
                return Ok(report);
            }
        };
        let source_texts = source_text_index(&catalog);
        info!("Loaded {} catalog keys in {}", source_texts.len(), source_language);

        let mut pacer = Pacer::new(self.settings.inter_batch_delay);

        for target in &targets {
            let language_report = self
                .translate_language(
                    &gateway,
                    &writer,
                    &mut pacer,
                    source_language,
                    target,
                    &catalog,
                    &source_texts,
                )
                .await?;
            report.insert(language_report);
        }

        info!(
            "Translation run finished: {} results across {} languages",
            report.total_results(),
            report.languages.len()
        );
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn translate_language(
        &self,
        gateway: &TranslationGateway,
        writer: &PersistenceWriter,
        pacer: &mut Pacer,
        source_language: &str,
        target: &str,
        catalog: &[SourceEntry],
        source_texts: &HashMap<String, String>,
    ) -> PipelineResult<LanguageRunReport> {
        let mut report = LanguageRunReport::new(target);

        debug!("{}: {}", target, RunPhase::AnalyzingGaps);
        let coverage = match self.store.coverage(target).await {
            Ok(coverage) => coverage,
            Err(e) => {
                error!("{}: failed to load existing translations: {}", target, e);
                report.error = Some(format!("coverage unavailable: {}", e));
                return Ok(report);
            }
        };
        let missing = missing_keys(catalog, &coverage);
        if missing.is_empty() {
            info!("{}: fully covered, nothing to translate", target);
            return Ok(report);
        }
        info!("{}: {} keys missing", target, missing.len());

        debug!("{}: {}", target, RunPhase::PlanningBatches);
        let batches = plan(&missing, self.settings.batch_size)?;
        let total = batches.len();
        report.batches = total;

        for (index, batch) in batches.iter().enumerate() {
            pacer.wait_turn().await;
            info!(
                "{}: {}",
                target,
                RunPhase::Translating {
                    batch: index + 1,
                    total
                }
            );

            let outcome = gateway
                .translate_batch(source_language, target, batch, source_texts)
                .await;
            if outcome.degraded {
                report.degraded_batches += 1;
            }

            let requested: Vec<TranslationResult> = outcome
                .results
                .into_iter()
                .filter(|result| batch.contains(&result.key))
                .collect();
            report.results.extend(requested);
        }

        debug!("{}: {}", target, RunPhase::Scoring);
        info!(
            "{}: {} translated, {} need review, average confidence {:.2}",
            target,
            report.results.len(),
            report.review_count(),
            report.average_confidence()
        );
        if report.degraded_batches > 0 {
            warn!(
                "{}: {}/{} batches fell back to placeholders",
                target, report.degraded_batches, total
            );
        }

        debug!("{}: {}", target, RunPhase::Persisting);
        if let Err(e) = writer.save(target, &report.results).await {
            error!("{}: {}", target, e);
            report.error = Some(e.to_string());
        }

        debug!("{}: {}", target, RunPhase::Done);
        Ok(report)
    }
}

/// Targets in request order, without duplicates or the source language itself.
pub(crate) fn dedup_targets(source_language: &str, target_languages: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    target_languages
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .filter(|t| {
            if *t == source_language {
                warn!("Skipping target {}: it is the source language", t);
                return false;
            }
            true
        })
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

/// key -> source text, first occurrence wins.
fn source_text_index(catalog: &[SourceEntry]) -> HashMap<String, String> {
    let mut index = HashMap::with_capacity(catalog.len());
    for entry in catalog {
        index
            .entry(entry.key.clone())
            .or_insert_with(|| entry.text.clone());
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::model::CoverageEntry;
    use crate::retry::RetryConfig;
    use crate::store::MemoryStore;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn test_settings(batch_size: usize) -> PipelineSettings {
        PipelineSettings {
            batch_size,
            retry: RetryConfig::new(3, Duration::from_millis(5)),
            inter_batch_delay: Duration::from_millis(1),
            ..PipelineSettings::default()
        }
    }

    fn openai_response(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    fn credentials() -> Credentials {
        Credentials::new("test-openai-key", "store-token")
    }

    fn orchestrator(store: Arc<MemoryStore>, api_url: &str, batch_size: usize) -> TranslationOrchestrator {
        TranslationOrchestrator::new(
            reqwest::Client::new(),
            store,
            GatewaySettings::new(api_url, "gpt-4o-mini"),
            test_settings(batch_size),
        )
    }

    fn catalog() -> Vec<SourceEntry> {
        vec![
            SourceEntry::new("hello", "Привет"),
            SourceEntry::new("save", "Сохранить"),
        ]
    }

    #[test]
    fn test_run_phase_display() {
        assert_eq!(RunPhase::Translating { batch: 2, total: 5 }.to_string(), "translating 2/5");
        assert_eq!(RunPhase::AnalyzingGaps.to_string(), "analyzing gaps");
    }

    #[test]
    fn test_dedup_targets() {
        let targets = vec![
            "fr".to_string(),
            "ru".to_string(),
            " fr".to_string(),
            "".to_string(),
            "de".to_string(),
        ];
        assert_eq!(dedup_targets("ru", &targets), vec!["fr", "de"]);
    }

    #[test]
    fn test_source_text_index_first_wins() {
        let index = source_text_index(&[
            SourceEntry::new("a", "first"),
            SourceEntry::new("a", "second"),
        ]);
        assert_eq!(index["a"], "first");
    }

    #[tokio::test]
    async fn test_only_uncovered_language_is_written() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_response(
                r#"{"hello": "Bonjour à tous", "save": "Enregistrer"}"#,
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = Arc::new(
            MemoryStore::new()
                .with_catalog("ru", catalog())
                .with_coverage(
                    "en",
                    vec![CoverageEntry::new("hello", "Hello"), CoverageEntry::new("save", "Save")],
                ),
        );
        let orchestrator = orchestrator(
            store.clone(),
            &format!("{}/v1/chat/completions", mock_server.uri()),
            10,
        );

        let report = orchestrator
            .translate_missing_keys("ru", &["en".to_string(), "fr".to_string()], &credentials())
            .await
            .expect("Run should succeed");

        let by_lang = report.results_by_language();
        assert!(by_lang["en"].is_empty());
        assert_eq!(by_lang["fr"].len(), 2);
        assert_eq!(store.write_count("en").await, 0);
        assert_eq!(store.write_count("fr").await, 1);
        assert_eq!(store.snapshot("fr").await.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_batch_degrades_without_stopping_run() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let store = Arc::new(MemoryStore::new().with_catalog("ru", catalog()));
        let orchestrator = orchestrator(
            store.clone(),
            &format!("{}/v1/chat/completions", mock_server.uri()),
            1,
        );

        let report = orchestrator
            .translate_missing_keys("ru", &["de".to_string()], &credentials())
            .await
            .unwrap();

        let de = report.get("de").unwrap();
        assert_eq!(de.batches, 2);
        assert_eq!(de.degraded_batches, 2);
        assert_eq!(de.results.len(), 2);
        assert!(de.results.iter().all(|r| r.confidence == 0.0 && r.needs_review));
        // Placeholders are still stored so reviewers can find them
        assert_eq!(store.snapshot("de").await[0].text, "hello");
    }

    #[tokio::test]
    async fn test_persistence_failure_is_reported_per_language() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_response(
                r#"{"hello": "Hallo zusammen", "save": "Speichern"}"#,
            )))
            .mount(&mock_server)
            .await;

        let store = Arc::new(
            MemoryStore::new()
                .with_catalog("ru", catalog())
                .failing_writes_for("de"),
        );
        let orchestrator = orchestrator(
            store.clone(),
            &format!("{}/v1/chat/completions", mock_server.uri()),
            10,
        );

        let report = orchestrator
            .translate_missing_keys("ru", &["de".to_string(), "fr".to_string()], &credentials())
            .await
            .unwrap();

        assert!(report.get("de").unwrap().error.is_some());
        assert!(!report.get("de").unwrap().is_persisted());
        assert!(report.get("fr").unwrap().is_persisted());
        assert_eq!(store.write_count("fr").await, 1);
    }

    #[tokio::test]
    async fn test_invalid_batch_size_aborts_before_work() {
        let store = Arc::new(MemoryStore::new().with_catalog("ru", catalog()));
        let orchestrator = orchestrator(store.clone(), "http://127.0.0.1:9/unused", 0);

        let err = orchestrator
            .translate_missing_keys("ru", &["fr".to_string()], &credentials())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Configuration(_)));
        assert_eq!(store.write_count("fr").await, 0);
    }

    #[tokio::test]
    async fn test_missing_credentials_abort_before_work() {
        let store = Arc::new(MemoryStore::new().with_catalog("ru", catalog()));
        let orchestrator = orchestrator(store, "http://127.0.0.1:9/unused", 10);

        let err = orchestrator
            .translate_missing_keys("ru", &["fr".to_string()], &Credentials::new("", "token"))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_results_only_for_requested_keys() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_response(
                r#"{"hello": "Ciao a tutti", "save": "Salva", "rogue": "Extra"}"#,
            )))
            .mount(&mock_server)
            .await;

        let store = Arc::new(MemoryStore::new().with_catalog("ru", catalog()));
        let orchestrator = orchestrator(
            store.clone(),
            &format!("{}/v1/chat/completions", mock_server.uri()),
            10,
        );

        let report = orchestrator
            .translate_missing_keys("ru", &["it".to_string()], &credentials())
            .await
            .unwrap();

        let keys: Vec<&str> = report.get("it").unwrap().results.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["hello", "save"]);
        assert!(store.snapshot("it").await.iter().all(|e| e.key != "rogue"));
    }
}
