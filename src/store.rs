//! Key catalog and per-language coverage store.
//!
//! The diary backend exposes the catalog and translations over REST:
//! `GET /keys?language=..`, `GET /translations/{language}` and
//! `PUT /translations/{language}`. Only writes carry a bearer token.

use crate::error::{PipelineError, PipelineResult};
use crate::model::{CoverageEntry, SourceEntry};
use crate::retry::{with_retry_if, RetryConfig};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

#[async_trait]
pub trait TranslationStore: Send + Sync {
    /// Every (key, text) pair of the catalog in `language`
    async fn source_entries(&self, language: &str) -> PipelineResult<Vec<SourceEntry>>;

    /// Every translated pair currently stored for `language`
    async fn coverage(&self, language: &str) -> PipelineResult<Vec<CoverageEntry>>;

    /// Replace the stored entry for each (language, key) in `entries`
    async fn upsert(
        &self,
        language: &str,
        entries: &[CoverageEntry],
        token: &str,
    ) -> PipelineResult<()>;
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    translations: &'a [CoverageEntry],
}

/// REST client for the diary backend's localization tables.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    read_retry: RetryConfig,
}

impl HttpStore {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            read_retry: RetryConfig::store_read(),
        }
    }

    pub fn with_read_retry(mut self, retry: RetryConfig) -> Self {
        self.read_retry = retry;
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> PipelineResult<T> {
        let response = self.client.get(url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(PipelineError::Transport(format!(
                "store returned {} for {}: {}",
                status, url, body
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PipelineError::Parse(format!("invalid store response from {}: {}", url, e)))
    }
}

#[async_trait]
impl TranslationStore for HttpStore {
    async fn source_entries(&self, language: &str) -> PipelineResult<Vec<SourceEntry>> {
        let url = format!("{}/keys", self.base_url);
        let query = [("language", language)];
        with_retry_if(
            &self.read_retry,
            "Fetch key catalog",
            || self.get_json(&url, &query),
            PipelineError::is_retryable,
        )
        .await
    }

    async fn coverage(&self, language: &str) -> PipelineResult<Vec<CoverageEntry>> {
        let url = format!("{}/translations/{}", self.base_url, language);
        let operation_name = format!("Fetch {} translations", language);
        with_retry_if(
            &self.read_retry,
            &operation_name,
            || self.get_json(&url, &[]),
            PipelineError::is_retryable,
        )
        .await
    }

    async fn upsert(
        &self,
        language: &str,
        entries: &[CoverageEntry],
        token: &str,
    ) -> PipelineResult<()> {
        let persistence_error = |message: String| PipelineError::Persistence {
            language: language.to_string(),
            message,
        };

        let response = self
            .client
            .put(format!("{}/translations/{}", self.base_url, language))
            .bearer_auth(token)
            .json(&UpsertRequest {
                translations: entries,
            })
            .send()
            .await
            .map_err(|e| persistence_error(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(persistence_error(format!("store returned {}: {}", status, body)));
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    catalogs: HashMap<String, Vec<SourceEntry>>,
    coverage: HashMap<String, BTreeMap<String, CoverageEntry>>,
    write_counts: HashMap<String, usize>,
    failing_languages: HashSet<String>,
}

/// In-process store for local runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(mut self, language: &str, entries: Vec<SourceEntry>) -> Self {
        self.state
            .get_mut()
            .catalogs
            .insert(language.to_string(), entries);
        self
    }

    pub fn with_coverage(mut self, language: &str, entries: Vec<CoverageEntry>) -> Self {
        let stored = self
            .state
            .get_mut()
            .coverage
            .entry(language.to_string())
            .or_default();
        for entry in entries {
            stored.insert(entry.key.clone(), entry);
        }
        self
    }

    /// Make every write for `language` fail with a persistence error.
    pub fn failing_writes_for(mut self, language: &str) -> Self {
        self.state
            .get_mut()
            .failing_languages
            .insert(language.to_string());
        self
    }

    /// Stored entries for `language`, ordered by key.
    pub async fn snapshot(&self, language: &str) -> Vec<CoverageEntry> {
        self.state
            .read()
            .await
            .coverage
            .get(language)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of successful `upsert` calls for `language`.
    pub async fn write_count(&self, language: &str) -> usize {
        self.state
            .read()
            .await
            .write_counts
            .get(language)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl TranslationStore for MemoryStore {
    async fn source_entries(&self, language: &str) -> PipelineResult<Vec<SourceEntry>> {
        Ok(self
            .state
            .read()
            .await
            .catalogs
            .get(language)
            .cloned()
            .unwrap_or_default())
    }

    async fn coverage(&self, language: &str) -> PipelineResult<Vec<CoverageEntry>> {
        Ok(self.snapshot(language).await)
    }

    async fn upsert(
        &self,
        language: &str,
        entries: &[CoverageEntry],
        token: &str,
    ) -> PipelineResult<()> {
        let mut state = self.state.write().await;

        if token.is_empty() || state.failing_languages.contains(language) {
            return Err(PipelineError::Persistence {
                language: language.to_string(),
                message: "write rejected".to_string(),
            });
        }

        let stored = state.coverage.entry(language.to_string()).or_default();
        for entry in entries {
            stored.insert(entry.key.clone(), entry.clone());
        }
        *state.write_counts.entry(language.to_string()).or_default() += 1;

        Ok(())
    }
}
