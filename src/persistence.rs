//! Idempotent writes of scored results into the coverage store.

use crate::error::PipelineResult;
use crate::model::{CoverageEntry, TranslationResult};
use crate::store::TranslationStore;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// One write lock per target language, shared by every run of an orchestrator.
#[derive(Debug, Clone, Default)]
pub struct LanguageLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl LanguageLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn for_language(&self, language: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(language.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Upserts results for one language at a time, holding that language's lock.
pub struct PersistenceWriter {
    store: Arc<dyn TranslationStore>,
    token: String,
    locks: LanguageLocks,
}

impl PersistenceWriter {
    pub fn new(store: Arc<dyn TranslationStore>, token: impl Into<String>, locks: LanguageLocks) -> Self {
        Self {
            store,
            token: token.into(),
            locks,
        }
    }

    /// Replace the stored text of every result's key. Only the text is stored;
    /// confidence is always recomputed from it.
    pub async fn save(&self, language: &str, results: &[TranslationResult]) -> PipelineResult<()> {
        if results.is_empty() {
            debug!("No results to persist for {}", language);
            return Ok(());
        }

        let now = Utc::now();
        let entries: Vec<CoverageEntry> = results
            .iter()
            .map(|r| CoverageEntry {
                key: r.key.clone(),
                text: r.translated_text.clone(),
                updated_at: Some(now),
            })
            .collect();

        let lock = self.locks.for_language(language).await;
        let _guard = lock.lock().await;

        self.store.upsert(language, &entries, &self.token).await?;
        info!("Persisted {} translations for {}", entries.len(), language);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::store::MemoryStore;

    fn result(key: &str, text: &str) -> TranslationResult {
        TranslationResult {
            key: key.to_string(),
            original_text: format!("source {}", key),
            translated_text: text.to_string(),
            confidence: 0.9,
            needs_review: false,
        }
    }

    fn texts(entries: &[CoverageEntry]) -> Vec<(String, String)> {
        entries.iter().map(|e| (e.key.clone(), e.text.clone())).collect()
    }

    #[tokio::test]
    async fn test_save_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let writer = PersistenceWriter::new(store.clone(), "token", LanguageLocks::new());
        let results = vec![result("a", "Bonjour"), result("b", "Merci")];

        writer.save("fr", &results).await.unwrap();
        let once = texts(&store.snapshot("fr").await);

        writer.save("fr", &results).await.unwrap();
        let twice = texts(&store.snapshot("fr").await);

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 2);
    }

    #[tokio::test]
    async fn test_save_replaces_existing_entry() {
        let store = Arc::new(
            MemoryStore::new().with_coverage("fr", vec![CoverageEntry::new("a", "Salut")]),
        );
        let writer = PersistenceWriter::new(store.clone(), "token", LanguageLocks::new());

        writer.save("fr", &[result("a", "Bonjour")]).await.unwrap();

        let stored = store.snapshot("fr").await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text, "Bonjour");
        assert!(stored[0].updated_at.is_some());
    }

    #[tokio::test]
    async fn test_save_empty_results_skips_store() {
        let store = Arc::new(MemoryStore::new());
        let writer = PersistenceWriter::new(store.clone(), "token", LanguageLocks::new());

        writer.save("en", &[]).await.unwrap();
        assert_eq!(store.write_count("en").await, 0);
    }

    #[tokio::test]
    async fn test_save_surfaces_persistence_error() {
        let store = Arc::new(MemoryStore::new().failing_writes_for("de"));
        let writer = PersistenceWriter::new(store, "token", LanguageLocks::new());

        let err = writer.save("de", &[result("a", "Hallo")]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Persistence { .. }));
    }

    #[tokio::test]
    async fn test_language_locks_are_shared_per_language() {
        let locks = LanguageLocks::new();
        let fr_a = locks.for_language("fr").await;
        let fr_b = locks.for_language("fr").await;
        let de = locks.for_language("de").await;

        assert!(Arc::ptr_eq(&fr_a, &fr_b));
        assert!(!Arc::ptr_eq(&fr_a, &de));

        let _held = fr_a.lock().await;
        assert!(fr_b.try_lock().is_err());
        assert!(de.try_lock().is_ok());
    }
}
