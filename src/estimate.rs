//! Rough cost/time projection shown before committing to a run.
//!
//! Key counts come from a live gap analysis against the store; cost and time
//! are a linear model, not a dry run against the generation service.

use crate::config::PipelineSettings;
use crate::error::PipelineResult;
use crate::gaps::missing_keys;
use crate::orchestrator::dedup_targets;
use crate::store::TranslationStore;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Approximate spend per translated key (prompt + completion tokens)
pub const COST_PER_KEY_USD: f64 = 0.0004;
/// Approximate wall time of one batch request
pub const SECONDS_PER_BATCH: f64 = 8.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    pub estimated_cost: f64,
    /// Seconds
    pub estimated_time: f64,
    pub key_count: usize,
    pub batch_count: usize,
    pub keys_by_language: BTreeMap<String, usize>,
    /// Targets whose existing translations could not be read; not counted
    pub unavailable_languages: Vec<String>,
}

pub async fn estimate_run(
    store: &dyn TranslationStore,
    source_language: &str,
    target_languages: &[String],
    settings: &PipelineSettings,
) -> PipelineResult<Estimate> {
    settings.validate()?;

    let catalog = store.source_entries(source_language).await?;
    let mut keys_by_language = BTreeMap::new();
    let mut unavailable_languages = Vec::new();
    let mut batch_count = 0;

    for target in dedup_targets(source_language, target_languages) {
        let coverage = match store.coverage(&target).await {
            Ok(coverage) => coverage,
            Err(e) => {
                warn!("{}: left out of estimate, coverage unavailable: {}", target, e);
                unavailable_languages.push(target);
                continue;
            }
        };
        let missing = missing_keys(&catalog, &coverage).len();
        batch_count += missing.div_ceil(settings.batch_size);
        keys_by_language.insert(target, missing);
    }

    let key_count: usize = keys_by_language.values().sum();
    let pauses = batch_count.saturating_sub(1) as f64 * settings.inter_batch_delay.as_secs_f64();

    Ok(Estimate {
        estimated_cost: key_count as f64 * COST_PER_KEY_USD,
        estimated_time: batch_count as f64 * SECONDS_PER_BATCH + pauses,
        key_count,
        batch_count,
        keys_by_language,
        unavailable_languages,
    })
}
