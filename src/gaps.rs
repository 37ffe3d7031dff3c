//! Gap analysis: which catalog keys a target language has not covered yet.

use crate::model::{CoverageEntry, SourceEntry, TranslationKey};
use std::collections::HashSet;

/// Keys present in `catalog` but absent from `coverage`, in catalog order.
///
/// Duplicate catalog keys are collapsed to their first occurrence.
pub fn missing_keys(catalog: &[SourceEntry], coverage: &[CoverageEntry]) -> Vec<TranslationKey> {
    let covered: HashSet<&str> = coverage.iter().map(|e| e.key.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::with_capacity(catalog.len());

    catalog
        .iter()
        .filter(|entry| seen.insert(entry.key.as_str()))
        .filter(|entry| !covered.contains(entry.key.as_str()))
        .map(|entry| entry.key.clone())
        .collect()
}
