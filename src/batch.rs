//! Splits missing keys into bounded request batches.

use crate::error::{PipelineError, PipelineResult};
use crate::model::{TranslationKey, TranslationRequestBatch};

/// Partition `keys` into contiguous batches of at most `batch_size` keys.
///
/// Empty input yields no batches. A `batch_size` of zero is a configuration error.
pub fn plan(keys: &[TranslationKey], batch_size: usize) -> PipelineResult<Vec<TranslationRequestBatch>> {
    if batch_size == 0 {
        return Err(PipelineError::configuration("batch size must be at least 1"));
    }

    Ok(keys
        .chunks(batch_size)
        .filter_map(|chunk| TranslationRequestBatch::new(chunk.to_vec()))
        .collect())
}
