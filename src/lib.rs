//! Automatic translation of the diary app's localization catalog.
//!
//! A run discovers which keys each target language is missing, sends them in
//! bounded batches to an LLM, scores every answer for trustworthiness, flags
//! risky entries for human review and upserts the results into the store.
//!
//! ```rust,ignore
//! let orchestrator = TranslationOrchestrator::new(client, store, gateway_settings, settings);
//! let report = orchestrator
//!     .translate_missing_keys("ru", &["en".into(), "fr".into()], &credentials)
//!     .await?;
//! for (language, results) in report.results_by_language() { /* ... */ }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod estimate;
pub mod gaps;
pub mod gateway;
pub mod model;
pub mod orchestrator;
pub mod persistence;
pub mod probe;
pub mod retry;
pub mod scoring;
pub mod security;
pub mod server;
pub mod store;

pub use config::{Config, Credentials, PipelineSettings};
pub use error::{PipelineError, PipelineResult};
pub use model::{LanguageRunReport, RunReport, TranslationResult};
pub use orchestrator::TranslationOrchestrator;
