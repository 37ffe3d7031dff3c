//! Translation runner for the diary app's localization catalog
//!
//! Usage:
//!   diary-translate run [LANG...]        # Translate missing keys (defaults to TARGET_LANGUAGES)
//!   diary-translate estimate [LANG...]   # Show projected key count, cost and time
//!   diary-translate probe                # Show which model tier would be used
//!   diary-translate serve                # Start the admin HTTP API
//!
//! Required environment variables:
//! - STORE_URL (for run/estimate/serve)
//! - OPENAI_API_KEY (for run/probe/serve)
//! - STORE_TOKEN (for run/serve)

use anyhow::{Context, Result};
use diary_translate::config::Config;
use diary_translate::estimate::estimate_run;
use diary_translate::gateway::GatewaySettings;
use diary_translate::probe::probe_default_model;
use diary_translate::server::{self, AppState};
use diary_translate::store::HttpStore;
use diary_translate::TranslationOrchestrator;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("diary_translate=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        print_usage();
        return Ok(());
    };

    let config = Config::from_env()?;
    let client = reqwest::Client::new();
    let targets = if args.len() > 2 {
        args[2..].to_vec()
    } else {
        config.target_languages.clone()
    };

    match command.as_str() {
        "run" => run_command(&config, client, &targets).await,
        "estimate" => estimate_command(&config, client, &targets).await,
        "probe" => probe_command(&config, &client).await,
        "serve" => serve_command(&config, client).await,
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        other => {
            print_usage();
            anyhow::bail!("Unknown command: {}", other)
        }
    }
}

async fn build_orchestrator(config: &Config, client: reqwest::Client) -> Result<TranslationOrchestrator> {
    let store = Arc::new(HttpStore::new(client.clone(), config.store_url()?));

    let model = match &config.openai_model {
        Some(model) => model.clone(),
        None => {
            let api_key = config.openai_api_key.as_deref().unwrap_or_default();
            probe_default_model(&client, &config.openai_models_url, api_key).await
        }
    };
    info!("Using model {}", model);

    Ok(TranslationOrchestrator::new(
        client,
        store,
        GatewaySettings::new(&config.openai_api_url, &model),
        config.pipeline_settings(),
    ))
}

async fn run_command(config: &Config, client: reqwest::Client, targets: &[String]) -> Result<()> {
    if targets.is_empty() {
        anyhow::bail!("No target languages given (pass them as arguments or set TARGET_LANGUAGES)");
    }

    let orchestrator = build_orchestrator(config, client).await?;
    let report = orchestrator
        .translate_missing_keys(&config.source_language, targets, &config.credentials())
        .await
        .context("Translation run aborted")?;

    for (language, summary) in &report.languages {
        let status = match &summary.error {
            Some(error) => format!("NOT SAVED ({})", error),
            None => "saved".to_string(),
        };
        println!(
            "{}: {} translated, {} need review, {} degraded batches, {}",
            language,
            summary.results.len(),
            summary.review_count(),
            summary.degraded_batches,
            status
        );
    }

    Ok(())
}

async fn estimate_command(config: &Config, client: reqwest::Client, targets: &[String]) -> Result<()> {
    let store = HttpStore::new(client, config.store_url()?);
    let estimate = estimate_run(&store, &config.source_language, targets, &config.pipeline_settings())
        .await
        .context("Failed to estimate translation run")?;

    println!("{}", serde_json::to_string_pretty(&estimate)?);
    Ok(())
}

async fn probe_command(config: &Config, client: &reqwest::Client) -> Result<()> {
    let api_key = config
        .openai_api_key
        .as_deref()
        .context("OPENAI_API_KEY not set")?;
    let model = probe_default_model(client, &config.openai_models_url, api_key).await;
    println!("{}", model);
    Ok(())
}

async fn serve_command(config: &Config, client: reqwest::Client) -> Result<()> {
    let orchestrator = build_orchestrator(config, client).await?;
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        credentials: config.credentials(),
        default_source_language: config.source_language.clone(),
        api_key: config.api_key.clone(),
    };
    server::serve(state, config.port).await
}

fn print_usage() {
    eprintln!("Usage: diary-translate <run|estimate|probe|serve> [LANG...]");
    eprintln!("STORE_URL is needed by run, estimate and serve; probe only needs OPENAI_API_KEY");
}
