//! Availability probe for picking the default model tier.
//!
//! Not on the translation path: any failure falls back to the economy tier.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

pub const PREFERRED_MODEL: &str = "gpt-4o";
pub const ECONOMY_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    id: String,
}

/// List the model ids the generation service offers to this key
pub async fn list_models(client: &reqwest::Client, models_url: &str, api_key: &str) -> Result<Vec<String>> {
    let response = client
        .get(models_url)
        .bearer_auth(api_key)
        .send()
        .await
        .context("Failed to send model list request")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Model list request failed ({}): {}", status, body);
    }

    let list: ModelList = response
        .json()
        .await
        .context("Failed to parse model list response")?;

    Ok(list.data.into_iter().map(|m| m.id).collect())
}

/// Pick the preferred tier when the service offers it, else the economy tier
pub async fn probe_default_model(client: &reqwest::Client, models_url: &str, api_key: &str) -> String {
    match list_models(client, models_url, api_key).await {
        Ok(models) if models.iter().any(|m| m == PREFERRED_MODEL) => {
            info!("Model probe: {} available", PREFERRED_MODEL);
            PREFERRED_MODEL.to_string()
        }
        Ok(_) => {
            info!("Model probe: {} unavailable, using {}", PREFERRED_MODEL, ECONOMY_MODEL);
            ECONOMY_MODEL.to_string()
        }
        Err(e) => {
            warn!("Model probe failed ({:#}), using {}", e, ECONOMY_MODEL);
            ECONOMY_MODEL.to_string()
        }
    }
}
