//! Admin HTTP surface used by the translation dashboard.

use crate::config::Credentials;
use crate::error::PipelineError;
use crate::estimate::{estimate_run, Estimate};
use crate::model::RunReport;
use crate::orchestrator::TranslationOrchestrator;
use crate::security::{check_admin_key, AdminAuth, API_KEY_HEADER};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TranslationOrchestrator>,
    pub credentials: Credentials,
    pub default_source_language: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub source_language: Option<String>,
    pub target_languages: Vec<String>,
}

type ApiError = (StatusCode, String);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/translations/run", post(run_translations))
        .route("/api/translations/estimate", post(estimate_translations))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Admin API listening on port {}", port);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let provided = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    match check_admin_key(provided, state.api_key.as_deref()) {
        AdminAuth::Granted => Ok(()),
        AdminAuth::Disabled => Err((StatusCode::FORBIDDEN, "admin API is disabled".to_string())),
        AdminAuth::Denied => {
            warn!("Rejected admin request with missing or invalid API key");
            Err((StatusCode::UNAUTHORIZED, "invalid API key".to_string()))
        }
    }
}

fn error_response(err: PipelineError) -> ApiError {
    let status = match err {
        PipelineError::Configuration(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    };
    (status, err.to_string())
}

async fn run_translations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunReport>, ApiError> {
    authorize(&state, &headers)?;

    let source = request
        .source_language
        .unwrap_or_else(|| state.default_source_language.clone());

    let report = state
        .orchestrator
        .translate_missing_keys(&source, &request.target_languages, &state.credentials)
        .await
        .map_err(error_response)?;

    Ok(Json(report))
}

async fn estimate_translations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RunRequest>,
) -> Result<Json<Estimate>, ApiError> {
    authorize(&state, &headers)?;

    let source = request
        .source_language
        .unwrap_or_else(|| state.default_source_language.clone());
    let store = state.orchestrator.store();

    let estimate = estimate_run(
        store.as_ref(),
        &source,
        &request.target_languages,
        state.orchestrator.settings(),
    )
    .await
    .map_err(error_response)?;

    Ok(Json(estimate))
}
