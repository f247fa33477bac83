//! `/providers[/:id[/toggle]]` — spec §6.1: provider CRUD, always authenticated. `GET` additionally
//! folds in each provider's exported stats and current health (the `[AMBIENT]` list-with-stats
//! enrichment noted in SPEC_FULL.md §6).

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use config::ProviderConfig;
use perf::CircuitBreaker;
use providers::ProviderStatsSnapshot;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, state::AppState};

/// A provider's config, redacting its upstream API key, alongside its live stats and health.
#[derive(Serialize)]
pub struct ProviderView {
    id: String,
    api_base_url: String,
    models: Vec<String>,
    enabled: bool,
    healthy: bool,
    stats: ProviderStatsSnapshot,
}

fn view(id: &str, config: ProviderConfig, stats: ProviderStatsSnapshot, healthy: bool) -> ProviderView {
    ProviderView {
        id: id.to_string(),
        api_base_url: config.api_base_url,
        models: config.models,
        enabled: config.enabled,
        healthy,
        stats,
    }
}

/// `GET /providers`: every configured provider, enabled or not.
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<ProviderView>> {
    let views = state
        .registry
        .provider_names()
        .into_iter()
        .filter_map(|id| {
            let (config, stats, healthy) = state.registry.describe(&id)?;
            Some(view(&id, config, stats, healthy))
        })
        .collect();

    Json(views)
}

/// `GET /providers/:id`.
pub async fn get(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<ProviderView>, ApiError> {
    let (config, stats, healthy) = state
        .registry
        .describe(&id)
        .ok_or_else(|| llm::ProxyError::NotFound(format!("provider '{id}' not found")))?;

    Ok(Json(view(&id, config, stats, healthy)))
}

/// Request body for creating or replacing a provider (`POST`/`PUT /providers/:id`).
#[derive(Deserialize)]
pub struct PutProviderRequest {
    api_base_url: String,
    api_key: String,
    models: Vec<String>,
    #[serde(default = "default_true")]
    enabled: bool,
}

fn default_true() -> bool {
    true
}

impl From<PutProviderRequest> for ProviderConfig {
    fn from(request: PutProviderRequest) -> Self {
        ProviderConfig {
            api_base_url: request.api_base_url,
            api_key: SecretString::from(request.api_key),
            models: request.models,
            enabled: request.enabled,
            transformers: Default::default(),
        }
    }
}

/// `POST /providers/:id` and `PUT /providers/:id`: create or wholesale-replace a provider.
/// Resets its health and stats, matching the fresh-entry behavior a provider gets at startup.
pub async fn put(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<PutProviderRequest>,
) -> Result<StatusCode, ApiError> {
    state.registry.upsert(id.clone(), request.into());
    ensure_breaker(&state, &id);
    Ok(StatusCode::OK)
}

fn ensure_breaker(state: &AppState, id: &str) {
    let config = state.config();
    if config.performance.circuit_breaker.enabled && state.breaker(id).is_none() {
        state.breakers.insert(
            id.to_string(),
            CircuitBreaker::new(id.to_string(), config.performance.circuit_breaker.clone(), state.events.clone()),
        );
    }
}

/// `DELETE /providers/:id`.
pub async fn delete(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    if state.registry.remove(&id) {
        state.breakers.remove(&id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(llm::ProxyError::NotFound(format!("provider '{id}' not found")).into())
    }
}

/// `PATCH /providers/:id/toggle`: flip `enabled` in place, preserving accumulated stats/health.
pub async fn toggle(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<ProviderView>, ApiError> {
    state
        .registry
        .toggle(&id)
        .ok_or_else(|| llm::ProxyError::NotFound(format!("provider '{id}' not found")))?;

    let (config, stats, healthy) = state.registry.describe(&id).expect("just toggled, must exist");
    Ok(Json(view(&id, config, stats, healthy)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_request_converts_into_provider_config() {
        let request = PutProviderRequest {
            api_base_url: "https://api.example.com/v1".to_string(),
            api_key: "sk-test".to_string(),
            models: vec!["gpt-4o".to_string()],
            enabled: true,
        };

        let config: ProviderConfig = request.into();
        assert_eq!(config.api_base_url, "https://api.example.com/v1");
        assert_eq!(config.models, vec!["gpt-4o".to_string()]);
        assert!(config.enabled);
    }
}
