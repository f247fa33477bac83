//! `GET /health` — spec §6.1: unauthenticated basic status, with a per-provider `details` block
//! for authenticated or loopback callers.

use std::{net::SocketAddr, sync::Arc};

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::{auth, state::AppState};

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: u64,
    providers: ProviderSummary,
}

#[derive(Serialize)]
struct ProviderSummary {
    total: usize,
    healthy: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ProviderDetail>>,
}

#[derive(Serialize)]
struct ProviderDetail {
    name: String,
    healthy: bool,
}

pub async fn health(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<HealthResponse> {
    let config = state.config();
    let names = state.registry.provider_names();
    let healthy_count = names.iter().filter(|name| state.registry.is_healthy(name)).count();

    let status = if names.is_empty() || healthy_count == names.len() {
        "ok"
    } else if healthy_count == 0 {
        "unhealthy"
    } else {
        "degraded"
    };

    let details = if auth::is_privileged(addr.ip(), &headers, &config) {
        Some(
            names
                .iter()
                .map(|name| ProviderDetail {
                    name: name.clone(),
                    healthy: state.registry.is_healthy(name),
                })
                .collect(),
        )
    } else {
        None
    };

    Json(HealthResponse {
        status,
        timestamp: now_unix(),
        providers: ProviderSummary {
            total: names.len(),
            healthy: healthy_count,
            details,
        },
    })
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
