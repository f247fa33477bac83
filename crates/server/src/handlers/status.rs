//! `GET /status` — spec §6.1: process-level status, always authenticated.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct StatusResponse {
    uptime_secs: u64,
    total_requests: u64,
    failed_requests: u64,
    port: u16,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let config = state.config();
    Json(StatusResponse {
        uptime_secs: state.uptime_secs(),
        total_requests: state.total_requests(),
        failed_requests: state.failed_requests(),
        port: config.port,
    })
}
