//! `GET /` — spec §6.1, unauthenticated.

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct RootResponse {
    message: &'static str,
    version: &'static str,
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "ccproxy",
        version: env!("CARGO_PKG_VERSION"),
    })
}
