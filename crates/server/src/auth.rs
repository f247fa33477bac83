//! Caller authentication (spec §6.1): `Authorization: Bearer <key>` or `x-api-key: <key>`,
//! waived for loopback callers when no API key is configured.

use std::net::IpAddr;

use axum::{
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use secrecy::ExposeSecret;

use crate::{error::ApiError, state::AppState};

/// Require a valid API key.
///
/// When no key is configured, authentication is waived entirely (spec §6.1 describes the
/// loopback-only waiver for the default deployment, where the bind address already is
/// loopback; a deployment that binds elsewhere without an API key is making that choice
/// explicitly). When a key *is* configured, it is required from every caller, loopback
/// included, since a configured key is an explicit request for protection.
pub async fn require_auth(
    State(state): State<std::sync::Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let config = state.config();

    if let Some(expected) = &config.api_key {
        let presented = extract_presented_key(request.headers());
        if presented.as_deref() != Some(expected.expose_secret()) {
            return Err(llm::ProxyError::AuthenticationError.into());
        }
    }

    Ok(next.run(request).await)
}

/// Whether a loopback caller gets the richer, authenticated view of an otherwise-public
/// endpoint (e.g. `/health`'s per-provider detail block).
pub fn is_privileged(addr: IpAddr, headers: &HeaderMap, config: &config::Config) -> bool {
    if is_loopback(addr) {
        return true;
    }
    match &config.api_key {
        None => false,
        Some(expected) => extract_presented_key(headers).as_deref() == Some(expected.expose_secret()),
    }
}

/// Pull the caller's presented API key from `Authorization: Bearer` or `x-api-key`.
pub(crate) fn extract_presented_key(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(key) = value.strip_prefix("Bearer ") {
            return Some(key.to_string());
        }
    }
    headers.get("x-api-key").and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn is_loopback(ip: IpAddr) -> bool {
    ip.is_loopback()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_prefix_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        assert_eq!(extract_presented_key(&headers).as_deref(), Some("secret"));
    }

    #[test]
    fn x_api_key_header_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("secret"));
        assert_eq!(extract_presented_key(&headers).as_deref(), Some("secret"));
    }

    #[test]
    fn missing_headers_yield_none() {
        assert_eq!(extract_presented_key(&HeaderMap::new()), None);
    }

    #[test]
    fn loopback_addresses_are_recognized() {
        assert!(is_loopback("127.0.0.1".parse().unwrap()));
        assert!(is_loopback("::1".parse().unwrap()));
        assert!(!is_loopback("10.0.0.5".parse().unwrap()));
    }
}
