//! Shapes [`llm::ProxyError`] into the HTTP error body of spec §7 (`axum::response::IntoResponse`).

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use llm::ProxyError;

/// A [`ProxyError`] plus the request id to attach to its body, if one exists.
///
/// Handlers return `Result<T, ApiError>`; this is the single place status code and body shape
/// are decided, matching the lead crate's one-enum-one-`IntoResponse` convention.
pub struct ApiError {
    error: ProxyError,
    request_id: Option<String>,
}

impl ApiError {
    /// Attach the current request's id, if the middleware stack assigned one.
    pub fn with_request_id(error: ProxyError, request_id: Option<String>) -> Self {
        Self { error, request_id }
    }
}

impl From<ProxyError> for ApiError {
    fn from(error: ProxyError) -> Self {
        Self { error, request_id: None }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let code = match &self.error {
            ProxyError::AuthenticationError => Some("invalid_api_key".to_string()),
            _ => None,
        };

        let body = llm::protocol::anthropic::ErrorResponse {
            error: llm::protocol::anthropic::ErrorBody {
                message: self.error.to_string(),
                kind: self.error.error_type().to_string(),
                code,
                request_id: self.request_id,
            },
        };

        let mut response = (status, Json(body)).into_response();

        if let ProxyError::RateLimitError { retry_after_secs } = &self.error
            && let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string())
        {
            response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
        }

        response
    }
}
