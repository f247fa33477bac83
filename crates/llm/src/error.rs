//! The closed error taxonomy shared by the router, transformers and the HTTP surface (spec §7).

use thiserror::Error;

/// Result alias using [`ProxyError`].
pub type Result<T> = std::result::Result<T, ProxyError>;

/// The closed set of error types ccproxy can surface to a caller.
///
/// Every variant maps to exactly one `error.type` string and a default HTTP status, per spec §7.
/// `request_id` is attached by the handler layer when one exists, not stored here.
#[derive(Debug, Error, Clone)]
pub enum ProxyError {
    /// Malformed JSON, empty `messages`, or another schema violation.
    #[error("{0}")]
    InvalidRequest(String),
    /// Missing or invalid caller credentials.
    #[error("authentication failed")]
    AuthenticationError,
    /// Caller authenticated but lacks permission for the action.
    #[error("{0}")]
    PermissionError(String),
    /// Unknown route or provider id.
    #[error("{0}")]
    NotFound(String),
    /// Request body exceeded the configured cap.
    #[error("request body too large")]
    RequestTooLarge,
    /// Caller exceeded their rate-limit budget.
    #[error("rate limit exceeded")]
    RateLimitError {
        /// Seconds the caller should wait before retrying.
        retry_after_secs: u64,
    },
    /// The upstream call exceeded the configured timeout.
    #[error("upstream timed out")]
    UpstreamTimeout,
    /// The upstream provider returned an error response.
    #[error("{message}")]
    ProviderError {
        /// Upstream HTTP status, when one is available.
        status: Option<u16>,
        /// Upstream error message.
        message: String,
    },
    /// The routed-to provider does not exist or is disabled; no upstream call was attempted.
    ///
    /// Surfaced as `provider_error` / 500, matching the seeded end-to-end scenario for an
    /// explicit `"unknown,model"` request (spec §8, scenario 3) rather than the generic
    /// upstream-echoing 502 default `ProviderError` carries.
    #[error("{0}")]
    ProviderNotFound(String),
    /// The provider's circuit breaker is open.
    #[error("circuit open for provider '{0}'")]
    CircuitOpen(String),
    /// A configured resource cap (memory, tasks, response size) was exceeded.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    /// An internal invariant was violated.
    #[error("internal server error: {0}")]
    ServerError(String),
    /// The requested capability is not implemented.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl ProxyError {
    /// The closed `error.type` string for this error, per spec §7.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::AuthenticationError => "authentication_error",
            Self::PermissionError(_) => "permission_error",
            Self::NotFound(_) => "not_found",
            Self::RequestTooLarge => "request_too_large",
            Self::RateLimitError { .. } => "rate_limit_error",
            Self::UpstreamTimeout => "upstream_timeout",
            Self::ProviderError { .. } | Self::ProviderNotFound(_) => "provider_error",
            Self::CircuitOpen(_) => "circuit_open",
            Self::ResourceExhausted(_) => "resource_exhausted",
            Self::ServerError(_) => "server_error",
            Self::NotImplemented(_) => "not_implemented",
        }
    }

    /// Default HTTP status code for this error, per spec §7.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::AuthenticationError => 401,
            Self::PermissionError(_) => 403,
            Self::NotFound(_) => 404,
            Self::RequestTooLarge => 413,
            Self::RateLimitError { .. } => 429,
            Self::UpstreamTimeout => 408,
            Self::ProviderError { status, .. } => status.unwrap_or(502),
            Self::ProviderNotFound(_) => 500,
            Self::CircuitOpen(_) => 503,
            Self::ResourceExhausted(_) => 503,
            Self::ServerError(_) => 500,
            Self::NotImplemented(_) => 501,
        }
    }
}
