//! CORS policy (spec §6.1): origin-echo in development, a fixed allow-list otherwise.

use tower_http::cors::{AllowOrigin, CorsLayer};

const DEV_ENV_VARS: &[&str] = &["SERVER_ENVIRONMENT", "ENV", "ENVIRONMENT"];
const EXTRA_ORIGINS_ENV_VAR: &str = "CCPROXY_CORS_ORIGINS";

const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:3000", "http://127.0.0.1:3000"];

/// Build the process-wide CORS layer from the environment (spec §6.1).
pub fn layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    if is_development() {
        return base.allow_origin(AllowOrigin::mirror_request());
    }

    let allowed = allowed_origins();
    base.allow_origin(AllowOrigin::list(
        allowed.iter().filter_map(|origin| origin.parse().ok()),
    ))
}

fn is_development() -> bool {
    DEV_ENV_VARS.iter().any(|name| std::env::var(name).is_ok())
}

fn allowed_origins() -> Vec<String> {
    let mut origins: Vec<String> = DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect();

    if let Ok(extra) = std::env::var(EXTRA_ORIGINS_ENV_VAR) {
        origins.extend(extra.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string));
    }

    origins
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_origins_are_always_present() {
        let origins = allowed_origins();
        for expected in DEFAULT_ALLOWED_ORIGINS {
            assert!(origins.iter().any(|o| o == expected));
        }
    }

    #[test]
    fn extra_origins_env_var_is_appended() {
        // SAFETY: test runs single-threaded within this process's env mutation window.
        unsafe { std::env::set_var(EXTRA_ORIGINS_ENV_VAR, "https://a.example, https://b.example") };
        let origins = allowed_origins();
        unsafe { std::env::remove_var(EXTRA_ORIGINS_ENV_VAR) };
        assert!(origins.iter().any(|o| o == "https://a.example"));
        assert!(origins.iter().any(|o| o == "https://b.example"));
    }
}
