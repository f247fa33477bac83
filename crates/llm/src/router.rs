//! Model/provider router (spec §4.2): picks a concrete `(provider, model)` pair for a request.

use config::Config;

use crate::{error::ProxyError, protocol::anthropic::Request, token_estimator::estimate_tokens};

/// Token count above which the `long_context` route is selected, when configured.
pub const LONG_CONTEXT_THRESHOLD: u64 = 60_000;

/// Model prefix that routes to `background`, when configured.
pub const BACKGROUND_MODEL_PREFIX: &str = "claude-3-5-haiku";

/// The resolved destination of a routed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    /// Provider name.
    pub provider: String,
    /// Model name, with any provider prefix stripped.
    pub model: String,
    /// Which criterion selected this route, for logging/metrics.
    pub matched: MatchedRoute,
}

/// Which of the router's ordered criteria produced a [`RouteDecision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedRoute {
    /// `model` was of the form `provider,model`.
    Explicit,
    /// The `long_context` route, selected on estimated token count.
    LongContext,
    /// The `background` route, selected on the `claude-3-5-haiku` model prefix.
    Background,
    /// The `think` route, selected because `thinking` was enabled.
    Think,
    /// The `default` route.
    Default,
}

/// Route an Anthropic request to a concrete `(provider, model)` pair.
///
/// Implements the first-match-wins ordering of spec §4.2. Never guesses: if no criterion
/// matches and `default` is absent, this returns `Err(ProxyError::NotFound("no_route"))`-shaped
/// errors via the variants documented below.
pub fn route(config: &Config, request: &Request) -> crate::error::Result<RouteDecision> {
    if let Some((provider_name, model_name)) = request.model.split_once(',') {
        if model_name.is_empty() {
            return Err(ProxyError::InvalidRequest(format!(
                "model string '{}' has an empty model after the comma",
                request.model
            )));
        }

        let provider = config
            .providers
            .get(provider_name)
            .filter(|p| p.enabled)
            .ok_or_else(|| ProxyError::ProviderNotFound(format!("provider not found: '{provider_name}'")))?;
        let _ = provider;

        return Ok(RouteDecision {
            provider: provider_name.to_string(),
            model: model_name.to_string(),
            matched: MatchedRoute::Explicit,
        });
    }

    if let Some(route) = config.routes.get("long_context") {
        let tokens = estimate_tokens(request);
        if tokens > LONG_CONTEXT_THRESHOLD {
            return Ok(RouteDecision {
                provider: route.provider.clone(),
                model: route.model.clone(),
                matched: MatchedRoute::LongContext,
            });
        }
    }

    if request.model.starts_with(BACKGROUND_MODEL_PREFIX)
        && let Some(route) = config.routes.get("background")
    {
        return Ok(RouteDecision {
            provider: route.provider.clone(),
            model: route.model.clone(),
            matched: MatchedRoute::Background,
        });
    }

    if request.thinking_enabled()
        && let Some(route) = config.routes.get("think")
    {
        return Ok(RouteDecision {
            provider: route.provider.clone(),
            model: route.model.clone(),
            matched: MatchedRoute::Think,
        });
    }

    let route = config
        .routes
        .get("default")
        .ok_or_else(|| ProxyError::ServerError("no_route: 'default' route is not configured".to_string()))?;

    Ok(RouteDecision {
        provider: route.provider.clone(),
        model: route.model.clone(),
        matched: MatchedRoute::Default,
    })
}

#[cfg(test)]
mod tests {
    use config::{ProviderConfig, RouteConfig};

    use super::*;
    use crate::protocol::anthropic::{Content, Message, Role, Thinking};

    fn base_request(model: &str) -> Request {
        Request {
            model: model.to_string(),
            messages: vec![Message {
                role: Role::User,
                content: Content::Text("hi".to_string()),
            }],
            system: None,
            tools: None,
            tool_choice: None,
            max_tokens: Some(100),
            temperature: None,
            stream: None,
            stop_sequences: None,
            thinking: None,
        }
    }

    fn config_with_routes(routes: &[(&str, &str, &str)]) -> Config {
        let mut config = Config::default();
        config.providers.insert(
            "openai".to_string(),
            ProviderConfig {
                api_base_url: "https://api.openai.com/v1".to_string(),
                api_key: "sk-test".to_string().into(),
                models: vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()],
                enabled: true,
                transformers: Default::default(),
            },
        );
        for (name, provider, model) in routes {
            config.routes.insert(
                name.to_string(),
                RouteConfig {
                    provider: provider.to_string(),
                    model: model.to_string(),
                },
            );
        }
        config
    }

    #[test]
    fn explicit_provider_comma_model_bypasses_routes() {
        let config = config_with_routes(&[("default", "openai", "gpt-4o")]);
        let req = base_request("openai,gpt-4o-mini");
        let decision = route(&config, &req).unwrap();
        assert_eq!(decision.provider, "openai");
        assert_eq!(decision.model, "gpt-4o-mini");
        assert_eq!(decision.matched, MatchedRoute::Explicit);
    }

    #[test]
    fn explicit_unknown_provider_fails() {
        let config = config_with_routes(&[("default", "openai", "gpt-4o")]);
        let req = base_request("unknown,model");
        let err = route(&config, &req).unwrap_err();
        assert!(matches!(err, ProxyError::ProviderNotFound(_)));
    }

    #[test]
    fn explicit_empty_model_after_comma_is_invalid_request() {
        let config = config_with_routes(&[("default", "openai", "gpt-4o")]);
        let req = base_request("openai,");
        let err = route(&config, &req).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidRequest(_)));
    }

    #[test]
    fn long_context_wins_strictly_above_threshold() {
        let config = config_with_routes(&[
            ("default", "openai", "gpt-4o"),
            ("long_context", "openai", "gpt-4o-mini"),
        ]);
        let mut req = base_request("claude-3-5-sonnet");
        req.messages[0].content = Content::Text("x".repeat((LONG_CONTEXT_THRESHOLD as usize + 1) * 4));
        let decision = route(&config, &req).unwrap();
        assert_eq!(decision.matched, MatchedRoute::LongContext);
    }

    #[test]
    fn exactly_at_threshold_does_not_select_long_context() {
        let config = config_with_routes(&[
            ("default", "openai", "gpt-4o"),
            ("long_context", "openai", "gpt-4o-mini"),
        ]);
        let mut req = base_request("claude-3-5-sonnet");
        req.messages[0].content = Content::Text("x".repeat(LONG_CONTEXT_THRESHOLD as usize * 4));
        let decision = route(&config, &req).unwrap();
        assert_eq!(decision.matched, MatchedRoute::Default);
    }

    #[test]
    fn haiku_prefix_selects_background() {
        let config = config_with_routes(&[("default", "openai", "gpt-4o"), ("background", "openai", "gpt-4o-mini")]);
        let req = base_request("claude-3-5-haiku-20241022");
        let decision = route(&config, &req).unwrap();
        assert_eq!(decision.matched, MatchedRoute::Background);
    }

    #[test]
    fn thinking_enabled_selects_think_route() {
        let config = config_with_routes(&[("default", "openai", "gpt-4o"), ("think", "openai", "gpt-4o-mini")]);
        let mut req = base_request("claude-3-5-sonnet");
        req.thinking = Some(Thinking {
            kind: "enabled".to_string(),
            budget_tokens: Some(1024),
        });
        let decision = route(&config, &req).unwrap();
        assert_eq!(decision.matched, MatchedRoute::Think);
    }

    #[test]
    fn falls_back_to_default() {
        let config = config_with_routes(&[("default", "openai", "gpt-4o")]);
        let req = base_request("claude-3-5-sonnet");
        let decision = route(&config, &req).unwrap();
        assert_eq!(decision.matched, MatchedRoute::Default);
    }

    #[test]
    fn missing_default_route_fails() {
        let config = config_with_routes(&[]);
        let req = base_request("claude-3-5-sonnet");
        let err = route(&config, &req).unwrap_err();
        assert!(matches!(err, ProxyError::ServerError(_)));
    }
}
