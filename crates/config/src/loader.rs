use std::{fs, path::Path};

use anyhow::{Context as _, bail};

use crate::{Config, RESERVED_ROUTES};

pub(crate) fn load(path: &Path) -> anyhow::Result<Config> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read config file {}", path.display()))?;

    let config: Config =
        toml::from_str(&raw).with_context(|| format!("failed to parse config file {}", path.display()))?;

    validate(&config)?;

    Ok(config)
}

/// Semantic validation that serde's structural deserialization cannot express.
pub(crate) fn validate(config: &Config) -> anyhow::Result<()> {
    if config.has_enabled_providers() && !config.routes.contains_key("default") {
        bail!("route 'default' must exist when any provider is enabled");
    }

    for (route_name, route) in &config.routes {
        if !RESERVED_ROUTES.contains(&route_name.as_str()) {
            bail!("route '{route_name}' is not a recognized route name (expected one of {RESERVED_ROUTES:?})");
        }

        let provider = config
            .providers
            .get(&route.provider)
            .with_context(|| format!("route '{route_name}' refers to unknown provider '{}'", route.provider))?;

        if !provider.enabled {
            bail!("route '{route_name}' refers to disabled provider '{}'", route.provider);
        }

        if !provider.models.iter().any(|m| m == &route.model) {
            log::warn!(
                "route '{route_name}' targets model '{}' which is not in provider '{}''s configured model list",
                route.model,
                route.provider
            );
        }
    }

    for (name, provider) in &config.providers {
        if name.is_empty() {
            bail!("provider name must not be empty");
        }

        if provider.models.is_empty() {
            bail!("provider '{name}' must configure at least one model");
        }

        for transformer in [&provider.transformers.request, &provider.transformers.response]
            .into_iter()
            .flatten()
        {
            if !crate::KNOWN_TRANSFORMERS.contains(&transformer.as_str()) {
                bail!("provider '{name}' references unknown transformer '{transformer}'");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_empty_document() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 11434);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let err = toml::from_str::<Config>("bogus = true").unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn default_route_required_when_provider_enabled() {
        let toml = r#"
            [providers.openai]
            api_base_url = "https://api.openai.com/v1"
            api_key = "sk-test"
            models = ["gpt-4o"]
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("default"));
    }

    #[test]
    fn route_to_unknown_provider_is_rejected() {
        let toml = r#"
            [providers.openai]
            api_base_url = "https://api.openai.com/v1"
            api_key = "sk-test"
            models = ["gpt-4o"]

            [routes.default]
            provider = "anthropic"
            model = "claude-3-5-sonnet"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("unknown provider"));
    }

    #[test]
    fn unrecognized_route_name_is_rejected() {
        let toml = r#"
            [providers.openai]
            api_base_url = "https://api.openai.com/v1"
            api_key = "sk-test"
            models = ["gpt-4o"]

            [routes.default]
            provider = "openai"
            model = "gpt-4o"

            [routes.fast]
            provider = "openai"
            model = "gpt-4o"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("not a recognized route name"));
    }

    #[test]
    fn unknown_transformer_name_is_rejected() {
        let toml = r#"
            [providers.openai]
            api_base_url = "https://api.openai.com/v1"
            api_key = "sk-test"
            models = ["gpt-4o"]
            transformers = { request = "not-a-real-transformer" }

            [routes.default]
            provider = "openai"
            model = "gpt-4o"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("unknown transformer"));
    }
}
