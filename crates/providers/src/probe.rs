use std::{sync::Arc, time::Duration};

use reqwest::Client;
use secrecy::ExposeSecret;

use crate::registry::ProviderRegistry;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Spawn one probe worker per enabled provider, each issuing a GET to the provider's base URL
/// on `interval` under a 5s timeout (spec §4.5). One task per provider keeps each provider's
/// results strictly time-ordered (spec §5), without a global lock serializing unrelated
/// providers' probes.
pub fn spawn_probe_worker(registry: Arc<ProviderRegistry>, interval: Duration) -> tokio::task::JoinHandle<()> {
    let client = Client::builder().timeout(PROBE_TIMEOUT).build().unwrap_or_default();

    tokio::spawn(async move {
        let mut tasks = Vec::new();
        for name in registry.provider_names() {
            let registry = Arc::clone(&registry);
            let client = client.clone();
            tasks.push(tokio::spawn(probe_loop(registry, client, name, interval)));
        }
        for task in tasks {
            let _ = task.await;
        }
    })
}

async fn probe_loop(registry: Arc<ProviderRegistry>, client: Client, provider: String, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;

        let Some(config) = registry.provider_config(&provider) else {
            return;
        };

        if !config.enabled {
            continue;
        }

        let success = probe_once(&client, &config.api_base_url, config.api_key.expose_secret()).await;
        registry.apply_probe_result(&provider, success);
    }
}

async fn probe_once(client: &Client, base_url: &str, api_key: &str) -> bool {
    match client.get(base_url).bearer_auth(api_key).send().await {
        Ok(response) => {
            let status = response.status();
            !status.is_server_error() && status.as_u16() != 401 && status.as_u16() != 403
        }
        Err(err) => {
            log::debug!("health probe failed for '{base_url}': {err}");
            false
        }
    }
}
