//! ccproxy server library: route assembly and the `serve` entry point shared by the binary and
//! integration tests (spec §4.10, §5, §6).

#![deny(missing_docs)]

mod auth;
mod cors;
mod dispatch;
mod error;
pub mod handlers;
mod state;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use tokio::net::TcpListener;

pub use state::AppState;

/// Build the application's route tree, wired to `state`.
///
/// `/` and `/health` are unauthenticated (the latter gives a richer per-provider detail block
/// to loopback or authenticated callers, spec §6.1); every other route requires the configured
/// API key when one is set.
pub fn router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::health::health));

    let protected = Router::new()
        .route("/status", get(handlers::status::status))
        .route("/v1/messages", post(handlers::messages::messages))
        .route("/providers", get(handlers::providers::list).post(handlers::providers::put))
        .route(
            "/providers/{id}",
            get(handlers::providers::get).put(handlers::providers::put).delete(handlers::providers::delete),
        )
        .route("/providers/{id}/toggle", patch(handlers::providers::toggle))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    public
        .merge(protected)
        .layer(cors::layer())
        .with_state(state)
}

/// Start the health-probe and rate-limit-cleanup workers and serve `state`'s router on `addr`
/// until a shutdown signal arrives (spec §4.5, §4.7, §4.11). Returns once the listener has shut
/// down gracefully, or once the post-signal drain timeout elapses, whichever comes first.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let probe_interval = state.config().performance.health_probe_interval();
    let probe_handle = providers::spawn_probe_worker(state.registry(), probe_interval);

    let cleanup_interval = std::time::Duration::from_secs(state.config().performance.rate_limit.cleanup_interval_secs);
    let cleanup_handle = spawn_rate_limit_cleanup_worker(Arc::clone(&state), cleanup_interval);

    let drain_timeout = supervisor::drain_timeout(state.config().performance.shutdown_timeout());

    let app = router(state);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| anyhow::anyhow!("failed to bind {addr}: {err}"))?;

    log::info!("ccproxy listening on http://{addr}");

    let serve_future = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(supervisor::Supervisor::wait_for_shutdown_signal());
    tokio::pin!(serve_future);

    let serve_result = tokio::select! {
        result = &mut serve_future => result.map_err(|err| anyhow::anyhow!("server error: {err}")),
        _ = force_exit_after_drain_timeout(drain_timeout) => {
            log::warn!("graceful shutdown drain exceeded {drain_timeout:?}, forcing exit");
            Ok(())
        }
    };

    probe_handle.abort();
    cleanup_handle.abort();
    serve_result
}

/// Waits for a shutdown signal, then sleeps for `drain_timeout` before resolving — raced against
/// the in-progress graceful shutdown in [`serve`] so an in-flight request can't block exit
/// forever.
async fn force_exit_after_drain_timeout(drain_timeout: std::time::Duration) {
    supervisor::Supervisor::wait_for_shutdown_signal().await;
    tokio::time::sleep(drain_timeout).await;
}

/// Periodically evicts idle rate-limit buckets (spec §4.7).
fn spawn_rate_limit_cleanup_worker(state: Arc<AppState>, interval: std::time::Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            state.rate_limiter.cleanup();
        }
    })
}
