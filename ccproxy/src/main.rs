//! ccproxy binary: CLI flags, logger init, and wiring the core crates together (spec §1's
//! CLI non-goal — this stays thin; the core it drives lives in the library crates).

mod args;
mod logger;

use std::sync::Arc;

use anyhow::Context;
use args::{Cli, Command};
use clap::Parser;
use config::Config;
use secrecy::ExposeSecret;
use supervisor::{Supervisor, StartupOutcome};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| supervisor::default_state_dir().join("ccproxy.toml"));

    let config = if config_path.exists() {
        Config::load(&config_path).with_context(|| format!("loading {}", config_path.display()))?
    } else {
        Config::default()
    };

    logger::init(&config.log);

    let state_dir = supervisor::default_state_dir();

    match cli.command {
        Command::Start => start(config, &state_dir),
        Command::Stop => stop(&state_dir),
        Command::Status => status(&state_dir),
        Command::Code => code(&config, &state_dir),
    }
}

fn start(config: Config, state_dir: &std::path::Path) -> anyhow::Result<()> {
    match Supervisor::startup(state_dir)? {
        StartupOutcome::AlreadyRunning { pid } => {
            match pid {
                Some(pid) => println!("ccproxy is already running (pid {pid})"),
                None => println!("ccproxy is already running"),
            }
            Ok(())
        }
        StartupOutcome::Started(supervisor) => {
            let addr = format!("{}:{}", config.host, config.port)
                .parse()
                .with_context(|| format!("invalid bind address '{}:{}'", config.host, config.port))?;

            let runtime = tokio::runtime::Runtime::new().context("building the async runtime")?;
            let result = runtime.block_on(async move {
                let state = Arc::new(server::AppState::new(config)?);
                server::serve(addr, state).await
            });

            supervisor.shutdown();
            result
        }
    }
}

fn stop(state_dir: &std::path::Path) -> anyhow::Result<()> {
    match supervisor::running_pid(state_dir) {
        Some(pid) => {
            let status = std::process::Command::new("kill").arg("-TERM").arg(pid.to_string()).status();
            match status {
                Ok(status) if status.success() => println!("sent SIGTERM to ccproxy (pid {pid})"),
                Ok(status) => anyhow::bail!("failed to signal pid {pid}: {status}"),
                Err(err) => anyhow::bail!("failed to run kill on pid {pid}: {err}"),
            }
            Ok(())
        }
        None => {
            println!("ccproxy is not running");
            Ok(())
        }
    }
}

fn status(state_dir: &std::path::Path) -> anyhow::Result<()> {
    match supervisor::running_pid(state_dir) {
        Some(pid) => println!("running (pid {pid})"),
        None => println!("not running"),
    }
    Ok(())
}

/// Ensure an instance is up (spawning one in the background if not), attach to its reference
/// count, and print the environment a downstream coding assistant should export to reach it
/// (spec §6.4): `ANTHROPIC_BASE_URL`, `ANTHROPIC_AUTH_TOKEN`, `API_TIMEOUT_MS`.
fn code(config: &Config, state_dir: &std::path::Path) -> anyhow::Result<()> {
    if supervisor::running_pid(state_dir).is_none() {
        let exe = std::env::current_exe().context("locating the current executable")?;
        std::process::Command::new(exe)
            .arg("start")
            .env(supervisor::SPAWN_DEPTH_ENV, supervisor::child_spawn_depth())
            .spawn()
            .context("spawning a background ccproxy instance")?;

        for _ in 0..50 {
            if supervisor::running_pid(state_dir).is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(100));
        }
    }

    let refcount_path = state_dir.join(".ccproxy.refcount");
    supervisor::RefCount::new(refcount_path).attach().context("attaching to the reference count")?;

    let base_url = format!("http://{}:{}", config.host, config.port);
    let auth_token = config.api_key.as_ref().map(|key| key.expose_secret().to_string()).unwrap_or_default();
    let timeout_ms = config.performance.request_timeout_secs * 1000;

    println!("export ANTHROPIC_BASE_URL={base_url}");
    println!("export ANTHROPIC_AUTH_TOKEN={auth_token}");
    println!("export API_TIMEOUT_MS={timeout_ms}");

    Ok(())
}
