//! Single-instance process supervision: startup coordination, PID files, and graceful shutdown
//! (spec §4.11).

#![deny(missing_docs)]

mod pidfile;
mod refcount;
mod spawn_guard;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};

pub use refcount::RefCount;
pub use spawn_guard::{check_spawn_depth, child_spawn_depth, SPAWN_DEPTH_ENV};

use pidfile::PidFile;

const STARTUP_LOCK_FILE: &str = ".ccproxy.pid.startup.lock";
const PID_LOCK_FILE: &str = ".ccproxy.pid.lock";
const REFCOUNT_FILE: &str = ".ccproxy.refcount";

/// Outcome of a startup attempt.
pub enum StartupOutcome {
    /// This process now owns the lifetime lock and should proceed to serve.
    Started(Supervisor),
    /// Another live process already holds the lifetime lock.
    AlreadyRunning {
        /// The running process's PID, if it could be read.
        pid: Option<u32>,
    },
}

/// Owns the process's lifetime PID lock. Dropping it releases the lock and removes the file.
pub struct Supervisor {
    lifetime_lock: PidFile,
    refcount: RefCount,
}

impl Supervisor {
    /// Run the startup sequence (spec §4.11):
    /// 1. Abort if this process was itself spawned by a ccproxy parent (anti-spawn-loop).
    /// 2. Take the startup lock; fail fast if another startup is already in progress.
    /// 3. Attempt the lifetime lock; if it's already held, report `AlreadyRunning`.
    /// 4. Otherwise write our PID and release the startup lock.
    pub fn startup(state_dir: impl AsRef<Path>) -> anyhow::Result<StartupOutcome> {
        check_spawn_depth()?;

        let state_dir = state_dir.as_ref();
        std::fs::create_dir_all(state_dir)
            .with_context(|| format!("creating state directory {}", state_dir.display()))?;

        let startup_lock_path = state_dir.join(STARTUP_LOCK_FILE);
        let Some(startup_lock) = PidFile::try_acquire(startup_lock_path)? else {
            bail!("another ccproxy startup is already in progress");
        };

        let pid_lock_path = state_dir.join(PID_LOCK_FILE);
        match PidFile::try_acquire(pid_lock_path.clone())? {
            Some(mut lifetime_lock) => {
                lifetime_lock.write_pid(std::process::id())?;
                drop(startup_lock);

                Ok(StartupOutcome::Started(Supervisor {
                    lifetime_lock,
                    refcount: RefCount::new(state_dir.join(REFCOUNT_FILE)),
                }))
            }
            None => {
                let pid = pidfile::read_pid_unlocked(&pid_lock_path);
                drop(startup_lock);
                Ok(StartupOutcome::AlreadyRunning { pid })
            }
        }
    }

    /// The reference counter of active client attachments, backed by the same lock discipline
    /// as the PID file.
    pub fn refcount(&self) -> &RefCount {
        &self.refcount
    }

    /// Wait for SIGTERM or SIGINT (Ctrl-C).
    pub async fn wait_for_shutdown_signal() {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
            let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
            tokio::select! {
                _ = sigterm.recv() => log::info!("received SIGTERM"),
                _ = sigint.recv() => log::info!("received SIGINT"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("received ctrl-c");
        }
    }

    /// Release the lifetime lock and remove its file. Consumes `self`.
    pub fn shutdown(self) {
        drop(self.lifetime_lock);
    }
}

/// Default ccproxy state directory: `<home>/.ccproxy`.
pub fn default_state_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".ccproxy")
}

/// Check whether an instance is currently running under `state_dir`, without starting one.
///
/// Used by the `status`/`stop` subcommands, which must not acquire the lifetime lock as a side
/// effect of merely asking about it. Returns the running PID, if any.
pub fn running_pid(state_dir: impl AsRef<Path>) -> Option<u32> {
    let pid_lock_path = state_dir.as_ref().join(PID_LOCK_FILE);
    match PidFile::try_acquire(pid_lock_path.clone()) {
        // We could take the lock: nothing was holding it, so nothing is running. Dropping
        // the guard releases it and removes the file again.
        Ok(Some(_guard)) => None,
        Ok(None) => pidfile::read_pid_unlocked(&pid_lock_path),
        Err(err) => {
            log::warn!("failed to probe pid lock at {}: {err}", pid_lock_path.display());
            None
        }
    }
}

/// How long graceful shutdown waits for in-flight requests to drain before forcing exit.
pub fn drain_timeout(shutdown_timeout: Duration) -> Duration {
    shutdown_timeout
}
