//! CLI surface (spec §1: out of scope for the core, but has to exist for the supervisor to
//! have something to invoke).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ccproxy", version, about = "Local Anthropic-to-OpenAI proxy")]
pub struct Cli {
    /// Alternate path to the configuration document (`CCPROXY_CONFIG`).
    #[arg(long, global = true, env = "CCPROXY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the proxy in the foreground, or report that one is already running.
    Start,
    /// Stop a running proxy.
    Stop,
    /// Report whether a proxy is running.
    Status,
    /// Ensure a proxy is running, attach to its reference count, and print the environment a
    /// downstream coding assistant should export to reach it.
    Code,
}
