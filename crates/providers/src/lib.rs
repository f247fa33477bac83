//! Provider registry, health probing, and per-provider stats (spec §4.5).

#![deny(missing_docs)]

mod probe;
mod registry;
mod stats;

pub use probe::spawn_probe_worker;
pub use registry::ProviderRegistry;
pub use stats::ProviderStatsSnapshot;
