use anyhow::bail;

/// Environment variable the parent sets on its background child to prevent a recursive
/// self-start loop (spec §4.11).
pub const SPAWN_DEPTH_ENV: &str = "CCPROXY_SPAWN_DEPTH";

/// Abort startup if this process was itself spawned by a ccproxy parent.
pub fn check_spawn_depth() -> anyhow::Result<()> {
    if let Ok(value) = std::env::var(SPAWN_DEPTH_ENV) {
        let depth: u32 = value.parse().unwrap_or(0);
        if depth > 0 {
            bail!("refusing recursive self-start: {SPAWN_DEPTH_ENV}={depth}");
        }
    }
    Ok(())
}

/// Value to set `SPAWN_DEPTH_ENV` to on a background child process this one launches.
pub fn child_spawn_depth() -> &'static str {
    "1"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_or_absent_depth_is_allowed() {
        assert!(check_spawn_depth().is_ok());
    }
}
