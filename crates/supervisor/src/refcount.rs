use std::{
    fs::OpenOptions,
    io::{self, Read, Seek, SeekFrom, Write},
    path::PathBuf,
};

use fd_lock::RwLock;

/// Tracks the number of active client attachments (the `code` subcommand's use case), backed
/// by a file guarded with the same advisory-lock discipline as the PID file (spec §4.11).
pub struct RefCount {
    path: PathBuf,
}

impl RefCount {
    /// Point at (without yet touching) the refcount file under the supervisor's state directory.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Increment the counter and return the new value.
    pub fn attach(&self) -> io::Result<u64> {
        self.update(|n| n + 1)
    }

    /// Decrement the counter (floored at zero) and return the new value.
    pub fn detach(&self) -> io::Result<u64> {
        self.update(|n| n.saturating_sub(1))
    }

    /// Current value, without modifying it.
    pub fn current(&self) -> io::Result<u64> {
        self.update(|n| n)
    }

    fn update(&self, f: impl FnOnce(u64) -> u64) -> io::Result<u64> {
        let file = OpenOptions::new().create(true).read(true).write(true).open(&self.path)?;
        let mut lock = RwLock::new(file);
        let mut guard = lock.write()?;

        let mut contents = String::new();
        guard.read_to_string(&mut contents)?;
        let current: u64 = contents.trim().parse().unwrap_or(0);
        let next = f(current);

        guard.set_len(0)?;
        guard.seek(SeekFrom::Start(0))?;
        write!(guard, "{next}")?;

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_and_detach_round_trip() {
        let dir = std::env::temp_dir().join(format!("ccproxy-refcount-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("refcount");
        let _ = std::fs::remove_file(&path);

        let refcount = RefCount::new(path.clone());
        assert_eq!(refcount.attach().unwrap(), 1);
        assert_eq!(refcount.attach().unwrap(), 2);
        assert_eq!(refcount.detach().unwrap(), 1);
        assert_eq!(refcount.current().unwrap(), 1);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn detach_floors_at_zero() {
        let dir = std::env::temp_dir().join(format!("ccproxy-refcount-floor-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("refcount");
        let _ = std::fs::remove_file(&path);

        let refcount = RefCount::new(path.clone());
        assert_eq!(refcount.detach().unwrap(), 0);

        std::fs::remove_file(&path).ok();
    }
}
