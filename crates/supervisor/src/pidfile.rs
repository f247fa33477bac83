use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use fd_lock::{RwLock, RwLockWriteGuard};

/// An exclusively-locked file holding this process's PID, for its lifetime.
///
/// The lock handle is leaked (`Box::leak`) so the write guard can outlive the function that
/// acquires it; both are reclaimed by the OS when the process exits, which is the only time
/// this struct's lifetime ends anyway.
pub struct PidFile {
    guard: RwLockWriteGuard<'static, File>,
    path: PathBuf,
}

impl PidFile {
    /// Attempt to take an exclusive, non-blocking lock on `path`, creating it if absent.
    /// Returns `Ok(None)` if another live process already holds the lock.
    pub fn try_acquire(path: PathBuf) -> io::Result<Option<Self>> {
        let file = OpenOptions::new().create(true).read(true).write(true).open(&path)?;
        let lock: &'static mut RwLock<File> = Box::leak(Box::new(RwLock::new(file)));

        match lock.try_write() {
            Ok(guard) => Ok(Some(Self { guard, path })),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Overwrite the file's contents with `pid`.
    pub fn write_pid(&mut self, pid: u32) -> io::Result<()> {
        self.guard.set_len(0)?;
        self.guard.seek(SeekFrom::Start(0))?;
        write!(self.guard, "{pid}")
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                log::warn!("failed to remove pid file {}: {err}", self.path.display());
            }
        }
    }
}

/// Read the PID recorded in `path`, without taking any lock. Used only for diagnostic reporting
/// when the file is already held by a live process.
pub fn read_pid_unlocked(path: &Path) -> Option<u32> {
    let mut file = File::open(path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}
