// src/lock.rs

//! System-wide exclusive package lock
//!
//! At most one package transaction may run on a machine, including ones
//! started by unrelated processes. The lock is advisory: `flock(LOCK_EX)`
//! on a well-known file. A lock held elsewhere is reported, never broken.
//!
//! # Example
//!
//! ```ignore
//! use pkgsys::lock::FileLock;
//! use pkgsys::services::LockService;
//!
//! let mut lock = FileLock::new("/var/run/pkgsys.lock");
//! if !lock.acquire() {
//!     // someone else is installing packages
//! }
//! // held until `lock` is dropped
//! ```

use crate::Result;
use crate::services::LockService;
use fs2::FileExt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// An acquired exclusive lock, released on drop
pub struct SystemLock {
    /// The lock file handle (kept open to maintain lock)
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl SystemLock {
    /// Try to acquire an exclusive lock without blocking
    ///
    /// Returns:
    /// - `Ok(Some(lock))` if lock was acquired
    /// - `Ok(None)` if lock is held by another process
    /// - `Err` on I/O errors
    pub fn try_acquire<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                info!("Acquired package lock at {:?}", path);
                Ok(Some(Self { file, path }))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                debug!("Package lock already held at {:?}", path);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for SystemLock {
    fn drop(&mut self) {
        // flock is released when the file closes
        info!("Released package lock at {:?}", self.path);
    }
}

/// [`LockService`] backed by a [`SystemLock`], kept once acquired
pub struct FileLock {
    path: PathBuf,
    held: Option<SystemLock>,
}

impl FileLock {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            held: None,
        }
    }
}

impl LockService for FileLock {
    fn acquire(&mut self) -> bool {
        if self.held.is_some() {
            return true;
        }

        match SystemLock::try_acquire(&self.path) {
            Ok(Some(lock)) => {
                self.held = Some(lock);
                true
            }
            Ok(None) => {
                warn!("Another process holds the package lock at {:?}", self.path);
                false
            }
            Err(e) => {
                warn!("Failed to acquire package lock at {:?}: {}", self.path, e);
                false
            }
        }
    }
}
