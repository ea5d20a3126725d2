//! Named cross-process lock (component F).
//!
//! The real implementation wraps an OS-provided named mutex; off
//! Windows the portable equivalent is an advisory `flock` on a file
//! derived from the lock's name, via [`fs4`]. A mutex "name" is a
//! path-derived string with separator and drive-letter punctuation
//! replaced, so it can double as a filename; lock files live directly
//! under the cache root rather than in a shard directory, since there
//! are only `256 * 2 + 1` of them for the lifetime of a cache root.
//!
//! Acquisition polls with a short sleep instead of blocking indefinitely,
//! so a configured timeout can be enforced; on timeout the caller gets a
//! [`Error::LockTimeout`] naming both the lock and the timeout.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs4::fs_std::FileExt;

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Sanitize an arbitrary string into a filesystem-safe lock name.
pub fn sanitize_lock_name(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect()
}

/// A named, cross-process advisory lock backed by a file under `lock_dir`.
pub struct NamedLock {
    name: String,
    path: PathBuf,
    timeout: Duration,
}

impl NamedLock {
    /// Construct a lock named `name`, backed by a file under `lock_dir`.
    pub fn new(lock_dir: impl AsRef<Path>, name: impl Into<String>, timeout: Duration) -> Self {
        let name = name.into();
        let filename = format!("{}.lock", sanitize_lock_name(&name));
        Self {
            path: lock_dir.as_ref().join(filename),
            name,
            timeout,
        }
    }

    /// Acquire the lock, blocking (with polling) up to the configured
    /// timeout. On success, the lock is released when the returned guard
    /// is dropped, on every exit path including panics unwinding through it.
    pub fn acquire(&self) -> Result<LockGuard> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.path)
            .map_err(|source| Error::Io {
                path: self.path.clone(),
                source,
            })?;

        let deadline = Instant::now() + self.timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(LockGuard {
                        name: self.name.clone(),
                        file,
                    })
                }
                Err(_) if Instant::now() < deadline => {
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(_) => {
                    return Err(Error::LockTimeout {
                        name: self.name.clone(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    });
                }
            }
        }
    }
}

/// RAII guard releasing a [`NamedLock`] on drop.
///
/// Owns its state (no borrow of the [`NamedLock`] that created it) so a
/// composite lock can build a `Vec<LockGuard>` from short-lived
/// [`NamedLock`] temporaries and still release them, in reverse
/// acquisition order, via ordinary `Vec` drop.
pub struct LockGuard {
    name: String,
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl LockGuard {
    /// The name of the lock this guard holds.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
