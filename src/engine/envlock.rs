//! engine::envlock
//!
//! Per-environment promotion mutex.
//!
//! # Architecture
//!
//! Each environment has a lock file (`envs/<name>.lock`) guarded by an
//! OS-level exclusive lock via `fs2`. The engine takes the lock for the
//! duration of each transition, not the lifetime of a promotion; a second
//! process hitting a held lock fails fast with `AlreadyLocked` and its
//! caller retries after re-reading state.
//!
//! # Invariants
//!
//! - Acquisition is non-blocking (fails fast if held)
//! - The lock is released on drop (RAII), panic included

use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::StatePaths;
use crate::core::types::EnvName;

/// Errors from environment locking.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process is mutating this environment.
    #[error("a promotion is in progress for environment '{0}'")]
    AlreadyLocked(EnvName),

    /// Failed to create the lock file.
    #[error("failed to create lock for '{env}': {message}")]
    CreateFailed { env: EnvName, message: String },

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock for '{env}': {message}")]
    AcquireFailed { env: EnvName, message: String },
}

/// An exclusive lock on one environment.
///
/// Released when dropped.
#[derive(Debug)]
pub struct EnvLock {
    path: PathBuf,
    file: Option<File>,
}

impl EnvLock {
    /// Attempt to acquire the lock for an environment.
    ///
    /// # Errors
    ///
    /// [`LockError::AlreadyLocked`] if another process holds it.
    pub fn acquire(paths: &StatePaths, env: &EnvName) -> Result<Self, LockError> {
        std::fs::create_dir_all(paths.envs_dir()).map_err(|e| LockError::CreateFailed {
            env: env.clone(),
            message: e.to_string(),
        })?;

        let path = paths.env_lock_path(env);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| LockError::CreateFailed {
                env: env.clone(),
                message: e.to_string(),
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(LockError::AlreadyLocked(env.clone()))
            }
            Err(e) => Err(LockError::AcquireFailed {
                env: env.clone(),
                message: e.to_string(),
            }),
        }
    }

    /// Whether this guard still holds the lock.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// The lock file path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Drop for EnvLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            // Best effort; the OS releases the lock when the handle closes.
            let _ = fs2::FileExt::unlock(&file);
        }
    }
}
