//! store
//!
//! File-backed stores for lock artifacts, releases, and environments.
//!
//! # Modules
//!
//! - [`lock_store`] - Content-addressed, append-only lock artifacts
//! - [`release_store`] - Immutable release records
//! - [`env_store`] - CAS-versioned environment binding records
//!
//! # Durability
//!
//! Every record is a single JSON document replaced atomically: serialized
//! to a temp file in the same directory, fsynced, then renamed over the
//! target. A reader never observes a partially written record.

pub mod env_store;
pub mod lock_store;
pub mod release_store;

pub use env_store::{Binding, EnvStore, Environment};
pub use lock_store::{LockArtifact, LockProvenance, LockStore};
pub use release_store::{Release, ReleaseStore};

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::core::types::{EnvName, TypeError};

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named record does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The environment already exists.
    #[error("environment '{name}' already exists")]
    AlreadyExists { name: EnvName },

    /// CAS precondition failed: the record changed since it was read.
    #[error(
        "stale environment state for '{name}': expected seq {expected}, found {actual}; \
         re-read and retry"
    )]
    StaleEnvironmentState {
        name: EnvName,
        expected: u64,
        actual: u64,
    },

    /// Failed to parse a stored record.
    #[error("failed to parse record '{path}': {message}")]
    ParseError { path: String, message: String },

    /// Identifier validation failed.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// I/O error.
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("store json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write a JSON document atomically: temp file in the same directory,
/// fsync, rename over the target.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let content = serde_json::to_string_pretty(value)?;

    let tmp = path.with_extension("tmp");
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Read and parse a JSON document.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| StoreError::ParseError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
