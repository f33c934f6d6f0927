//! store::env_store
//!
//! CAS-versioned environment binding records.
//!
//! # Architecture
//!
//! An environment record carries the current and previous bindings (a
//! binding is a release reference plus its lock artifact reference), the
//! traffic split, and a monotonically increasing `seq`. Writers pass the
//! `seq` they read; a mismatch fails with `StaleEnvironmentState` and the
//! caller re-reads and retries. The whole record is replaced atomically,
//! so a reader never observes a release reference from one deploy paired
//! with a lock reference from another.
//!
//! The read-check-rename window is closed by the promotion engine, which
//! holds the per-environment mutex across every transition. The CAS seq
//! still guards against writers that bypass the engine.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{read_json, write_json_atomic, StoreError};
use crate::core::paths::StatePaths;
use crate::core::types::{ArtifactId, EnvName, ReleaseId};

/// A release and the lock artifact it was built against, updated as one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub release: ReleaseId,
    pub lock_artifact: ArtifactId,
}

/// One environment's binding record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: EnvName,
    /// What the environment is serving now.
    pub current: Option<Binding>,
    /// The last binding that served 100% of traffic before `current`.
    pub previous: Option<Binding>,
    /// Percentage of traffic on `current` (0-100).
    pub traffic_split: u8,
    /// Set by rollback; cleared when a new release reaches full traffic.
    pub rolled_back: bool,
    /// CAS sequence number, bumped on every write.
    pub seq: u64,
}

impl Environment {
    pub fn new(name: EnvName) -> Self {
        Self {
            name,
            current: None,
            previous: None,
            traffic_split: 0,
            rolled_back: false,
            seq: 0,
        }
    }
}

/// The environment store.
pub struct EnvStore<'a> {
    paths: &'a StatePaths,
}

impl<'a> EnvStore<'a> {
    pub fn new(paths: &'a StatePaths) -> Self {
        Self { paths }
    }

    /// Create an empty environment record.
    ///
    /// # Errors
    ///
    /// `StoreError::AlreadyExists` if the environment exists.
    pub fn create(&self, name: &EnvName) -> Result<Environment, StoreError> {
        let path = self.paths.env_record_path(name);
        if path.exists() {
            return Err(StoreError::AlreadyExists { name: name.clone() });
        }
        let env = Environment::new(name.clone());
        write_json_atomic(&path, &env)?;
        debug!(env = %name, "environment created");
        Ok(env)
    }

    /// Read an environment record.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the environment does not exist.
    pub fn read(&self, name: &EnvName) -> Result<Environment, StoreError> {
        let path = self.paths.env_record_path(name);
        if !path.exists() {
            return Err(StoreError::NotFound(format!("environment '{name}'")));
        }
        read_json(&path)
    }

    /// Replace an environment record, guarded by the seq the caller read.
    ///
    /// On success the stored record carries `expected_seq + 1` and is
    /// returned. The caller's `seq` field on `env` is ignored.
    ///
    /// # Errors
    ///
    /// `StoreError::StaleEnvironmentState` when the stored seq is not
    /// `expected_seq`; the caller re-reads and retries.
    pub fn write_cas(
        &self,
        env: &Environment,
        expected_seq: u64,
    ) -> Result<Environment, StoreError> {
        let stored = self.read(&env.name)?;
        if stored.seq != expected_seq {
            return Err(StoreError::StaleEnvironmentState {
                name: env.name.clone(),
                expected: expected_seq,
                actual: stored.seq,
            });
        }

        let mut next = env.clone();
        next.seq = expected_seq + 1;
        write_json_atomic(&self.paths.env_record_path(&env.name), &next)?;
        debug!(env = %env.name, seq = next.seq, "environment record updated");
        Ok(next)
    }

    /// All environment names, sorted.
    pub fn list(&self) -> Result<Vec<EnvName>, StoreError> {
        let dir = self.paths.envs_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            names.push(EnvName::new(stem)?);
        }
        names.sort();
        Ok(names)
    }
}
