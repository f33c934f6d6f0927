//! store::lock_store
//!
//! Content-addressed storage for lock artifacts.
//!
//! # Architecture
//!
//! A lock artifact is a resolved [`LockGraph`] plus its provenance, stored
//! as one JSON file named by the graph's content hash. Recording is
//! idempotent: the same graph always produces the same artifact id, and a
//! second record of an existing graph is a no-op. The public contract is
//! append-only; nothing updates or deletes an artifact.

use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{read_json, write_json_atomic, StoreError};
use crate::core::paths::StatePaths;
use crate::core::types::{ArtifactId, PackageName, UtcTimestamp};
use crate::resolver::{LockGraph, RESOLVER_VERSION};

/// How a lock artifact came to be.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockProvenance {
    /// Summary of the compiled constraint set that produced the graph.
    pub constraints: String,
    /// Resolution algorithm version.
    pub resolver_version: String,
    pub recorded_at: UtcTimestamp,
}

/// A stored lock artifact: the graph and its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockArtifact {
    pub id: ArtifactId,
    pub graph: LockGraph,
    pub provenance: LockProvenance,
}

impl LockArtifact {
    /// The pins as sorted (name, version) pairs.
    pub fn pins(&self) -> impl Iterator<Item = (&PackageName, &Version)> {
        self.graph.pins.iter()
    }
}

/// The lock artifact store.
pub struct LockStore<'a> {
    paths: &'a StatePaths,
}

impl<'a> LockStore<'a> {
    pub fn new(paths: &'a StatePaths) -> Self {
        Self { paths }
    }

    /// Record a lock graph, returning its artifact id.
    ///
    /// Idempotent: recording a graph that already exists returns the
    /// existing id without touching the file.
    pub fn record(
        &self,
        graph: &LockGraph,
        constraints_summary: &str,
    ) -> Result<ArtifactId, StoreError> {
        let id = graph.content_hash();
        let path = self.paths.lock_artifact_path(&id);
        if path.exists() {
            debug!(artifact = %id.short(), "lock artifact already recorded");
            return Ok(id);
        }

        let artifact = LockArtifact {
            id: id.clone(),
            graph: graph.clone(),
            provenance: LockProvenance {
                constraints: constraints_summary.to_string(),
                resolver_version: RESOLVER_VERSION.to_string(),
                recorded_at: UtcTimestamp::now(),
            },
        };
        write_json_atomic(&path, &artifact)?;
        debug!(artifact = %id.short(), pins = graph.pins.len(), "lock artifact recorded");
        Ok(id)
    }

    /// Fetch a lock artifact by id.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if no artifact with this id exists.
    pub fn fetch(&self, id: &ArtifactId) -> Result<LockArtifact, StoreError> {
        let path = self.paths.lock_artifact_path(id);
        if !path.exists() {
            return Err(StoreError::NotFound(format!("lock artifact '{id}'")));
        }
        read_json(&path)
    }

    /// List all recorded artifact ids, sorted.
    pub fn list(&self) -> Result<Vec<ArtifactId>, StoreError> {
        let dir = self.paths.locks_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            ids.push(ArtifactId::parse(format!("sha256:{stem}"))?);
        }
        ids.sort();
        Ok(ids)
    }
}
