//! store::release_store
//!
//! Immutable release records.
//!
//! A release binds a source reference (commit, tag, build number) to a
//! lock artifact. Releases are retained forever; nothing in the public
//! contract updates or deletes one.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{read_json, write_json_atomic, StoreError};
use crate::core::paths::StatePaths;
use crate::core::types::{ArtifactId, ReleaseId, UtcTimestamp};

/// An immutable release record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub id: ReleaseId,
    /// What was built (commit, tag, or build reference).
    pub source_ref: String,
    /// The lock artifact the release was built against.
    pub lock_artifact: ArtifactId,
    pub created_at: UtcTimestamp,
}

/// The release store.
pub struct ReleaseStore<'a> {
    paths: &'a StatePaths,
}

impl<'a> ReleaseStore<'a> {
    pub fn new(paths: &'a StatePaths) -> Self {
        Self { paths }
    }

    /// Create and persist a new release.
    pub fn create(
        &self,
        source_ref: &str,
        lock_artifact: ArtifactId,
    ) -> Result<Release, StoreError> {
        let release = Release {
            id: ReleaseId::generate(),
            source_ref: source_ref.to_string(),
            lock_artifact,
            created_at: UtcTimestamp::now(),
        };
        write_json_atomic(&self.paths.release_path(&release.id), &release)?;
        debug!(release = release.id.short(), source_ref, "release created");
        Ok(release)
    }

    /// Fetch a release by id.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the release does not exist.
    pub fn get(&self, id: &ReleaseId) -> Result<Release, StoreError> {
        let path = self.paths.release_path(id);
        if !path.exists() {
            return Err(StoreError::NotFound(format!("release '{id}'")));
        }
        read_json(&path)
    }

    /// All releases, oldest first.
    pub fn list(&self) -> Result<Vec<Release>, StoreError> {
        let dir = self.paths.releases_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut releases = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_str().is_some_and(|n| n.ends_with(".json")) {
                releases.push(read_json::<Release>(&entry.path())?);
            }
        }
        releases.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(releases)
    }
}
