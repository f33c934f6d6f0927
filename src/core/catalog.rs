//! core::catalog
//!
//! The version catalog: an append-only log of platform revisions.
//!
//! # Architecture
//!
//! Each platform revision is an immutable record of what the managed
//! platform pre-installs: an ordered set of `(name, exact version)` pairs
//! under a revision identifier. Revisions are only ever appended; widening
//! a ceiling requires publishing a new revision ("platform revision bump"),
//! never editing an old one.
//!
//! # Storage
//!
//! The catalog is stored as a single JSON document (`catalog.json` in the
//! state directory), written atomically via temp-file + rename with fsync.
//!
//! # Invariants
//!
//! - Revision ids are unique; re-ingesting an id fails with `DuplicateRevision`
//! - Within a revision a name appears at most once (last-declared wins)
//! - Revisions are never mutated or removed once recorded

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{PackageName, RevisionId, TypeError, UtcTimestamp};

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A revision with this id has already been recorded.
    #[error("platform revision '{0}' already recorded")]
    DuplicateRevision(RevisionId),

    /// The named revision does not exist.
    #[error("platform revision '{0}' not found")]
    RevisionNotFound(RevisionId),

    /// The catalog has no revisions yet.
    #[error("version catalog is empty; record a platform revision first")]
    Empty,

    /// A pins-file line could not be parsed.
    #[error("malformed pin '{line}': {reason}")]
    MalformedPin { line: String, reason: String },

    /// Identifier validation failed.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// I/O error reading or writing the catalog file.
    #[error("catalog i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("catalog json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One immutable platform revision: what the platform ships.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRevision {
    /// Revision identifier.
    pub id: RevisionId,
    /// Pre-installed packages and their exact versions.
    pub entries: BTreeMap<PackageName, Version>,
    /// When the revision was recorded.
    pub recorded_at: UtcTimestamp,
}

impl CatalogRevision {
    /// Build a revision from ordered (name, version) pairs.
    ///
    /// If a name appears more than once the last declaration wins.
    pub fn from_pairs(id: RevisionId, pairs: Vec<(PackageName, Version)>) -> Self {
        let mut entries = BTreeMap::new();
        for (name, version) in pairs {
            entries.insert(name, version);
        }
        Self {
            id,
            entries,
            recorded_at: UtcTimestamp::now(),
        }
    }

    /// The exact version the platform ships for a package, if any.
    pub fn shipped_version(&self, name: &PackageName) -> Option<&Version> {
        self.entries.get(name)
    }

    /// Number of catalog entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the revision has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The append-only catalog of platform revisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionCatalog {
    revisions: Vec<CatalogRevision>,
}

impl VersionCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new revision.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateRevision` if a revision with the same
    /// id was already recorded.
    pub fn ingest(&mut self, revision: CatalogRevision) -> Result<(), CatalogError> {
        if self.revisions.iter().any(|r| r.id == revision.id) {
            return Err(CatalogError::DuplicateRevision(revision.id));
        }
        self.revisions.push(revision);
        Ok(())
    }

    /// The most recently recorded revision.
    pub fn latest(&self) -> Option<&CatalogRevision> {
        self.revisions.last()
    }

    /// Look up a revision by id.
    pub fn get(&self, id: &RevisionId) -> Option<&CatalogRevision> {
        self.revisions.iter().find(|r| &r.id == id)
    }

    /// Resolve the active revision: the named one, or the latest.
    ///
    /// # Errors
    ///
    /// `RevisionNotFound` if `id` names a missing revision, `Empty` if no
    /// revision exists at all.
    pub fn active(&self, id: Option<&RevisionId>) -> Result<&CatalogRevision, CatalogError> {
        match id {
            Some(id) => self
                .get(id)
                .ok_or_else(|| CatalogError::RevisionNotFound(id.clone())),
            None => self.latest().ok_or(CatalogError::Empty),
        }
    }

    /// All recorded revisions, oldest first.
    pub fn revisions(&self) -> &[CatalogRevision] {
        &self.revisions
    }

    /// Load the catalog from disk, or an empty catalog if the file is absent.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the catalog to disk atomically (temp file + rename + fsync).
    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;

        let tmp = path.with_extension("json.tmp");
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
}

/// Parse a pins file: one `name==version` per line.
///
/// Blank lines and `#` comments are skipped. Returns pairs in file order;
/// duplicate names are resolved last-wins by [`CatalogRevision::from_pairs`].
pub fn parse_pins(text: &str) -> Result<Vec<(PackageName, Version)>, CatalogError> {
    let mut pairs = Vec::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (name, version) = line.split_once("==").ok_or_else(|| CatalogError::MalformedPin {
            line: line.to_string(),
            reason: "expected 'name==version'".to_string(),
        })?;
        let name = PackageName::new(name.trim())?;
        let version =
            Version::parse(version.trim()).map_err(|e| CatalogError::MalformedPin {
                line: line.to_string(),
                reason: e.to_string(),
            })?;
        pairs.push((name, version));
    }
    Ok(pairs)
}
