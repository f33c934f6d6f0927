//! core::paths
//!
//! Centralized path routing for shiplock storage locations.
//!
//! **Hard rule:** no code outside this module computes paths under the
//! state directory. Every storage location goes through [`StatePaths`].
//!
//! # Storage Layout
//!
//! All state lives under the state directory (default `.shiplock/` in the
//! working directory):
//! - `config.toml` - Configuration
//! - `catalog.json` - Platform revision catalog
//! - `locks/` - Content-addressed lock artifacts (`<digest>.json`)
//! - `releases/` - Immutable release records (`<id>.json`)
//! - `envs/` - Environment binding records (`<name>.json`) and their
//!   promotion mutexes (`<name>.lock`)
//! - `promotions/` - Per-environment promotion history (`<name>.json`)
//! - `ledger.jsonl` - Append-only audit ledger
//!
//! # Example
//!
//! ```
//! use shiplock::core::paths::StatePaths;
//! use std::path::PathBuf;
//!
//! let paths = StatePaths::new(PathBuf::from("/srv/.shiplock"));
//! assert_eq!(
//!     paths.catalog_path(),
//!     PathBuf::from("/srv/.shiplock/catalog.json")
//! );
//! ```

use std::path::{Path, PathBuf};

use crate::core::types::{ArtifactId, EnvName, ReleaseId};

/// Environment variable overriding the state directory location.
pub const STATE_DIR_ENV: &str = "SHIPLOCK_DIR";

/// Default state directory name, relative to the working directory.
pub const DEFAULT_STATE_DIR: &str = ".shiplock";

/// Centralized path routing for shiplock storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    root: PathBuf,
}

impl StatePaths {
    /// Create paths rooted at an explicit state directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve the state directory: explicit flag, then `SHIPLOCK_DIR`,
    /// then `./.shiplock`.
    pub fn discover(flag: Option<&Path>) -> Self {
        if let Some(dir) = flag {
            return Self::new(dir.to_path_buf());
        }
        if let Some(dir) = std::env::var_os(STATE_DIR_ENV) {
            return Self::new(PathBuf::from(dir));
        }
        Self::new(PathBuf::from(DEFAULT_STATE_DIR))
    }

    /// The state directory root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/config.toml`
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// `<root>/catalog.json`
    pub fn catalog_path(&self) -> PathBuf {
        self.root.join("catalog.json")
    }

    /// `<root>/locks/`
    pub fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    /// `<root>/locks/<digest>.json`
    pub fn lock_artifact_path(&self, id: &ArtifactId) -> PathBuf {
        self.locks_dir().join(format!("{}.json", id.digest()))
    }

    /// `<root>/releases/`
    pub fn releases_dir(&self) -> PathBuf {
        self.root.join("releases")
    }

    /// `<root>/releases/<id>.json`
    pub fn release_path(&self, id: &ReleaseId) -> PathBuf {
        self.releases_dir().join(format!("{}.json", id))
    }

    /// `<root>/envs/`
    pub fn envs_dir(&self) -> PathBuf {
        self.root.join("envs")
    }

    /// `<root>/envs/<name>.json`
    pub fn env_record_path(&self, name: &EnvName) -> PathBuf {
        self.envs_dir().join(format!("{}.json", name))
    }

    /// `<root>/envs/<name>.lock` - the per-environment promotion mutex.
    pub fn env_lock_path(&self, name: &EnvName) -> PathBuf {
        self.envs_dir().join(format!("{}.lock", name))
    }

    /// `<root>/promotions/`
    pub fn promotions_dir(&self) -> PathBuf {
        self.root.join("promotions")
    }

    /// `<root>/promotions/<name>.json` - promotion history for one environment.
    pub fn promotion_history_path(&self, name: &EnvName) -> PathBuf {
        self.promotions_dir().join(format!("{}.json", name))
    }

    /// `<root>/ledger.jsonl`
    pub fn ledger_path(&self) -> PathBuf {
        self.root.join("ledger.jsonl")
    }

    /// Ensure the state directory structure exists.
    ///
    /// # Errors
    ///
    /// Returns an IO error if directory creation fails.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.locks_dir())?;
        std::fs::create_dir_all(self.releases_dir())?;
        std::fs::create_dir_all(self.envs_dir())?;
        std::fs::create_dir_all(self.promotions_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::EnvName;

    fn paths() -> StatePaths {
        StatePaths::new(PathBuf::from("/srv/.shiplock"))
    }

    #[test]
    fn top_level_paths() {
        let p = paths();
        assert_eq!(p.config_path(), PathBuf::from("/srv/.shiplock/config.toml"));
        assert_eq!(p.catalog_path(), PathBuf::from("/srv/.shiplock/catalog.json"));
        assert_eq!(p.ledger_path(), PathBuf::from("/srv/.shiplock/ledger.jsonl"));
    }

    #[test]
    fn lock_artifact_path_uses_digest() {
        let id = ArtifactId::parse(&format!("sha256:{}", "ab".repeat(32))).unwrap();
        let path = paths().lock_artifact_path(&id);
        assert_eq!(
            path,
            PathBuf::from(format!("/srv/.shiplock/locks/{}.json", "ab".repeat(32)))
        );
    }

    #[test]
    fn env_paths() {
        let name = EnvName::new("prod").unwrap();
        let p = paths();
        assert_eq!(
            p.env_record_path(&name),
            PathBuf::from("/srv/.shiplock/envs/prod.json")
        );
        assert_eq!(
            p.env_lock_path(&name),
            PathBuf::from("/srv/.shiplock/envs/prod.lock")
        );
        assert_eq!(
            p.promotion_history_path(&name),
            PathBuf::from("/srv/.shiplock/promotions/prod.json")
        );
    }

    #[test]
    fn discover_prefers_flag() {
        let p = StatePaths::discover(Some(Path::new("/tmp/state")));
        assert_eq!(p.root(), Path::new("/tmp/state"));
    }

    #[test]
    fn ensure_dirs_creates_layout() {
        let temp = tempfile::TempDir::new().unwrap();
        let p = StatePaths::new(temp.path().join("state"));
        p.ensure_dirs().unwrap();
        assert!(p.locks_dir().is_dir());
        assert!(p.releases_dir().is_dir());
        assert!(p.envs_dir().is_dir());
        assert!(p.promotions_dir().is_dir());
    }
}
