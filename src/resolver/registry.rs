//! resolver::registry
//!
//! The package registry seam.
//!
//! The registry is an external collaborator: the resolver only ever asks
//! it two questions (which versions exist, what does a version require).
//! [`InMemoryRegistry`] backs tests and the TOML fixture files the CLI
//! accepts in place of a live index.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::Deserialize;
use thiserror::Error;

use crate::core::constraint::{ConstraintError, PackageRequirement};
use crate::core::types::{PackageName, TypeError};

/// Errors from registry lookups and fixture loading.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse registry file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("registry entry '{entry}': {reason}")]
    MalformedEntry { entry: String, reason: String },
}

/// Read access to a package index.
///
/// Implementations must be pure lookups: the resolver relies on repeated
/// calls with equal arguments returning equal answers within one run.
pub trait PackageRegistry {
    /// All published versions of a package. Unknown packages yield an
    /// empty list, which the resolver reports as an unsatisfiable
    /// requirement.
    fn versions(&self, name: &PackageName) -> Result<Vec<Version>, RegistryError>;

    /// The declared requirements of one published version.
    fn dependencies(
        &self,
        name: &PackageName,
        version: &Version,
    ) -> Result<Vec<PackageRequirement>, RegistryError>;
}

/// An in-memory registry, loadable from a TOML fixture.
///
/// # Fixture format
///
/// ```toml
/// [package."liba"]
/// "2.0.0" = []
/// "3.0.0" = ["libx>=1.0.0,<2.0.0"]
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    packages: BTreeMap<PackageName, BTreeMap<Version, Vec<PackageRequirement>>>,
}

#[derive(Deserialize)]
struct RegistryFile {
    #[serde(default)]
    package: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish one version with its requirements. Replaces any previous
    /// entry for the same (name, version).
    pub fn publish(
        &mut self,
        name: PackageName,
        version: Version,
        requires: Vec<PackageRequirement>,
    ) {
        self.packages
            .entry(name)
            .or_default()
            .insert(version, requires);
    }

    /// Parse a TOML fixture.
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, RegistryError> {
        let file: RegistryFile =
            toml::from_str(content).map_err(|e| RegistryError::ParseError {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut registry = Self::new();
        for (name, versions) in file.package {
            let package = PackageName::new(&name).map_err(|e: TypeError| {
                RegistryError::MalformedEntry {
                    entry: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            for (version, requires) in versions {
                let version = Version::parse(&version).map_err(|e| {
                    RegistryError::MalformedEntry {
                        entry: format!("{name} {version}"),
                        reason: e.to_string(),
                    }
                })?;
                let requires = requires
                    .iter()
                    .map(|line| PackageRequirement::parse(line))
                    .collect::<Result<Vec<_>, ConstraintError>>()
                    .map_err(|e| RegistryError::MalformedEntry {
                        entry: format!("{name} {version}"),
                        reason: e.to_string(),
                    })?;
                registry.publish(package.clone(), version, requires);
            }
        }
        Ok(registry)
    }

    /// Load a TOML fixture from disk.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = fs::read_to_string(path).map_err(|source| RegistryError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }
}

impl PackageRegistry for InMemoryRegistry {
    fn versions(&self, name: &PackageName) -> Result<Vec<Version>, RegistryError> {
        Ok(self
            .packages
            .get(name)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn dependencies(
        &self,
        name: &PackageName,
        version: &Version,
    ) -> Result<Vec<PackageRequirement>, RegistryError> {
        Ok(self
            .packages
            .get(name)
            .and_then(|versions| versions.get(version))
            .cloned()
            .unwrap_or_default())
    }
}
