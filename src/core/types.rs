//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`PackageName`] - Validated package name
//! - [`RevisionId`] - Platform revision identifier
//! - [`EnvName`] - Validated environment name
//! - [`ReleaseId`] - Unique release identifier
//! - [`ArtifactId`] - Content hash of a recorded lock graph
//! - [`UtcTimestamp`] - RFC3339 timestamp
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use shiplock::core::types::{PackageName, EnvName};
//!
//! // Valid constructions
//! let pkg = PackageName::new("numpy").unwrap();
//! let env = EnvName::new("staging").unwrap();
//!
//! // Invalid constructions fail at creation time
//! assert!(PackageName::new("Bad Name").is_err());
//! assert!(EnvName::new("").is_err());
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid package name: {0}")]
    InvalidPackageName(String),

    #[error("invalid revision id: {0}")]
    InvalidRevisionId(String),

    #[error("invalid environment name: {0}")]
    InvalidEnvName(String),

    #[error("invalid release id: {0}")]
    InvalidReleaseId(String),

    #[error("invalid artifact id: {0}")]
    InvalidArtifactId(String),
}

/// A validated package name.
///
/// Package names follow registry naming rules:
/// - Cannot be empty
/// - ASCII lowercase letters, digits, `-`, `_`, and `.` only
/// - Cannot start or end with a separator (`-`, `_`, `.`)
/// - Cannot contain consecutive separators
///
/// # Example
///
/// ```
/// use shiplock::core::types::PackageName;
///
/// let name = PackageName::new("requests").unwrap();
/// assert_eq!(name.as_str(), "requests");
///
/// let hyphenated = PackageName::new("scikit-learn").unwrap();
/// assert_eq!(hyphenated.as_str(), "scikit-learn");
///
/// assert!(PackageName::new("").is_err());
/// assert!(PackageName::new("-leading").is_err());
/// assert!(PackageName::new("UPPER").is_err());
/// assert!(PackageName::new("a..b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageName(String);

impl PackageName {
    /// Create a new validated package name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPackageName` if the name violates naming rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidPackageName(
                "package name cannot be empty".into(),
            ));
        }

        const SEPARATORS: [char; 3] = ['-', '_', '.'];

        for c in name.chars() {
            let ok = c.is_ascii_lowercase() || c.is_ascii_digit() || SEPARATORS.contains(&c);
            if !ok {
                return Err(TypeError::InvalidPackageName(format!(
                    "package name cannot contain '{c}'"
                )));
            }
        }

        let first = name.chars().next().unwrap_or(' ');
        let last = name.chars().last().unwrap_or(' ');
        if SEPARATORS.contains(&first) || SEPARATORS.contains(&last) {
            return Err(TypeError::InvalidPackageName(
                "package name cannot start or end with a separator".into(),
            ));
        }

        let mut prev_sep = false;
        for c in name.chars() {
            let sep = SEPARATORS.contains(&c);
            if sep && prev_sep {
                return Err(TypeError::InvalidPackageName(
                    "package name cannot contain consecutive separators".into(),
                ));
            }
            prev_sep = sep;
        }

        Ok(())
    }

    /// Get the package name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PackageName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<PackageName> for String {
    fn from(name: PackageName) -> Self {
        name.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A platform revision identifier.
///
/// Revision ids name a baseline of pre-installed packages. They are
/// opaque but constrained to printable, whitespace-free ASCII so they
/// can be embedded in file names and audit records.
///
/// # Example
///
/// ```
/// use shiplock::core::types::RevisionId;
///
/// let rev = RevisionId::new("2024.10").unwrap();
/// assert_eq!(rev.as_str(), "2024.10");
///
/// assert!(RevisionId::new("").is_err());
/// assert!(RevisionId::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RevisionId(String);

impl RevisionId {
    /// Create a new validated revision id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRevisionId` if the id is empty or contains
    /// whitespace, control characters, or path separators.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::InvalidRevisionId(
                "revision id cannot be empty".into(),
            ));
        }
        for c in id.chars() {
            if c.is_whitespace() || c.is_ascii_control() || c == '/' || c == '\\' {
                return Err(TypeError::InvalidRevisionId(format!(
                    "revision id cannot contain '{}'",
                    c.escape_default()
                )));
            }
        }
        Ok(Self(id))
    }

    /// Get the revision id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RevisionId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RevisionId> for String {
    fn from(id: RevisionId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RevisionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated environment name.
///
/// Environment names (dev, staging, prod, ...) follow the same shape as
/// package names: lowercase ASCII alphanumerics with interior `-`/`_`.
///
/// # Example
///
/// ```
/// use shiplock::core::types::EnvName;
///
/// let env = EnvName::new("prod").unwrap();
/// assert_eq!(env.as_str(), "prod");
///
/// assert!(EnvName::new("").is_err());
/// assert!(EnvName::new("Prod").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EnvName(String);

impl EnvName {
    /// Create a new validated environment name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidEnvName` if the name is empty or contains
    /// anything besides lowercase alphanumerics and interior `-`/`_`.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TypeError::InvalidEnvName(
                "environment name cannot be empty".into(),
            ));
        }
        for c in name.chars() {
            let ok = c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_';
            if !ok {
                return Err(TypeError::InvalidEnvName(format!(
                    "environment name cannot contain '{c}'"
                )));
            }
        }
        if name.starts_with(['-', '_']) || name.ends_with(['-', '_']) {
            return Err(TypeError::InvalidEnvName(
                "environment name cannot start or end with a separator".into(),
            ));
        }
        Ok(Self(name))
    }

    /// Get the environment name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EnvName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<EnvName> for String {
    fn from(name: EnvName) -> Self {
        name.0
    }
}

impl AsRef<str> for EnvName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EnvName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique release identifier.
///
/// Generated as a UUID v4 when a release is cut; accepted from strings
/// when referenced on the command line or in stored records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReleaseId(String);

impl ReleaseId {
    /// Generate a new unique release id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Create a release id from an existing string.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidReleaseId` if the string is empty or
    /// contains whitespace or path separators.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::InvalidReleaseId(
                "release id cannot be empty".into(),
            ));
        }
        for c in id.chars() {
            if c.is_whitespace() || c.is_ascii_control() || c == '/' || c == '\\' {
                return Err(TypeError::InvalidReleaseId(format!(
                    "release id cannot contain '{}'",
                    c.escape_default()
                )));
            }
        }
        Ok(Self(id))
    }

    /// Get the release id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get an abbreviated form for display.
    pub fn short(&self) -> &str {
        let end = 8.min(self.0.len());
        &self.0[..end]
    }
}

impl TryFrom<String> for ReleaseId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ReleaseId> for String {
    fn from(id: ReleaseId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A content-addressed lock artifact identifier.
///
/// The id is `sha256:<hex>` computed over the lock graph's sorted
/// `(name, version)` pairs, so identical graphs always share an id and
/// the id doubles as an integrity check.
///
/// # Example
///
/// ```
/// use semver::Version;
/// use shiplock::core::types::{ArtifactId, PackageName};
///
/// let pins = vec![
///     (PackageName::new("numpy").unwrap(), Version::new(1, 24, 0)),
///     (PackageName::new("requests").unwrap(), Version::new(2, 28, 0)),
/// ];
///
/// let id = ArtifactId::compute(&pins);
/// assert!(id.as_str().starts_with("sha256:"));
///
/// // Same pins produce the same id, regardless of input order
/// let mut reversed = pins.clone();
/// reversed.reverse();
/// assert_eq!(id, ArtifactId::compute(&reversed));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId(String);

impl ArtifactId {
    const PREFIX: &'static str = "sha256:";

    /// Compute an artifact id from a set of (name, version) pins.
    ///
    /// The pins are sorted by package name before hashing to ensure
    /// determinism regardless of input order.
    pub fn compute(pins: &[(PackageName, semver::Version)]) -> Self {
        let mut sorted: Vec<_> = pins.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut hasher = Sha256::new();
        for (name, version) in sorted {
            hasher.update(name.as_str().as_bytes());
            hasher.update(b"\0");
            hasher.update(version.to_string().as_bytes());
            hasher.update(b"\n");
        }

        let result = hasher.finalize();
        Self(format!("{}{}", Self::PREFIX, hex::encode(result)))
    }

    /// Parse an artifact id from its `sha256:<hex>` form.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidArtifactId` if the prefix is missing or
    /// the digest is not 64 hex characters.
    pub fn parse(s: impl Into<String>) -> Result<Self, TypeError> {
        let s = s.into();
        let digest = s.strip_prefix(Self::PREFIX).ok_or_else(|| {
            TypeError::InvalidArtifactId("artifact id must start with 'sha256:'".into())
        })?;
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidArtifactId(
                "artifact digest must be 64 hex characters".into(),
            ));
        }
        Ok(Self(format!(
            "{}{}",
            Self::PREFIX,
            digest.to_ascii_lowercase()
        )))
    }

    /// Get the artifact id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The hex digest without the `sha256:` prefix.
    pub fn digest(&self) -> &str {
        &self.0[Self::PREFIX.len()..]
    }

    /// Get an abbreviated form for display.
    pub fn short(&self) -> String {
        format!("{}{}", Self::PREFIX, &self.digest()[..12])
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<ArtifactId> for String {
    fn from(id: ArtifactId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A UTC timestamp in RFC3339 format.
///
/// # Example
///
/// ```
/// use shiplock::core::types::UtcTimestamp;
///
/// let now = UtcTimestamp::now();
/// println!("Current time: {}", now);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }

    /// Create a timestamp from a chrono DateTime.
    pub fn from_datetime(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self(dt)
    }

    /// Get the underlying datetime.
    pub fn as_datetime(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.0
    }

    /// This timestamp shifted forward by `secs` seconds.
    pub fn plus_secs(&self, secs: u64) -> Self {
        Self(self.0 + chrono::Duration::seconds(secs as i64))
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
