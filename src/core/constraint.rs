//! core::constraint
//!
//! Version constraint grammar and the constraint compiler.
//!
//! # Architecture
//!
//! A [`VersionConstraint`] is one of four shapes parsed from a small
//! grammar: exact (`==1.2.3`), ceiling (`<=1.2.3`), range
//! (`>=1.0.0,<2.0.0`, inclusive lower / exclusive upper), or
//! unconstrained (`*` or empty). [`compile`] folds a platform revision and
//! a set of direct requirements into a [`ConstraintSet`]: every catalog
//! entry contributes a ceiling, direct requirements overlay it, and the
//! output is ordered lexicographically by name so equal inputs produce
//! byte-equal sets.
//!
//! # Invariants
//!
//! - Direct requirements may tighten a catalog ceiling, never widen it
//! - An exact requirement above the ceiling fails at compile time with
//!   `CeilingExceeded` (a platform revision bump is the only way out)
//! - Compilation is pure and deterministic

use std::collections::BTreeMap;
use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::catalog::CatalogRevision;
use crate::core::types::{PackageName, RevisionId, TypeError};

/// Errors from constraint parsing and compilation.
#[derive(Debug, Error)]
pub enum ConstraintError {
    /// A requirement expression did not match the grammar.
    #[error("malformed requirement '{input}': {reason}")]
    MalformedRequirement { input: String, reason: String },

    /// A direct requirement demands a version above the platform ceiling.
    #[error(
        "'{name}' requires {requested} but the platform revision ceiling is {ceiling}; \
         a platform revision bump is required"
    )]
    CeilingExceeded {
        name: PackageName,
        requested: Version,
        ceiling: Version,
    },

    /// Identifier validation failed.
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// A single version constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VersionConstraint {
    /// Any version satisfies.
    Any,
    /// Exactly this version.
    Exact(Version),
    /// This version or lower.
    AtMost(Version),
    /// At least `min`, strictly below `max`.
    Range { min: Version, max: Version },
}

impl VersionConstraint {
    /// Parse a constraint expression.
    ///
    /// Grammar: `==V` (or `=V`), `<=V`, `>=A,<B`, `*` or empty.
    ///
    /// # Example
    ///
    /// ```
    /// use shiplock::core::constraint::VersionConstraint;
    /// use semver::Version;
    ///
    /// let c = VersionConstraint::parse("<=1.26.0").unwrap();
    /// assert!(c.satisfies(&Version::new(1, 24, 0)));
    /// assert!(!c.satisfies(&Version::new(1, 27, 0)));
    /// ```
    pub fn parse(input: &str) -> Result<Self, ConstraintError> {
        let expr = input.trim();
        let malformed = |reason: &str| ConstraintError::MalformedRequirement {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if expr.is_empty() || expr == "*" {
            return Ok(Self::Any);
        }

        if let Some(rest) = expr.strip_prefix("==").or_else(|| {
            // Single '=' is accepted as a convenience, but '=<' etc. is not.
            expr.strip_prefix('=').filter(|r| !r.starts_with(['<', '>']))
        }) {
            let version = Version::parse(rest.trim())
                .map_err(|e| malformed(&format!("bad version: {e}")))?;
            return Ok(Self::Exact(version));
        }

        if let Some(rest) = expr.strip_prefix("<=") {
            let version = Version::parse(rest.trim())
                .map_err(|e| malformed(&format!("bad version: {e}")))?;
            return Ok(Self::AtMost(version));
        }

        if let Some(rest) = expr.strip_prefix(">=") {
            let (lo, hi) = rest
                .split_once(',')
                .ok_or_else(|| malformed("range requires '>=A,<B'"))?;
            let min = Version::parse(lo.trim())
                .map_err(|e| malformed(&format!("bad lower bound: {e}")))?;
            let hi = hi.trim();
            let hi = hi
                .strip_prefix('<')
                .ok_or_else(|| malformed("range upper bound must start with '<'"))?;
            if hi.starts_with('=') {
                return Err(malformed("range upper bound is exclusive; use '<B'"));
            }
            let max = Version::parse(hi.trim())
                .map_err(|e| malformed(&format!("bad upper bound: {e}")))?;
            if min >= max {
                return Err(malformed("empty range: lower bound must be below upper"));
            }
            return Ok(Self::Range { min, max });
        }

        Err(malformed(
            "expected '==V', '<=V', '>=A,<B', '*', or empty",
        ))
    }

    /// Whether `version` satisfies this constraint.
    pub fn satisfies(&self, version: &Version) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(v) => version == v,
            Self::AtMost(v) => version <= v,
            Self::Range { min, max } => version >= min && version < max,
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Exact(v) => write!(f, "=={v}"),
            Self::AtMost(v) => write!(f, "<={v}"),
            Self::Range { min, max } => write!(f, ">={min},<{max}"),
        }
    }
}

impl TryFrom<String> for VersionConstraint {
    type Error = ConstraintError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<VersionConstraint> for String {
    fn from(c: VersionConstraint) -> Self {
        c.to_string()
    }
}

/// A direct requirement: a package name with a constraint on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRequirement {
    pub name: PackageName,
    pub constraint: VersionConstraint,
}

impl PackageRequirement {
    pub fn new(name: PackageName, constraint: VersionConstraint) -> Self {
        Self { name, constraint }
    }

    /// Parse a requirement line: a package name immediately followed by an
    /// optional constraint expression (`numpy<=1.26.0`, `requests`, `flask==2.0.1`).
    pub fn parse(line: &str) -> Result<Self, ConstraintError> {
        let line = line.trim();
        let split = line
            .find(|c: char| ['=', '<', '>', '*'].contains(&c) || c.is_whitespace())
            .unwrap_or(line.len());
        let (name, expr) = line.split_at(split);
        let name = PackageName::new(name)?;
        let constraint = VersionConstraint::parse(expr)?;
        Ok(Self { name, constraint })
    }
}

impl fmt::Display for PackageRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            VersionConstraint::Any => write!(f, "{}", self.name),
            c => write!(f, "{}{}", self.name, c),
        }
    }
}

/// Parse a requirements file: one requirement per line, `#` comments and
/// blank lines skipped. Later declarations of the same name win.
pub fn parse_requirements(text: &str) -> Result<Vec<PackageRequirement>, ConstraintError> {
    let mut by_name: BTreeMap<PackageName, PackageRequirement> = BTreeMap::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let req = PackageRequirement::parse(line)?;
        by_name.insert(req.name.clone(), req);
    }
    Ok(by_name.into_values().collect())
}

/// One compiled entry: the effective ceiling and the direct constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledEntry {
    pub name: PackageName,
    /// Platform ceiling from the catalog, if the catalog ships this package.
    pub ceiling: Option<Version>,
    /// Direct requirement overlay, if the caller asked for this package.
    pub direct: Option<VersionConstraint>,
}

impl CompiledEntry {
    /// Whether `version` is acceptable under both ceiling and direct constraint.
    pub fn admits(&self, version: &Version) -> bool {
        if let Some(ceiling) = &self.ceiling {
            if version > ceiling {
                return false;
            }
        }
        match &self.direct {
            Some(c) => c.satisfies(version),
            None => true,
        }
    }
}

/// The compiled, deterministic constraint set.
///
/// Entries are keyed and iterated in lexicographic name order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSet {
    /// The platform revision this set was compiled against.
    pub revision: RevisionId,
    entries: BTreeMap<PackageName, CompiledEntry>,
}

impl ConstraintSet {
    pub fn get(&self, name: &PackageName) -> Option<&CompiledEntry> {
        self.entries.get(name)
    }

    /// The platform ceiling for a package, if any.
    pub fn ceiling(&self, name: &PackageName) -> Option<&Version> {
        self.entries.get(name).and_then(|e| e.ceiling.as_ref())
    }

    /// Names with a direct requirement, in order. These are the resolution roots.
    pub fn direct_roots(&self) -> impl Iterator<Item = &CompiledEntry> {
        self.entries.values().filter(|e| e.direct.is_some())
    }

    /// All entries in lexicographic name order.
    pub fn entries(&self) -> impl Iterator<Item = &CompiledEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One-line summary for lock provenance.
    pub fn summary(&self) -> String {
        let directs: Vec<String> = self
            .direct_roots()
            .map(|e| match &e.direct {
                Some(VersionConstraint::Any) | None => e.name.to_string(),
                Some(c) => format!("{}{}", e.name, c),
            })
            .collect();
        format!("revision {}; direct [{}]", self.revision, directs.join(", "))
    }
}

/// Compile a platform revision and direct requirements into a constraint set.
///
/// # Errors
///
/// `CeilingExceeded` when a direct requirement demands a version the
/// platform ceiling rules out: an exact version above the ceiling, or a
/// range whose lower bound is already above it.
pub fn compile(
    revision: &CatalogRevision,
    direct: &[PackageRequirement],
) -> Result<ConstraintSet, ConstraintError> {
    let mut entries: BTreeMap<PackageName, CompiledEntry> = BTreeMap::new();

    for (name, version) in &revision.entries {
        entries.insert(
            name.clone(),
            CompiledEntry {
                name: name.clone(),
                ceiling: Some(version.clone()),
                direct: None,
            },
        );
    }

    for req in direct {
        let entry = entries
            .entry(req.name.clone())
            .or_insert_with(|| CompiledEntry {
                name: req.name.clone(),
                ceiling: None,
                direct: None,
            });

        if let Some(ceiling) = &entry.ceiling {
            let demanded = match &req.constraint {
                VersionConstraint::Exact(v) if v > ceiling => Some(v),
                VersionConstraint::Range { min, .. } if min > ceiling => Some(min),
                _ => None,
            };
            if let Some(requested) = demanded {
                return Err(ConstraintError::CeilingExceeded {
                    name: req.name.clone(),
                    requested: requested.clone(),
                    ceiling: ceiling.clone(),
                });
            }
        }

        // Last declaration wins when the same name appears twice.
        entry.direct = Some(req.constraint.clone());
    }

    Ok(ConstraintSet {
        revision: revision.id.clone(),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::CatalogRevision;

    fn pkg(name: &str) -> PackageName {
        PackageName::new(name).unwrap()
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn revision(pairs: &[(&str, &str)]) -> CatalogRevision {
        CatalogRevision::from_pairs(
            RevisionId::new("r1").unwrap(),
            pairs.iter().map(|(n, ver)| (pkg(n), v(ver))).collect(),
        )
    }

    mod grammar {
        use super::*;

        #[test]
        fn exact_double_equals() {
            assert_eq!(
                VersionConstraint::parse("==1.2.3").unwrap(),
                VersionConstraint::Exact(v("1.2.3"))
            );
        }

        #[test]
        fn exact_single_equals() {
            assert_eq!(
                VersionConstraint::parse("=1.2.3").unwrap(),
                VersionConstraint::Exact(v("1.2.3"))
            );
        }

        #[test]
        fn ceiling() {
            assert_eq!(
                VersionConstraint::parse("<=1.26.0").unwrap(),
                VersionConstraint::AtMost(v("1.26.0"))
            );
        }

        #[test]
        fn range() {
            assert_eq!(
                VersionConstraint::parse(">=1.0.0,<2.0.0").unwrap(),
                VersionConstraint::Range {
                    min: v("1.0.0"),
                    max: v("2.0.0"),
                }
            );
        }

        #[test]
        fn wildcard_and_empty() {
            assert_eq!(VersionConstraint::parse("*").unwrap(), VersionConstraint::Any);
            assert_eq!(VersionConstraint::parse("").unwrap(), VersionConstraint::Any);
            assert_eq!(VersionConstraint::parse("  ").unwrap(), VersionConstraint::Any);
        }

        #[test]
        fn rejects_garbage() {
            for bad in ["~1.2.3", ">1.0.0", ">=1.0.0", ">=2.0.0,<1.0.0", "==one.two", "<=x"] {
                assert!(
                    matches!(
                        VersionConstraint::parse(bad),
                        Err(ConstraintError::MalformedRequirement { .. })
                    ),
                    "accepted {bad:?}"
                );
            }
        }

        #[test]
        fn rejects_inclusive_upper_bound() {
            assert!(VersionConstraint::parse(">=1.0.0,<=2.0.0").is_err());
        }

        #[test]
        fn display_roundtrip() {
            for expr in ["==1.2.3", "<=1.26.0", ">=1.0.0,<2.0.0", "*"] {
                let parsed = VersionConstraint::parse(expr).unwrap();
                assert_eq!(parsed.to_string(), expr);
            }
        }
    }

    mod satisfies {
        use super::*;

        #[test]
        fn exact_matches_only_itself() {
            let c = VersionConstraint::Exact(v("2.0.0"));
            assert!(c.satisfies(&v("2.0.0")));
            assert!(!c.satisfies(&v("2.0.1")));
        }

        #[test]
        fn at_most_is_inclusive() {
            let c = VersionConstraint::AtMost(v("1.26.0"));
            assert!(c.satisfies(&v("1.26.0")));
            assert!(c.satisfies(&v("1.24.0")));
            assert!(!c.satisfies(&v("1.26.1")));
        }

        #[test]
        fn range_half_open() {
            let c = VersionConstraint::Range {
                min: v("1.0.0"),
                max: v("2.0.0"),
            };
            assert!(c.satisfies(&v("1.0.0")));
            assert!(c.satisfies(&v("1.9.9")));
            assert!(!c.satisfies(&v("2.0.0")));
            assert!(!c.satisfies(&v("0.9.0")));
        }
    }

    mod requirement {
        use super::*;

        #[test]
        fn parses_name_with_constraint() {
            let req = PackageRequirement::parse("numpy<=1.26.0").unwrap();
            assert_eq!(req.name, pkg("numpy"));
            assert_eq!(req.constraint, VersionConstraint::AtMost(v("1.26.0")));
        }

        #[test]
        fn bare_name_is_unconstrained() {
            let req = PackageRequirement::parse("requests").unwrap();
            assert_eq!(req.constraint, VersionConstraint::Any);
        }

        #[test]
        fn tolerates_space_before_expr() {
            let req = PackageRequirement::parse("flask ==2.0.1").unwrap();
            assert_eq!(req.constraint, VersionConstraint::Exact(v("2.0.1")));
        }

        #[test]
        fn rejects_bad_name() {
            assert!(PackageRequirement::parse("NumPy==1.0.0").is_err());
        }
    }

    mod requirements_file {
        use super::*;

        #[test]
        fn last_declaration_wins() {
            let reqs =
                parse_requirements("numpy<=1.26.0\nnumpy==1.24.0\n").unwrap();
            assert_eq!(reqs.len(), 1);
            assert_eq!(reqs[0].constraint, VersionConstraint::Exact(v("1.24.0")));
        }

        #[test]
        fn skips_comments() {
            let reqs = parse_requirements("# direct deps\nnumpy\n\nrequests\n").unwrap();
            assert_eq!(reqs.len(), 2);
        }
    }

    mod compilation {
        use super::*;

        #[test]
        fn catalog_entry_becomes_ceiling() {
            let rev = revision(&[("numpy", "1.24.0")]);
            let set = compile(&rev, &[]).unwrap();
            assert_eq!(set.ceiling(&pkg("numpy")), Some(&v("1.24.0")));
        }

        #[test]
        fn direct_tightens_never_widens() {
            // Catalog ships numpy 1.24.0; asking for <=1.26.0 keeps the
            // effective ceiling at 1.24.0.
            let rev = revision(&[("numpy", "1.24.0")]);
            let reqs = vec![PackageRequirement::parse("numpy<=1.26.0").unwrap()];
            let set = compile(&rev, &reqs).unwrap();

            let entry = set.get(&pkg("numpy")).unwrap();
            assert!(entry.admits(&v("1.24.0")));
            assert!(!entry.admits(&v("1.25.0")));
        }

        #[test]
        fn exact_above_ceiling_fails() {
            let rev = revision(&[("numpy", "1.24.0")]);
            let reqs = vec![PackageRequirement::parse("numpy==1.26.0").unwrap()];

            match compile(&rev, &reqs) {
                Err(ConstraintError::CeilingExceeded {
                    name,
                    requested,
                    ceiling,
                }) => {
                    assert_eq!(name, pkg("numpy"));
                    assert_eq!(requested, v("1.26.0"));
                    assert_eq!(ceiling, v("1.24.0"));
                }
                other => panic!("expected CeilingExceeded, got {other:?}"),
            }
        }

        #[test]
        fn range_floor_above_ceiling_fails() {
            let rev = revision(&[("numpy", "1.24.0")]);
            let reqs = vec![PackageRequirement::parse("numpy>=1.25.0,<2.0.0").unwrap()];
            assert!(matches!(
                compile(&rev, &reqs),
                Err(ConstraintError::CeilingExceeded { .. })
            ));
        }

        #[test]
        fn uncatalogued_name_passes_through() {
            let rev = revision(&[("numpy", "1.24.0")]);
            let reqs = vec![PackageRequirement::parse("leftpad==9.9.9").unwrap()];
            let set = compile(&rev, &reqs).unwrap();

            let entry = set.get(&pkg("leftpad")).unwrap();
            assert!(entry.ceiling.is_none());
            assert!(entry.admits(&v("9.9.9")));
        }

        #[test]
        fn output_is_deterministic() {
            let rev = revision(&[("zlib", "1.3.0"), ("numpy", "1.24.0")]);
            let reqs = vec![
                PackageRequirement::parse("requests").unwrap(),
                PackageRequirement::parse("numpy<=1.26.0").unwrap(),
            ];

            let a = compile(&rev, &reqs).unwrap();
            let b = compile(&rev, &reqs).unwrap();
            assert_eq!(a, b);

            let names: Vec<String> =
                a.entries().map(|e| e.name.to_string()).collect();
            let mut sorted = names.clone();
            sorted.sort();
            assert_eq!(names, sorted);
        }

        #[test]
        fn direct_roots_excludes_pure_catalog_entries() {
            let rev = revision(&[("numpy", "1.24.0"), ("zlib", "1.3.0")]);
            let reqs = vec![PackageRequirement::parse("numpy").unwrap()];
            let set = compile(&rev, &reqs).unwrap();

            let roots: Vec<&PackageName> =
                set.direct_roots().map(|e| &e.name).collect();
            assert_eq!(roots, vec![&pkg("numpy")]);
        }
    }
}
