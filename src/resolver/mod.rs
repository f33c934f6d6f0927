//! resolver
//!
//! Deterministic dependency resolution against a compiled constraint set.
//!
//! # Architecture
//!
//! Resolution is a worklist fixpoint. Each package accumulates a list of
//! constraint origins (the direct requirement, the platform ceiling, and
//! one entry per requiring package-version). Selection picks the highest
//! published version admissible under every origin; when a later origin
//! invalidates an earlier selection, the package re-enters the worklist
//! and is re-selected against the full list. The worklist is BTree-ordered
//! so equal inputs resolve identically.
//!
//! # Invariants
//!
//! - Pure: no side effects beyond registry reads
//! - No partial success: the first unsatisfiable package aborts resolution
//!   with a [`ConflictReport`] naming every requester
//! - Every pin respects the platform ceiling for its name
//! - Co-dependent packages are admitted but tagged in `allowed_cycles`
//!
//! # Example
//!
//! ```
//! use shiplock::core::catalog::CatalogRevision;
//! use shiplock::core::constraint::{compile, PackageRequirement};
//! use shiplock::core::types::{PackageName, RevisionId};
//! use shiplock::resolver::{resolve, InMemoryRegistry};
//! use semver::Version;
//!
//! let mut registry = InMemoryRegistry::new();
//! registry.publish(PackageName::new("leftpad").unwrap(), Version::new(1, 0, 0), vec![]);
//!
//! let revision = CatalogRevision::from_pairs(RevisionId::new("r1").unwrap(), vec![]);
//! let set = compile(&revision, &[PackageRequirement::parse("leftpad").unwrap()]).unwrap();
//!
//! let graph = resolve(&set, &registry).unwrap();
//! assert_eq!(graph.pins.len(), 1);
//! ```

pub mod registry;

pub use registry::{InMemoryRegistry, PackageRegistry, RegistryError};

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::core::constraint::{ConstraintSet, VersionConstraint};
use crate::core::types::{ArtifactId, PackageName};

/// Version of the resolution algorithm, recorded in lock provenance.
pub const RESOLVER_VERSION: &str = "1";

/// Hard cap on worklist steps. Hitting it indicates a selection
/// oscillation rather than a legitimate resolution.
const MAX_STEPS: usize = 100_000;

/// Errors from resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No version of a package satisfies all of its requesters.
    #[error("{0}")]
    Conflict(Box<ConflictReport>),

    /// The registry collaborator failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Re-selection failed to reach a fixpoint.
    #[error("resolution did not converge while selecting '{package}'")]
    NoConvergence { package: PackageName },
}

/// Who demanded a constraint on a package.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requester {
    /// A direct requirement from the caller.
    Direct,
    /// The platform revision ceiling.
    Platform,
    /// A selected package's own declared requirement.
    Package { name: PackageName, version: Version },
}

impl fmt::Display for Requester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct requirement"),
            Self::Platform => write!(f, "platform revision"),
            Self::Package { name, version } => write!(f, "{name}@{version}"),
        }
    }
}

/// One accumulated constraint with its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintOrigin {
    pub requester: Requester,
    pub constraint: VersionConstraint,
}

/// Why a package could not be resolved: every requester and the
/// constraint it demanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictReport {
    pub package: PackageName,
    /// Every requester with its constraint, in deterministic order.
    pub requirements: Vec<ConstraintOrigin>,
    /// How many published versions were considered.
    pub candidates: usize,
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.candidates == 0 {
            writeln!(
                f,
                "no published versions of '{}' found in the registry",
                self.package
            )?;
        } else {
            writeln!(
                f,
                "no version of '{}' satisfies all requesters ({} candidates considered):",
                self.package, self.candidates
            )?;
        }
        for origin in &self.requirements {
            let constraint = match &origin.constraint {
                VersionConstraint::Any => String::new(),
                c => c.to_string(),
            };
            writeln!(
                f,
                "  {} requires {}{}",
                origin.requester, self.package, constraint
            )?;
        }
        Ok(())
    }
}

/// The immutable output of a successful resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockGraph {
    /// Exact pinned version per package, lexicographically ordered.
    pub pins: BTreeMap<PackageName, Version>,
    /// Requires relationships, for explanation only.
    pub edges: BTreeMap<PackageName, BTreeSet<PackageName>>,
    /// Strongly connected groups of co-dependent packages.
    pub allowed_cycles: Vec<BTreeSet<PackageName>>,
}

impl LockGraph {
    /// Content hash over the sorted pin list. Two resolutions agreeing on
    /// pins hash identically regardless of edge discovery order.
    pub fn content_hash(&self) -> ArtifactId {
        let pairs: Vec<(PackageName, Version)> = self
            .pins
            .iter()
            .map(|(n, v)| (n.clone(), v.clone()))
            .collect();
        ArtifactId::compute(&pairs)
    }
}

/// Resolve a compiled constraint set against a registry.
///
/// # Errors
///
/// [`ResolveError::Conflict`] as soon as any package has no admissible
/// version; [`ResolveError::Registry`] on collaborator failure.
pub fn resolve<R: PackageRegistry>(
    constraints: &ConstraintSet,
    registry: &R,
) -> Result<LockGraph, ResolveError> {
    Resolution::new(constraints, registry).run()
}

struct Resolution<'a, R: PackageRegistry> {
    constraints: &'a ConstraintSet,
    registry: &'a R,
    origins: BTreeMap<PackageName, Vec<ConstraintOrigin>>,
    pins: BTreeMap<PackageName, Version>,
    edges: BTreeMap<PackageName, BTreeSet<PackageName>>,
    pending: BTreeSet<PackageName>,
}

impl<'a, R: PackageRegistry> Resolution<'a, R> {
    fn new(constraints: &'a ConstraintSet, registry: &'a R) -> Self {
        Self {
            constraints,
            registry,
            origins: BTreeMap::new(),
            pins: BTreeMap::new(),
            edges: BTreeMap::new(),
            pending: BTreeSet::new(),
        }
    }

    fn run(mut self) -> Result<LockGraph, ResolveError> {
        for entry in self.constraints.direct_roots() {
            let name = entry.name.clone();
            let direct = entry.direct.clone();
            let origins = self.seed(&name);
            if let Some(constraint) = direct {
                origins.push(ConstraintOrigin {
                    requester: Requester::Direct,
                    constraint,
                });
            }
            self.pending.insert(name);
        }

        let mut steps = 0usize;
        while let Some(name) = self.pending.pop_first() {
            steps += 1;
            if steps > MAX_STEPS {
                return Err(ResolveError::NoConvergence { package: name });
            }
            self.select(&name)?;
        }

        let allowed_cycles = cycles(&self.edges);
        Ok(LockGraph {
            pins: self.pins,
            edges: self.edges,
            allowed_cycles,
        })
    }

    /// Register a package, materializing its platform ceiling as an origin.
    fn seed(&mut self, name: &PackageName) -> &mut Vec<ConstraintOrigin> {
        let ceiling = self.constraints.ceiling(name).cloned();
        self.origins.entry(name.clone()).or_insert_with(|| {
            let mut origins = Vec::new();
            if let Some(ceiling) = ceiling {
                origins.push(ConstraintOrigin {
                    requester: Requester::Platform,
                    constraint: VersionConstraint::AtMost(ceiling),
                });
            }
            origins
        })
    }

    /// (Re-)select the best version for one package and propagate its
    /// requirements.
    fn select(&mut self, name: &PackageName) -> Result<(), ResolveError> {
        let origins = self.origins.get(name).cloned().unwrap_or_default();
        let mut candidates = self.registry.versions(name)?;
        candidates.sort();

        let admissible: Vec<Version> = candidates
            .iter()
            .filter(|v| origins.iter().all(|o| o.constraint.satisfies(v)))
            .cloned()
            .collect();

        let Some(best) = self.pick(name, &admissible) else {
            return Err(ResolveError::Conflict(Box::new(
                self.conflict(name, candidates.len()),
            )));
        };

        if self.pins.get(name) == Some(&best) {
            return Ok(());
        }

        debug!(package = %name, version = %best, "selected");
        self.retract(name);
        self.pins.insert(name.clone(), best.clone());

        let requires = self.registry.dependencies(name, &best)?;
        let mut targets = BTreeSet::new();
        for req in requires {
            targets.insert(req.name.clone());
            self.seed(&req.name).push(ConstraintOrigin {
                requester: Requester::Package {
                    name: name.clone(),
                    version: best.clone(),
                },
                constraint: req.constraint.clone(),
            });

            // A tightened set keeps the pin maximal as long as the pin
            // still satisfies it; only then is re-selection needed.
            let satisfied = self
                .pins
                .get(&req.name)
                .is_some_and(|pinned| req.constraint.satisfies(pinned));
            if !satisfied {
                self.pending.insert(req.name);
            }
        }
        self.edges.insert(name.clone(), targets);
        Ok(())
    }

    /// Highest-precedence admissible version; on precedence ties (build
    /// metadata differences) prefer the version the platform ships, then
    /// the lexically highest build.
    fn pick(&self, name: &PackageName, admissible: &[Version]) -> Option<Version> {
        let best = admissible.iter().max_by(|a, b| a.cmp_precedence(b))?;
        let tied: Vec<&Version> = admissible
            .iter()
            .filter(|v| v.cmp_precedence(best) == std::cmp::Ordering::Equal)
            .collect();
        if let Some(shipped) = self.constraints.ceiling(name) {
            if tied.iter().any(|&v| v == shipped) {
                return Some(shipped.clone());
            }
        }
        tied.into_iter().max().cloned()
    }

    /// Withdraw the constraints a previous selection of `name` contributed,
    /// and queue its former targets for re-selection.
    fn retract(&mut self, name: &PackageName) {
        let Some(old_targets) = self.edges.remove(name) else {
            return;
        };
        for target in old_targets {
            if let Some(origins) = self.origins.get_mut(&target) {
                origins.retain(|o| {
                    !matches!(&o.requester, Requester::Package { name: n, .. } if n == name)
                });
            }
            self.pending.insert(target);
        }
    }

    fn conflict(&self, name: &PackageName, candidates: usize) -> ConflictReport {
        let mut requirements = self.origins.get(name).cloned().unwrap_or_default();
        requirements.sort_by(|a, b| a.requester.cmp(&b.requester));
        ConflictReport {
            package: name.clone(),
            requirements,
            candidates,
        }
    }
}

/// Strongly connected components of size > 1 (or with a self-edge),
/// in deterministic order.
fn cycles(edges: &BTreeMap<PackageName, BTreeSet<PackageName>>) -> Vec<BTreeSet<PackageName>> {
    let mut nodes: BTreeSet<&PackageName> = edges.keys().collect();
    for targets in edges.values() {
        nodes.extend(targets.iter());
    }

    let mut reach: BTreeMap<&PackageName, BTreeSet<&PackageName>> = BTreeMap::new();
    for &node in &nodes {
        reach.insert(node, reachable(edges, node));
    }

    let mut assigned: BTreeSet<&PackageName> = BTreeSet::new();
    let mut components = Vec::new();
    for &node in &nodes {
        if assigned.contains(node) {
            continue;
        }
        let component: BTreeSet<&PackageName> = reach[node]
            .iter()
            .filter(|&&m| reach[m].contains(node))
            .copied()
            .collect();
        assigned.extend(component.iter().copied());

        let self_loop = component.len() == 1
            && edges.get(node).is_some_and(|succ| succ.contains(node));
        if component.len() > 1 || self_loop {
            components.push(component.into_iter().cloned().collect());
        }
    }
    components
}

/// All nodes reachable from `from`, including itself.
fn reachable<'a>(
    edges: &'a BTreeMap<PackageName, BTreeSet<PackageName>>,
    from: &'a PackageName,
) -> BTreeSet<&'a PackageName> {
    let mut seen: BTreeSet<&PackageName> = BTreeSet::new();
    seen.insert(from);
    let mut queue: VecDeque<&PackageName> = VecDeque::new();
    queue.push_back(from);
    while let Some(node) = queue.pop_front() {
        if let Some(succ) = edges.get(node) {
            for next in succ {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::CatalogRevision;
    use crate::core::constraint::{compile, PackageRequirement};
    use crate::core::types::RevisionId;

    fn pkg(name: &str) -> PackageName {
        PackageName::new(name).unwrap()
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn req(line: &str) -> PackageRequirement {
        PackageRequirement::parse(line).unwrap()
    }

    fn revision(pairs: &[(&str, &str)]) -> CatalogRevision {
        CatalogRevision::from_pairs(
            RevisionId::new("r1").unwrap(),
            pairs.iter().map(|(n, ver)| (pkg(n), v(ver))).collect(),
        )
    }

    fn constraints(catalog: &[(&str, &str)], direct: &[&str]) -> ConstraintSet {
        let rev = revision(catalog);
        let reqs: Vec<PackageRequirement> = direct.iter().map(|l| req(l)).collect();
        compile(&rev, &reqs).unwrap()
    }

    mod selection {
        use super::*;

        #[test]
        fn picks_highest_admissible() {
            let mut registry = InMemoryRegistry::new();
            registry.publish(pkg("liba"), v("1.0.0"), vec![]);
            registry.publish(pkg("liba"), v("1.5.0"), vec![]);
            registry.publish(pkg("liba"), v("2.0.0"), vec![]);

            let set = constraints(&[], &["liba<=1.5.0"]);
            let graph = resolve(&set, &registry).unwrap();
            assert_eq!(graph.pins[&pkg("liba")], v("1.5.0"));
        }

        #[test]
        fn ceiling_caps_selection() {
            // Catalog ships numpy 1.24.0; registry has newer versions.
            let mut registry = InMemoryRegistry::new();
            registry.publish(pkg("numpy"), v("1.24.0"), vec![]);
            registry.publish(pkg("numpy"), v("1.25.0"), vec![]);
            registry.publish(pkg("numpy"), v("1.26.0"), vec![]);

            let set = constraints(&[("numpy", "1.24.0")], &["numpy<=1.26.0"]);
            let graph = resolve(&set, &registry).unwrap();
            assert_eq!(graph.pins[&pkg("numpy")], v("1.24.0"));
        }

        #[test]
        fn build_metadata_tie_prefers_shipped_version() {
            let mut registry = InMemoryRegistry::new();
            registry.publish(pkg("liba"), v("1.0.0+vendor"), vec![]);
            registry.publish(pkg("liba"), v("1.0.0+zzz"), vec![]);

            let set = constraints(&[("liba", "1.0.0+vendor")], &["liba"]);
            let graph = resolve(&set, &registry).unwrap();
            assert_eq!(graph.pins[&pkg("liba")], v("1.0.0+vendor"));
        }

        #[test]
        fn transitive_closure_resolved() {
            let mut registry = InMemoryRegistry::new();
            registry.publish(pkg("app-core"), v("1.0.0"), vec![req("libx")]);
            registry.publish(pkg("libx"), v("0.3.0"), vec![req("liby<=2.0.0")]);
            registry.publish(pkg("liby"), v("1.9.0"), vec![]);
            registry.publish(pkg("liby"), v("2.5.0"), vec![]);

            let set = constraints(&[], &["app-core"]);
            let graph = resolve(&set, &registry).unwrap();
            assert_eq!(graph.pins.len(), 3);
            assert_eq!(graph.pins[&pkg("liby")], v("1.9.0"));
            assert!(graph.edges[&pkg("app-core")].contains(&pkg("libx")));
        }

        #[test]
        fn later_constraint_forces_reselection() {
            // libz resolves to 2.0.0 first, then libw's requirement
            // drags it down to 1.0.0.
            let mut registry = InMemoryRegistry::new();
            registry.publish(pkg("libz"), v("1.0.0"), vec![]);
            registry.publish(pkg("libz"), v("2.0.0"), vec![]);
            registry.publish(pkg("libw"), v("1.0.0"), vec![req("libz<=1.0.0")]);

            let set = constraints(&[], &["libz", "libw"]);
            let graph = resolve(&set, &registry).unwrap();
            assert_eq!(graph.pins[&pkg("libz")], v("1.0.0"));
        }
    }

    mod conflicts {
        use super::*;

        #[test]
        fn disjoint_exacts_name_both_requesters() {
            // libb wants liba 2.0.0, libc wants liba 3.0.0.
            let mut registry = InMemoryRegistry::new();
            registry.publish(pkg("liba"), v("2.0.0"), vec![]);
            registry.publish(pkg("liba"), v("3.0.0"), vec![]);
            registry.publish(pkg("libb"), v("1.0.0"), vec![req("liba==2.0.0")]);
            registry.publish(pkg("libc"), v("1.0.0"), vec![req("liba==3.0.0")]);

            let set = constraints(&[], &["libb", "libc"]);
            let err = resolve(&set, &registry).unwrap_err();
            let ResolveError::Conflict(report) = err else {
                panic!("expected conflict");
            };

            assert_eq!(report.package, pkg("liba"));
            let requesters: Vec<String> = report
                .requirements
                .iter()
                .map(|o| o.requester.to_string())
                .collect();
            assert!(requesters.iter().any(|r| r.starts_with("libb@")));
            assert!(requesters.iter().any(|r| r.starts_with("libc@")));
        }

        #[test]
        fn unknown_package_is_a_conflict() {
            let registry = InMemoryRegistry::new();
            let set = constraints(&[], &["ghost"]);
            let err = resolve(&set, &registry).unwrap_err();
            let ResolveError::Conflict(report) = err else {
                panic!("expected conflict");
            };
            assert_eq!(report.candidates, 0);
        }

        #[test]
        fn no_partial_success() {
            let mut registry = InMemoryRegistry::new();
            registry.publish(pkg("liba"), v("1.0.0"), vec![]);
            registry.publish(pkg("libb"), v("1.0.0"), vec![req("liba==2.0.0")]);

            let set = constraints(&[], &["liba", "libb"]);
            assert!(matches!(
                resolve(&set, &registry),
                Err(ResolveError::Conflict(_))
            ));
        }
    }

    mod determinism {
        use super::*;

        #[test]
        fn identical_inputs_identical_hashes() {
            let mut registry = InMemoryRegistry::new();
            registry.publish(pkg("liba"), v("1.0.0"), vec![req("libb"), req("libc")]);
            registry.publish(pkg("libb"), v("2.0.0"), vec![req("libc<=3.0.0")]);
            registry.publish(pkg("libc"), v("3.0.0"), vec![]);
            registry.publish(pkg("libc"), v("3.1.0"), vec![]);

            let set = constraints(&[("libc", "3.1.0")], &["liba"]);
            let a = resolve(&set, &registry).unwrap();
            let b = resolve(&set, &registry).unwrap();
            assert_eq!(a, b);
            assert_eq!(a.content_hash(), b.content_hash());
        }
    }

    mod cycle_tagging {
        use super::*;

        #[test]
        fn co_dependent_pair_tagged() {
            let mut registry = InMemoryRegistry::new();
            registry.publish(pkg("ping"), v("1.0.0"), vec![req("pong")]);
            registry.publish(pkg("pong"), v("1.0.0"), vec![req("ping")]);

            let set = constraints(&[], &["ping"]);
            let graph = resolve(&set, &registry).unwrap();

            assert_eq!(graph.allowed_cycles.len(), 1);
            let cycle = &graph.allowed_cycles[0];
            assert!(cycle.contains(&pkg("ping")));
            assert!(cycle.contains(&pkg("pong")));
        }

        #[test]
        fn acyclic_graph_has_no_cycles() {
            let mut registry = InMemoryRegistry::new();
            registry.publish(pkg("liba"), v("1.0.0"), vec![req("libb")]);
            registry.publish(pkg("libb"), v("1.0.0"), vec![]);

            let set = constraints(&[], &["liba"]);
            let graph = resolve(&set, &registry).unwrap();
            assert!(graph.allowed_cycles.is_empty());
        }

        #[test]
        fn self_dependency_tagged() {
            let mut registry = InMemoryRegistry::new();
            registry.publish(pkg("ouro"), v("1.0.0"), vec![req("ouro")]);

            let set = constraints(&[], &["ouro"]);
            let graph = resolve(&set, &registry).unwrap();
            assert_eq!(graph.allowed_cycles.len(), 1);
        }
    }
}
