//! Property-based tests for resolution and core domain types.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use std::collections::BTreeSet;

use proptest::prelude::*;
use semver::Version;

use shiplock::core::catalog::CatalogRevision;
use shiplock::core::constraint::{compile, PackageRequirement, VersionConstraint};
use shiplock::core::types::{ArtifactId, PackageName, RevisionId};
use shiplock::resolver::{resolve, InMemoryRegistry, ResolveError};

/// Strategy for small semver versions.
fn version() -> impl Strategy<Value = Version> {
    (0u64..4, 0u64..6, 0u64..6).prop_map(|(ma, mi, pa)| Version::new(ma, mi, pa))
}

/// Strategy for a pool of distinct package names.
fn package_pool() -> Vec<PackageName> {
    ["liba", "libb", "libc", "libd"]
        .iter()
        .map(|n| PackageName::new(*n).unwrap())
        .collect()
}

/// Strategy for a registry over the pool: each package gets a nonempty
/// set of published versions with no dependencies.
fn registry_strategy() -> impl Strategy<Value = Vec<(PackageName, Vec<Version>)>> {
    let pool = package_pool();
    pool.into_iter()
        .map(|name| {
            prop::collection::btree_set(version(), 1..6)
                .prop_map(move |set| (name.clone(), set.into_iter().collect::<Vec<_>>()))
        })
        .collect::<Vec<_>>()
}

fn build_registry(entries: &[(PackageName, Vec<Version>)]) -> InMemoryRegistry {
    let mut registry = InMemoryRegistry::new();
    for (name, versions) in entries {
        for v in versions {
            registry.publish(name.clone(), v.clone(), vec![]);
        }
    }
    registry
}

proptest! {
    // =========================================================================
    // Artifact ids
    // =========================================================================

    #[test]
    fn artifact_id_ignores_pin_order(
        versions in prop::collection::vec(version(), 4),
        seed in 0usize..24,
    ) {
        let pool = package_pool();
        let pins: Vec<(PackageName, Version)> =
            pool.into_iter().zip(versions).collect();

        // A deterministic permutation driven by the seed.
        let mut shuffled = pins.clone();
        let len = shuffled.len();
        for i in 0..len {
            shuffled.swap(i, (seed + i * 7) % len);
        }

        prop_assert_eq!(ArtifactId::compute(&pins), ArtifactId::compute(&shuffled));
    }

    #[test]
    fn artifact_id_changes_with_any_version(
        versions in prop::collection::vec(version(), 4),
        bump in 0usize..4,
    ) {
        let pool = package_pool();
        let pins: Vec<(PackageName, Version)> =
            pool.into_iter().zip(versions).collect();

        let mut changed = pins.clone();
        changed[bump].1.patch += 1;
        prop_assert_ne!(ArtifactId::compute(&pins), ArtifactId::compute(&changed));
    }

    // =========================================================================
    // Constraint grammar
    // =========================================================================

    #[test]
    fn constraint_display_parse_roundtrip(a in version(), b in version()) {
        let mut constraints = vec![
            VersionConstraint::Any,
            VersionConstraint::Exact(a.clone()),
            VersionConstraint::AtMost(a.clone()),
        ];
        if a < b {
            constraints.push(VersionConstraint::Range {
                min: a.clone(),
                max: b.clone(),
            });
        }
        for c in constraints {
            let parsed = VersionConstraint::parse(&c.to_string()).unwrap();
            prop_assert_eq!(parsed, c);
        }
    }

    #[test]
    fn satisfies_matches_range_arithmetic(v in version(), lo in version(), hi in version()) {
        prop_assume!(lo < hi);
        let range = VersionConstraint::Range { min: lo.clone(), max: hi.clone() };
        prop_assert_eq!(range.satisfies(&v), v >= lo && v < hi);
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    #[test]
    fn resolution_is_deterministic(entries in registry_strategy()) {
        let registry = build_registry(&entries);
        let direct: Vec<PackageRequirement> = entries
            .iter()
            .map(|(name, _)| PackageRequirement::new(name.clone(), VersionConstraint::Any))
            .collect();
        let revision = CatalogRevision::from_pairs(RevisionId::new("r1").unwrap(), vec![]);
        let set = compile(&revision, &direct).unwrap();

        let first = resolve(&set, &registry).unwrap();
        let second = resolve(&set, &registry).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.content_hash(), second.content_hash());
    }

    #[test]
    fn resolution_picks_highest_published(entries in registry_strategy()) {
        let registry = build_registry(&entries);
        let direct: Vec<PackageRequirement> = entries
            .iter()
            .map(|(name, _)| PackageRequirement::new(name.clone(), VersionConstraint::Any))
            .collect();
        let revision = CatalogRevision::from_pairs(RevisionId::new("r1").unwrap(), vec![]);
        let set = compile(&revision, &direct).unwrap();

        let graph = resolve(&set, &registry).unwrap();
        for (name, versions) in &entries {
            let highest = versions.iter().max().unwrap();
            prop_assert_eq!(&graph.pins[name], highest);
        }
    }

    #[test]
    fn pins_never_exceed_platform_ceilings(
        entries in registry_strategy(),
        ceiling in version(),
    ) {
        let registry = build_registry(&entries);
        let direct: Vec<PackageRequirement> = entries
            .iter()
            .map(|(name, _)| PackageRequirement::new(name.clone(), VersionConstraint::Any))
            .collect();

        // Every package in the pool is shipped by the platform at `ceiling`.
        let shipped: Vec<(PackageName, Version)> = entries
            .iter()
            .map(|(name, _)| (name.clone(), ceiling.clone()))
            .collect();
        let revision =
            CatalogRevision::from_pairs(RevisionId::new("r1").unwrap(), shipped);
        let set = compile(&revision, &direct).unwrap();

        match resolve(&set, &registry) {
            Ok(graph) => {
                for (name, version) in &graph.pins {
                    prop_assert!(version <= &ceiling, "{name} pinned above ceiling");
                    let published: BTreeSet<&Version> =
                        entries.iter().find(|(n, _)| n == name).unwrap().1.iter().collect();
                    prop_assert!(published.contains(version));
                }
            }
            Err(ResolveError::Conflict(report)) => {
                // Legitimate only when nothing under the ceiling exists.
                let versions = &entries
                    .iter()
                    .find(|(n, _)| n == &report.package)
                    .unwrap()
                    .1;
                prop_assert!(versions.iter().all(|v| v > &ceiling));
            }
            Err(other) => panic!("unexpected resolution error: {other}"),
        }
    }
}
