//! The resolve command: requirements in, recorded lock artifact out.

use std::path::Path;

use anyhow::{bail, Context as _, Result};

use crate::core::catalog::VersionCatalog;
use crate::core::constraint::{self, parse_requirements};
use crate::core::types::{RevisionId, UtcTimestamp};
use crate::engine::{Context, Event, Ledger};
use crate::resolver::{self, InMemoryRegistry, ResolveError};
use crate::store::LockStore;
use crate::ui::output::{self, Verbosity};

/// Resolve a requirements file against a registry snapshot and record
/// the resulting lock artifact.
pub fn resolve(
    ctx: &Context,
    requirements_path: &Path,
    registry_path: &Path,
    revision: Option<&str>,
) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);

    let text = std::fs::read_to_string(requirements_path).with_context(|| {
        format!(
            "failed to read requirements file '{}'",
            requirements_path.display()
        )
    })?;
    let direct = parse_requirements(&text)?;

    let catalog = VersionCatalog::load(&ctx.paths.catalog_path())?;
    let id = revision.map(RevisionId::new).transpose()?;
    let revision = catalog.active(id.as_ref())?;

    let constraints = constraint::compile(revision, &direct)?;
    let registry = InMemoryRegistry::load(registry_path)?;

    let graph = match resolver::resolve(&constraints, &registry) {
        Ok(graph) => graph,
        Err(ResolveError::Conflict(report)) => {
            output::error(&report);
            bail!("resolution failed");
        }
        Err(other) => return Err(other.into()),
    };

    let artifact = LockStore::new(&ctx.paths).record(&graph, &constraints.summary())?;
    Ledger::new(&ctx.paths).append(&Event::LockRecorded {
        artifact: artifact.clone(),
        pins: graph.pins.len(),
        at: UtcTimestamp::now(),
    })?;

    output::print(
        format!("resolved {} packages against revision '{}'", graph.pins.len(), revision.id),
        verbosity,
    );
    if verbosity == Verbosity::Debug {
        for (name, version) in &graph.pins {
            eprintln!("  {name}=={version}");
        }
    }
    for cycle in &graph.allowed_cycles {
        let members: Vec<String> = cycle.iter().map(|n| n.to_string()).collect();
        output::warn(
            format!("dependency cycle pinned as a group: {}", members.join(", ")),
            verbosity,
        );
    }
    println!("{artifact}");
    Ok(())
}
