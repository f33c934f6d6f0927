//! Catalog commands: record and inspect platform revisions.

use std::path::Path;

use anyhow::{Context as _, Result};

use crate::core::catalog::{parse_pins, CatalogRevision, VersionCatalog};
use crate::core::types::{RevisionId, UtcTimestamp};
use crate::engine::{Context, Event, Ledger};
use crate::ui::output::{self, Verbosity};

/// Record a new platform revision from a pins file.
pub fn catalog_add(ctx: &Context, revision: &str, pins_path: &Path) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let id = RevisionId::new(revision)?;

    let text = std::fs::read_to_string(pins_path)
        .with_context(|| format!("failed to read pins file '{}'", pins_path.display()))?;
    let pairs = parse_pins(&text)?;
    let revision = CatalogRevision::from_pairs(id.clone(), pairs);
    let entries = revision.len();

    let path = ctx.paths.catalog_path();
    let mut catalog = VersionCatalog::load(&path)?;
    catalog.ingest(revision)?;
    catalog.save(&path)?;

    Ledger::new(&ctx.paths).append(&Event::CatalogRevisionRecorded {
        revision: id.clone(),
        entries,
        at: UtcTimestamp::now(),
    })?;

    output::print(
        format!("recorded catalog revision '{id}' ({entries} entries)"),
        verbosity,
    );
    Ok(())
}

/// Show one catalog revision (latest when unspecified).
pub fn catalog_show(ctx: &Context, revision: Option<&str>) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let catalog = VersionCatalog::load(&ctx.paths.catalog_path())?;

    let id = revision.map(RevisionId::new).transpose()?;
    let revision = catalog.active(id.as_ref())?;

    output::print(
        format!(
            "revision '{}' ({} entries, recorded {})",
            revision.id,
            revision.len(),
            revision.recorded_at
        ),
        verbosity,
    );
    for (name, version) in &revision.entries {
        println!("  {name}=={version}");
    }
    Ok(())
}
