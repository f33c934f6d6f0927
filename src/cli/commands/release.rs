//! Release commands: cut and list immutable releases.

use anyhow::Result;

use crate::core::types::{ArtifactId, UtcTimestamp};
use crate::engine::{Context, Event, Ledger};
use crate::store::{LockStore, ReleaseStore};
use crate::ui::output::{self, Verbosity};

/// Cut a release binding a source ref to a recorded lock artifact.
pub fn release_create(ctx: &Context, source_ref: &str, artifact: &str) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let artifact = ArtifactId::parse(artifact)?;

    // The artifact must already be recorded; a release never points at
    // a graph the store has not seen.
    LockStore::new(&ctx.paths).fetch(&artifact)?;

    let release = ReleaseStore::new(&ctx.paths).create(source_ref, artifact.clone())?;
    Ledger::new(&ctx.paths).append(&Event::ReleaseCreated {
        release: release.id.clone(),
        source_ref: source_ref.to_string(),
        artifact,
        at: UtcTimestamp::now(),
    })?;

    output::print(
        format!("created release from {source_ref}"),
        verbosity,
    );
    println!("{}", release.id);
    Ok(())
}

/// List all releases, oldest first.
pub fn release_list(ctx: &Context) -> Result<()> {
    let releases = ReleaseStore::new(&ctx.paths).list()?;
    for release in releases {
        println!(
            "{}  {}  {}  {}",
            release.id,
            release.lock_artifact.short(),
            release.created_at,
            release.source_ref
        );
    }
    Ok(())
}
