//! The audit command: render the ledger.

use anyhow::Result;

use crate::core::types::EnvName;
use crate::engine::{Context, Ledger};

/// Print ledger events, oldest first.
pub fn audit(ctx: &Context, env: Option<&str>, limit: Option<usize>) -> Result<()> {
    let ledger = Ledger::new(&ctx.paths);
    let events = match env {
        Some(name) => ledger.read_env(&EnvName::new(name)?)?,
        None => ledger.read_all()?,
    };

    let skip = limit.map_or(0, |n| events.len().saturating_sub(n));
    for event in events.iter().skip(skip) {
        println!("{}  {}", event.at(), event.describe());
    }
    Ok(())
}
