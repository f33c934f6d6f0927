//! Environment commands: create, list, and inspect binding records.

use anyhow::Result;

use crate::core::config::RiskTier;
use crate::core::types::EnvName;
use crate::engine::Context;
use crate::store::{Binding, EnvStore};
use crate::ui::output::{self, Verbosity};

/// Create an empty environment record.
pub fn env_create(ctx: &Context, name: &str) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let name = EnvName::new(name)?;
    EnvStore::new(&ctx.paths).create(&name)?;
    output::print(format!("created environment '{name}'"), verbosity);
    Ok(())
}

/// List all environments.
pub fn env_list(ctx: &Context) -> Result<()> {
    for name in EnvStore::new(&ctx.paths).list()? {
        println!("{name}");
    }
    Ok(())
}

/// Show an environment's bindings and active promotion.
pub fn env_show(ctx: &Context, name: &str) -> Result<()> {
    let name = EnvName::new(name)?;
    let record = EnvStore::new(&ctx.paths).read(&name)?;
    let tier = match ctx.config.risk_tier(&name) {
        RiskTier::Low => "low",
        RiskTier::High => "high",
    };

    println!("environment: {name}");
    println!("risk tier:   {tier}");
    println!("current:     {}", describe(&record.current));
    println!("previous:    {}", describe(&record.previous));
    println!("traffic:     {}%", record.traffic_split);
    if record.rolled_back {
        println!("rolled back: yes");
    }

    if let Some(active) = ctx.engine().active(&name)? {
        println!(
            "active promotion: {} ({}), requested by {}",
            active.release.short(),
            active.state,
            active.requested_by
        );
        if let Some(deadline) = &active.gate_deadline {
            println!("gate deadline:    {deadline}");
        }
    }
    Ok(())
}

fn describe(binding: &Option<Binding>) -> String {
    match binding {
        Some(b) => format!("{} ({})", b.release.short(), b.lock_artifact.short()),
        None => "none".to_string(),
    }
}
