//! Promotion lifecycle commands: promote, gate, confirm, rollback,
//! cancel, check-timeouts.

use anyhow::{anyhow, Result};

use crate::core::config::RiskTier;
use crate::core::types::{EnvName, ReleaseId};
use crate::engine::{CanaryChoice, Context, Gate, GateOutcome, GateResult, RollbackOutcome};
use crate::ui::output::{self, Verbosity};

/// Propose promoting a release into an environment.
pub fn promote(
    ctx: &Context,
    release: &str,
    env: &str,
    requested_by: &str,
    canary: Option<u8>,
    no_canary: bool,
) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let release = ReleaseId::new(release)?;
    let env = EnvName::new(env)?;

    let choice = match (canary, no_canary) {
        (Some(pct), _) => CanaryChoice::Percent(pct),
        (None, true) => CanaryChoice::Disabled,
        (None, false) => CanaryChoice::Default,
    };

    if no_canary && ctx.config.risk_tier(&env) == RiskTier::High {
        output::warn(
            format!("'{env}' is a high-risk environment; skipping the canary stage"),
            verbosity,
        );
    }

    let record = ctx.engine().propose(&release, &env, requested_by, choice)?;
    output::print(
        format!(
            "proposed promotion of {} into '{env}' (awaiting {} gate)",
            release.short(),
            Gate::Unit
        ),
        verbosity,
    );
    match record.canary_percent {
        Some(pct) => output::print(format!("canary stage at {pct}% traffic"), verbosity),
        None => output::print("no canary stage; smoke pass deploys to full", verbosity),
    }
    Ok(())
}

/// Post a gate result for the active promotion.
pub fn gate(ctx: &Context, release: &str, env: &str, gate: &str, result: &str) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let release = ReleaseId::new(release)?;
    let env = EnvName::new(env)?;
    let gate: Gate = gate.parse().map_err(|e: String| anyhow!(e))?;
    let result: GateResult = result.parse().map_err(|e: String| anyhow!(e))?;

    let outcome = ctx.engine().signal_gate(&release, &env, gate, result)?;
    match outcome {
        GateOutcome::Advanced { next } => {
            output::print(format!("{gate} gate passed; awaiting {next}"), verbosity);
        }
        GateOutcome::DeployedCanary { percent } => {
            output::print(
                format!(
                    "all gates passed; {} serving {percent}% of '{env}' traffic",
                    release.short()
                ),
                verbosity,
            );
            output::print("confirm with 'spl confirm' or recover with 'spl rollback'", verbosity);
        }
        GateOutcome::DeployedFull => {
            output::print(
                format!("all gates passed; {} deployed to full in '{env}'", release.short()),
                verbosity,
            );
        }
        GateOutcome::Halted { gate, result } => {
            output::print(
                format!("promotion halted at {gate} gate ({result}); environment untouched"),
                verbosity,
            );
        }
    }
    Ok(())
}

/// Confirm a canary to full traffic.
pub fn confirm(ctx: &Context, env: &str) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let env = EnvName::new(env)?;
    let record = ctx.engine().confirm(&env)?;
    output::print(
        format!("{} confirmed to full traffic in '{env}'", record.release.short()),
        verbosity,
    );
    Ok(())
}

/// Roll an environment back to its previous full binding.
pub fn rollback(ctx: &Context, env: &str) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let env = EnvName::new(env)?;
    match ctx.engine().rollback(&env)? {
        RollbackOutcome::RolledBack { restored } => {
            output::print(
                format!("'{env}' rolled back to {}", restored.release.short()),
                verbosity,
            );
        }
        RollbackOutcome::NoOp { current } => {
            let serving = current
                .map(|b| b.release.short().to_string())
                .unwrap_or_else(|| "nothing".to_string());
            output::print(
                format!("'{env}' is already rolled back; still serving {serving}"),
                verbosity,
            );
        }
    }
    Ok(())
}

/// Withdraw a promotion that has not deployed yet.
pub fn cancel(ctx: &Context, env: &str) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let env = EnvName::new(env)?;
    let record = ctx.engine().cancel(&env)?;
    output::print(
        format!("cancelled promotion of {} into '{env}'", record.release.short()),
        verbosity,
    );
    Ok(())
}

/// Convert expired pending gates into timeout halts.
pub fn check_timeouts(ctx: &Context, env: &str) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let env = EnvName::new(env)?;
    let halted = ctx.engine().check_timeouts(&env)?;
    if halted.is_empty() {
        output::print("no expired gates", verbosity);
    }
    for record in halted {
        output::print(
            format!(
                "promotion of {} halted: {}",
                record.release.short(),
                record.state
            ),
            verbosity,
        );
    }
    Ok(())
}
