//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the engine or stores to execute the command
//! 3. Formats and displays output
//!
//! Handlers do NOT mutate state directly; every state change flows
//! through the stores and the promotion engine.

mod audit;
mod catalog;
mod env_cmd;
mod promote_cmd;
mod release;
mod resolve_cmd;

pub use audit::audit;
pub use catalog::{catalog_add, catalog_show};
pub use env_cmd::{env_create, env_list, env_show};
pub use promote_cmd::{cancel, check_timeouts, confirm, gate, promote, rollback};
pub use release::{release_create, release_list};
pub use resolve_cmd::resolve;

use anyhow::Result;

use crate::cli::args::{CatalogAction, Command, EnvAction, ReleaseAction};
use crate::engine::Context;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Catalog { action } => match action {
            CatalogAction::Add { revision, pins } => catalog_add(ctx, &revision, &pins),
            CatalogAction::Show { revision } => catalog_show(ctx, revision.as_deref()),
        },
        Command::Resolve {
            requirements,
            registry,
            revision,
        } => resolve(ctx, &requirements, &registry, revision.as_deref()),
        Command::Release { action } => match action {
            ReleaseAction::Create {
                source_ref,
                artifact,
            } => release_create(ctx, &source_ref, &artifact),
            ReleaseAction::List => release_list(ctx),
        },
        Command::Env { action } => match action {
            EnvAction::Create { name } => env_create(ctx, &name),
            EnvAction::List => env_list(ctx),
            EnvAction::Show { name } => env_show(ctx, &name),
        },
        Command::Promote {
            release,
            env,
            requested_by,
            canary,
            no_canary,
        } => promote(ctx, &release, &env, &requested_by, canary, no_canary),
        Command::Gate {
            release,
            env,
            gate: gate_name,
            result,
        } => gate(ctx, &release, &env, &gate_name, &result),
        Command::Confirm { env } => confirm(ctx, &env),
        Command::Rollback { env } => rollback(ctx, &env),
        Command::Cancel { env } => cancel(ctx, &env),
        Command::CheckTimeouts { env } => check_timeouts(ctx, &env),
        Command::Audit { env, limit } => audit(ctx, env.as_deref(), limit),
    }
}
