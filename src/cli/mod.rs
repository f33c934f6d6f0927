//! cli
//!
//! Command-line interface layer for shiplock.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Delegate to command handlers
//! - Does NOT mutate state directly
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap, builds the
//! [`crate::engine::Context`], and dispatches to command handlers. All
//! state changes flow through the stores and the promotion engine.

pub mod args;
pub mod commands;

pub use args::Cli;

use anyhow::Result;

use crate::core::config::Config;
use crate::core::paths::StatePaths;
use crate::engine::Context;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    let paths = StatePaths::discover(cli.state_dir.as_deref());
    paths.ensure_dirs()?;
    let config = Config::load(&paths.config_path())?;

    let ctx = Context {
        paths,
        config,
        quiet: cli.quiet,
        debug: cli.debug,
    };

    commands::dispatch(cli.command, &ctx)
}

/// Initialize tracing to stderr. `SHIPLOCK_LOG` overrides the level;
/// `--debug` raises the default.
fn init_tracing(debug: bool) {
    let default = if debug { "shiplock=debug" } else { "shiplock=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("SHIPLOCK_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
