//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--state-dir <path>`: Use an explicit state directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Shiplock - pinned dependency resolution and environment promotion
#[derive(Parser, Debug)]
#[command(name = "spl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// State directory (default: ./.shiplock, or $SHIPLOCK_DIR)
    #[arg(long, global = true, value_name = "PATH")]
    pub state_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage the platform revision catalog
    #[command(name = "catalog")]
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Resolve requirements into a recorded lock artifact
    #[command(
        name = "resolve",
        long_about = "Resolve direct requirements into a complete pinned dependency \
            graph and record it as a content-addressed lock artifact.\n\n\
            Every package shipped by the active platform revision acts as a version \
            ceiling: resolution never selects above it. Resolution either pins every \
            reachable package or fails with a conflict report naming every requester \
            of the unsatisfiable package; there is no partial success.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Resolve against the latest catalog revision
    spl resolve --requirements reqs.txt --registry registry.toml

    # Resolve against a specific platform revision
    spl resolve --requirements reqs.txt --registry registry.toml --revision 2024.10

REQUIREMENTS FORMAT (one per line, '#' comments):
    numpy<=1.24.0
    requests==2.28.0
    flask>=2.0.0,<3.0.0
    pyyaml"
    )]
    Resolve {
        /// File of direct requirements, one per line
        #[arg(long, value_name = "PATH")]
        requirements: PathBuf,

        /// Registry snapshot file (TOML)
        #[arg(long, value_name = "PATH")]
        registry: PathBuf,

        /// Platform revision to resolve against (default: latest)
        #[arg(long, value_name = "REVISION")]
        revision: Option<String>,
    },

    /// Manage immutable release records
    #[command(name = "release")]
    Release {
        #[command(subcommand)]
        action: ReleaseAction,
    },

    /// Manage environment binding records
    #[command(name = "env")]
    Env {
        #[command(subcommand)]
        action: EnvAction,
    },

    /// Propose promoting a release into an environment
    #[command(
        name = "promote",
        long_about = "Propose promoting a release into an environment.\n\n\
            A promotion walks the gate pipeline (unit, integration, smoke) as \
            collaborators post results via 'spl gate'. Passing the final gate \
            deploys: to a canary traffic slice by default, or straight to full \
            traffic with --no-canary. Only one promotion can be active per \
            environment at a time.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Standard canary promotion
    spl promote --release <id> --env prod --requested-by alex

    # Canary at an explicit traffic percentage
    spl promote --release <id> --env prod --requested-by alex --canary 25

    # Skip the canary stage
    spl promote --release <id> --env staging --requested-by alex --no-canary

THEN:
    spl gate --release <id> --env prod --gate unit --result pass
    spl gate --release <id> --env prod --gate integration --result pass
    spl gate --release <id> --env prod --gate smoke --result pass
    spl confirm --env prod     # canary -> full"
    )]
    Promote {
        /// Release to promote
        #[arg(long, value_name = "RELEASE_ID")]
        release: String,

        /// Target environment
        #[arg(long, value_name = "ENV")]
        env: String,

        /// Who is asking (recorded in the audit ledger)
        #[arg(long, value_name = "NAME")]
        requested_by: String,

        /// Canary traffic percentage (1-99)
        #[arg(long, value_name = "PERCENT", conflicts_with = "no_canary")]
        canary: Option<u8>,

        /// Deploy straight to full traffic, skipping the canary stage
        #[arg(long)]
        no_canary: bool,
    },

    /// Post a gate result for the active promotion
    Gate {
        /// Release the result is for
        #[arg(long, value_name = "RELEASE_ID")]
        release: String,

        /// Environment of the promotion
        #[arg(long, value_name = "ENV")]
        env: String,

        /// Which gate: unit, integration, or smoke
        #[arg(long)]
        gate: String,

        /// The outcome: pass, fail, or timeout
        #[arg(long)]
        result: String,
    },

    /// Confirm a canary to full traffic
    Confirm {
        /// Environment with the canary
        #[arg(long, value_name = "ENV")]
        env: String,
    },

    /// Roll an environment back to its previous full binding
    #[command(
        name = "rollback",
        long_about = "Restore the environment's previous full-traffic binding.\n\n\
            Rollback swaps in the previous binding as a single atomic write; the \
            release and its lock artifact always change together. Rolling back an \
            already rolled-back environment is a reported no-op, so retrying after \
            an uncertain failure is safe."
    )]
    Rollback {
        /// Environment to roll back
        #[arg(long, value_name = "ENV")]
        env: String,
    },

    /// Withdraw a promotion that has not deployed yet
    Cancel {
        /// Environment with the active promotion
        #[arg(long, value_name = "ENV")]
        env: String,
    },

    /// Convert expired pending gates into timeout halts
    #[command(name = "check-timeouts")]
    CheckTimeouts {
        /// Environment to check
        #[arg(long, value_name = "ENV")]
        env: String,
    },

    /// Show the audit ledger
    Audit {
        /// Only events for this environment
        #[arg(long, value_name = "ENV")]
        env: Option<String>,

        /// Show only the most recent N events
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },
}

/// Catalog subcommands.
#[derive(Subcommand, Debug)]
pub enum CatalogAction {
    /// Record a new platform revision
    #[command(
        after_help = "\
PINS FORMAT (one per line, '#' comments):
    numpy==1.24.0
    requests==2.28.0"
    )]
    Add {
        /// Revision identifier (e.g. 2024.10)
        #[arg(long, value_name = "REVISION")]
        revision: String,

        /// File of shipped package pins
        #[arg(long, value_name = "PATH")]
        pins: PathBuf,
    },

    /// Show a catalog revision (default: latest)
    Show {
        /// Revision to show
        #[arg(long, value_name = "REVISION")]
        revision: Option<String>,
    },
}

/// Release subcommands.
#[derive(Subcommand, Debug)]
pub enum ReleaseAction {
    /// Cut a release binding a source ref to a lock artifact
    Create {
        /// What was built (commit, tag, or build reference)
        #[arg(long, value_name = "REF")]
        source_ref: String,

        /// Lock artifact the release was built against
        #[arg(long, value_name = "ARTIFACT_ID")]
        artifact: String,
    },

    /// List all releases, oldest first
    List,
}

/// Environment subcommands.
#[derive(Subcommand, Debug)]
pub enum EnvAction {
    /// Create an empty environment record
    Create {
        /// Environment name (e.g. dev, staging, prod)
        name: String,
    },

    /// List all environments
    List,

    /// Show an environment's bindings and active promotion
    Show {
        /// Environment name
        name: String,
    },
}
