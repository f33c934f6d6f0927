//! Shiplock - pinned dependency resolution and environment promotion
//!
//! Shiplock is a single-binary tool for teams shipping onto a managed
//! compute platform: it resolves direct requirements into complete pinned
//! dependency graphs under the platform's version ceilings, records the
//! results as content-addressed lock artifacts, and walks releases through
//! gated promotion into environments with canary, confirm, and rollback.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates down)
//! - [`engine`] - Promotion state machine, environment mutex, audit ledger
//! - [`resolver`] - Deterministic dependency resolution
//! - [`store`] - File-backed stores for locks, releases, and environments
//! - [`core`] - Domain types, catalog, constraints, config, and paths
//! - [`ui`] - Output formatting
//!
//! # Correctness Invariants
//!
//! Shiplock maintains the following invariants:
//!
//! 1. Resolution is deterministic and never selects above a platform ceiling
//! 2. Lock artifacts and releases are immutable once recorded
//! 3. An environment's release and lock artifact always change together
//! 4. Every state change is appended to the audit ledger

pub mod cli;
pub mod core;
pub mod engine;
pub mod resolver;
pub mod store;
pub mod ui;
