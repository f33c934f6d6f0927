//! core
//!
//! Core domain types, schemas, and the constraint compiler.
//!
//! # Modules
//!
//! - [`types`] - Strong types: PackageName, RevisionId, EnvName, ArtifactId, etc.
//! - [`catalog`] - Append-only platform revision catalog
//! - [`constraint`] - Constraint grammar and the constraint compiler
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for shiplock storage
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Compilation and resolution are deterministic
//! - Persisted records are strict and self-describing

pub mod catalog;
pub mod config;
pub mod constraint;
pub mod paths;
pub mod types;
