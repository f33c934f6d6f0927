//! ui
//!
//! Output formatting for the command line.
//!
//! # Design
//!
//! All command output goes through this module so quiet mode is honored
//! consistently. Errors always print.

pub mod output;
