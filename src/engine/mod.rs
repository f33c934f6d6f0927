//! engine
//!
//! The promotion engine and its supporting machinery.
//!
//! # Modules
//!
//! - [`state`] - Gates, gate results, and the promotion state machine
//! - [`envlock`] - Per-environment promotion mutex (fs2, RAII)
//! - [`ledger`] - Append-only JSON-lines audit ledger
//! - [`promote`] - The engine itself: propose, gate, confirm, rollback
//!
//! # Concurrency model
//!
//! Each engine operation takes the environment's OS-level mutex, re-reads
//! state, applies one transition, persists with a CAS-guarded write, and
//! appends to the ledger before releasing the mutex. Concurrent mutation
//! of the same environment fails fast rather than queueing.

pub mod envlock;
pub mod ledger;
pub mod promote;
pub mod state;

pub use envlock::{EnvLock, LockError};
pub use ledger::{Event, Ledger, LedgerError};
pub use promote::{CanaryChoice, GateOutcome, PromotionEngine, RollbackOutcome};
pub use state::{Gate, GateResult, PromotionRecord, PromotionState};

use thiserror::Error;

use crate::core::config::Config;
use crate::core::paths::StatePaths;
use crate::core::types::EnvName;

/// Shared context threaded through command handlers.
#[derive(Debug, Clone)]
pub struct Context {
    pub paths: StatePaths,
    pub config: Config,
    /// Minimal output.
    pub quiet: bool,
    /// Verbose logging.
    pub debug: bool,
}

impl Context {
    /// A promotion engine over this context's state.
    pub fn engine(&self) -> PromotionEngine<'_> {
        PromotionEngine::new(&self.paths, &self.config)
    }
}

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The environment already has an active promotion (or another
    /// process holds its mutex).
    #[error("a promotion is already in progress for environment '{0}'")]
    PromotionInProgress(EnvName),

    /// A gate was signaled out of pipeline order.
    #[error("gate out of order: expected {expected}, got {got}")]
    GateOutOfOrder {
        expected: state::Gate,
        got: state::Gate,
    },

    /// The requested transition is not valid from the current state.
    #[error("{0}")]
    InvalidState(String),

    /// Canary percent outside 1-99.
    #[error("canary percent must be between 1 and 99, got {0}")]
    InvalidCanaryPercent(u8),

    /// A store operation failed.
    #[error(transparent)]
    Store(crate::store::StoreError),

    /// A ledger append or read failed.
    #[error(transparent)]
    Ledger(#[from] ledger::LedgerError),

    /// Environment lock machinery failed (not contention).
    #[error(transparent)]
    Lock(envlock::LockError),
}
