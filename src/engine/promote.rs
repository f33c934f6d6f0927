//! engine::promote
//!
//! The promotion engine: propose, gate, deploy, confirm, rollback, cancel.
//!
//! # Architecture
//!
//! Every operation follows the same shape: take the per-environment mutex,
//! re-read state, apply exactly one transition, persist, append to the
//! ledger, release the mutex. The mutex covers a single transition, never
//! the lifetime of a promotion; between transitions the environment is
//! unlocked and other commands may inspect it.
//!
//! # Invariants
//!
//! - One active promotion per environment
//! - Gate signals advance exactly the next gate in order
//! - A failed or expired gate halts in place; the environment binding is
//!   untouched
//! - Binding rewrites are single CAS writes of the whole record
//! - Rollback is idempotent; a second rollback is a reported no-op

use tracing::{info, warn};

use super::envlock::{EnvLock, LockError};
use super::ledger::{Event, Ledger};
use super::state::{Gate, GateResult, PromotionRecord, PromotionState};
use super::EngineError;
use crate::core::config::Config;
use crate::core::paths::StatePaths;
use crate::core::types::{EnvName, ReleaseId, UtcTimestamp};
use crate::store::{read_json, write_json_atomic, Binding, EnvStore, ReleaseStore, StoreError};

/// How the caller wants the canary stage handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanaryChoice {
    /// Use the environment's configured default.
    Default,
    /// Canary at an explicit traffic percentage.
    Percent(u8),
    /// Skip the canary stage and deploy straight to full.
    Disabled,
}

/// Outcome of a gate signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Gate passed; the named gate is now pending.
    Advanced { next: Gate },
    /// All gates passed; the release is serving a canary slice.
    DeployedCanary { percent: u8 },
    /// All gates passed; the release is serving full traffic.
    DeployedFull,
    /// The pipeline stopped in place.
    Halted { gate: Gate, result: GateResult },
}

/// Outcome of a rollback request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The previous full binding is serving again.
    RolledBack { restored: Binding },
    /// The environment was already rolled back; nothing changed.
    NoOp { current: Option<Binding> },
}

/// The promotion engine.
pub struct PromotionEngine<'a> {
    paths: &'a StatePaths,
    config: &'a Config,
}

impl<'a> PromotionEngine<'a> {
    pub fn new(paths: &'a StatePaths, config: &'a Config) -> Self {
        Self { paths, config }
    }

    /// Propose promoting a release into an environment.
    ///
    /// # Errors
    ///
    /// `PromotionInProgress` when the environment has an active promotion
    /// or another process holds its mutex; `NotFound` for a missing
    /// release or environment.
    pub fn propose(
        &self,
        release: &ReleaseId,
        env: &EnvName,
        requested_by: &str,
        canary: CanaryChoice,
    ) -> Result<PromotionRecord, EngineError> {
        let canary_percent = self.resolve_canary(env, canary)?;
        let _lock = self.lock(env)?;

        EnvStore::new(self.paths).read(env)?;
        ReleaseStore::new(self.paths).get(release)?;

        let mut history = self.history(env)?;
        self.expire_gates(&mut history)?;
        if let Some(active) = history.iter().find(|r| r.state.is_active()) {
            warn!(env = %env, release = active.release.short(), "promotion already active");
            return Err(EngineError::PromotionInProgress(env.clone()));
        }

        let record = PromotionRecord::new(
            release.clone(),
            env.clone(),
            requested_by.to_string(),
            canary_percent,
            &self.config.gates,
        );
        history.push(record.clone());
        self.save_history(env, &history)?;

        Ledger::new(self.paths).append(&Event::PromotionProposed {
            release: release.clone(),
            env: env.clone(),
            requested_by: requested_by.to_string(),
            canary_percent,
            at: UtcTimestamp::now(),
        })?;
        info!(env = %env, release = release.short(), "promotion proposed");
        Ok(record)
    }

    /// Apply a gate result posted by an external collaborator.
    ///
    /// A pass on the final (smoke) gate triggers deployment. An expired
    /// pending deadline takes precedence over the incoming signal and is
    /// applied as a timeout.
    pub fn signal_gate(
        &self,
        release: &ReleaseId,
        env: &EnvName,
        gate: Gate,
        result: GateResult,
    ) -> Result<GateOutcome, EngineError> {
        let _lock = self.lock(env)?;
        let mut history = self.history(env)?;

        // Deadline expiry wins over whatever the collaborator reports.
        if self.expire_gates(&mut history)? {
            self.save_history(env, &history)?;
        }

        let Some(idx) = history.iter().position(|r| r.state.is_active()) else {
            if let Some(halted) = history.iter().rev().find(
                |r| matches!(r.state, PromotionState::Halted { .. }) && &r.release == release,
            ) {
                if let PromotionState::Halted { gate, result } = halted.state {
                    return Ok(GateOutcome::Halted { gate, result });
                }
            }
            return Err(EngineError::InvalidState(format!(
                "no active promotion for environment '{env}'"
            )));
        };

        if &history[idx].release != release {
            return Err(EngineError::InvalidState(format!(
                "active promotion in '{env}' is for release {}, not {}",
                history[idx].release.short(),
                release.short()
            )));
        }

        let Some(pending) = history[idx].state.pending_gate() else {
            return Err(EngineError::InvalidState(format!(
                "promotion of {} into '{env}' is not awaiting a gate ({})",
                release.short(),
                history[idx].state
            )));
        };
        if gate != pending {
            return Err(EngineError::GateOutOfOrder {
                expected: pending,
                got: gate,
            });
        }

        Ledger::new(self.paths).append(&Event::GateSignaled {
            release: release.clone(),
            env: env.clone(),
            gate,
            result,
            at: UtcTimestamp::now(),
        })?;

        let outcome = match result {
            GateResult::Pass => {
                let next_state = history[idx]
                    .state
                    .after_pass(gate)
                    .unwrap_or(PromotionState::GateSmoke);
                history[idx].transition(next_state, &self.config.gates);
                match history[idx].state.pending_gate() {
                    Some(next) => GateOutcome::Advanced { next },
                    None => self.deploy(&mut history, idx)?,
                }
            }
            GateResult::Fail | GateResult::Timeout => {
                self.halt(&mut history[idx], gate, result)?
            }
        };

        self.save_history(env, &history)?;
        Ok(outcome)
    }

    /// Confirm a canary to full traffic.
    pub fn confirm(&self, env: &EnvName) -> Result<PromotionRecord, EngineError> {
        let _lock = self.lock(env)?;
        let mut history = self.history(env)?;

        let Some(idx) = history
            .iter()
            .position(|r| r.state == PromotionState::DeployedCanary)
        else {
            return Err(EngineError::InvalidState(format!(
                "no canary awaiting confirmation in environment '{env}'"
            )));
        };

        let env_store = EnvStore::new(self.paths);
        let stored = env_store.read(env)?;
        let mut next = stored.clone();
        next.traffic_split = 100;
        next.rolled_back = false;
        env_store.write_cas(&next, stored.seq)?;

        let release = history[idx].release.clone();
        self.supersede(&mut history, idx, &release)?;
        history[idx].transition(PromotionState::DeployedFull, &self.config.gates);
        self.save_history(env, &history)?;

        Ledger::new(self.paths).append(&Event::CanaryConfirmed {
            release: release.clone(),
            env: env.clone(),
            at: UtcTimestamp::now(),
        })?;
        info!(env = %env, release = release.short(), "canary confirmed to full");
        Ok(history[idx].clone())
    }

    /// Roll an environment back to its previous full binding.
    ///
    /// Idempotent: rolling back an already rolled-back environment
    /// reports a no-op and changes nothing.
    pub fn rollback(&self, env: &EnvName) -> Result<RollbackOutcome, EngineError> {
        let _lock = self.lock(env)?;
        let env_store = EnvStore::new(self.paths);
        let stored = env_store.read(env)?;

        if stored.rolled_back {
            Ledger::new(self.paths).append(&Event::RollbackNoOp {
                env: env.clone(),
                at: UtcTimestamp::now(),
            })?;
            return Ok(RollbackOutcome::NoOp {
                current: stored.current,
            });
        }

        let Some(previous) = stored.previous.clone() else {
            return Err(EngineError::InvalidState(format!(
                "environment '{env}' has no previous full binding to restore"
            )));
        };
        let current = stored.current.clone();

        let mut history = self.history(env)?;
        let canary_idx = history
            .iter()
            .position(|r| r.state == PromotionState::DeployedCanary);

        let mut next = stored.clone();
        next.traffic_split = 100;
        next.rolled_back = true;
        next.current = Some(previous.clone());
        // A canary never reached full, so it cannot become the previous
        // binding; a full release can.
        next.previous = match canary_idx {
            Some(_) => None,
            None => current,
        };
        env_store.write_cas(&next, stored.seq)?;

        let rolled_idx = canary_idx.or_else(|| {
            history
                .iter()
                .position(|r| r.state == PromotionState::DeployedFull)
        });
        if let Some(idx) = rolled_idx {
            history[idx].transition(PromotionState::RolledBack, &self.config.gates);
            self.save_history(env, &history)?;
        }

        Ledger::new(self.paths).append(&Event::RolledBack {
            env: env.clone(),
            restored_release: previous.release.clone(),
            at: UtcTimestamp::now(),
        })?;
        info!(env = %env, restored = previous.release.short(), "rolled back");
        Ok(RollbackOutcome::RolledBack { restored: previous })
    }

    /// Withdraw a promotion that has not deployed yet.
    pub fn cancel(&self, env: &EnvName) -> Result<PromotionRecord, EngineError> {
        let _lock = self.lock(env)?;
        let mut history = self.history(env)?;

        let Some(idx) = history.iter().position(|r| r.state.is_active()) else {
            return Err(EngineError::InvalidState(format!(
                "no active promotion for environment '{env}'"
            )));
        };
        if !history[idx].state.cancellable() {
            return Err(EngineError::InvalidState(format!(
                "promotion of {} into '{env}' is {}; recovery goes through rollback",
                history[idx].release.short(),
                history[idx].state
            )));
        }

        let release = history[idx].release.clone();
        history[idx].transition(PromotionState::Cancelled, &self.config.gates);
        self.save_history(env, &history)?;

        Ledger::new(self.paths).append(&Event::PromotionCancelled {
            release,
            env: env.clone(),
            at: UtcTimestamp::now(),
        })?;
        Ok(history[idx].clone())
    }

    /// Convert expired pending gates into timeout halts.
    ///
    /// Returns the promotions that were halted.
    pub fn check_timeouts(&self, env: &EnvName) -> Result<Vec<PromotionRecord>, EngineError> {
        let _lock = self.lock(env)?;
        let mut history = self.history(env)?;
        let before: Vec<String> = history
            .iter()
            .filter(|r| matches!(r.state, PromotionState::Halted { .. }))
            .map(|r| r.id.clone())
            .collect();

        if self.expire_gates(&mut history)? {
            self.save_history(env, &history)?;
        }

        Ok(history
            .iter()
            .filter(|r| {
                matches!(r.state, PromotionState::Halted { .. }) && !before.contains(&r.id)
            })
            .cloned()
            .collect())
    }

    /// The active promotion for an environment, if any.
    pub fn active(&self, env: &EnvName) -> Result<Option<PromotionRecord>, EngineError> {
        Ok(self
            .history(env)?
            .into_iter()
            .find(|r| r.state.is_active()))
    }

    /// The full promotion history for an environment, oldest first.
    pub fn history(&self, env: &EnvName) -> Result<Vec<PromotionRecord>, EngineError> {
        let path = self.paths.promotion_history_path(env);
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(read_json(&path)?)
    }

    fn save_history(
        &self,
        env: &EnvName,
        history: &Vec<PromotionRecord>,
    ) -> Result<(), EngineError> {
        write_json_atomic(&self.paths.promotion_history_path(env), history)?;
        Ok(())
    }

    fn lock(&self, env: &EnvName) -> Result<EnvLock, EngineError> {
        EnvLock::acquire(self.paths, env).map_err(|e| match e {
            LockError::AlreadyLocked(name) => EngineError::PromotionInProgress(name),
            other => EngineError::Lock(other),
        })
    }

    fn resolve_canary(
        &self,
        env: &EnvName,
        choice: CanaryChoice,
    ) -> Result<Option<u8>, EngineError> {
        match choice {
            CanaryChoice::Percent(pct) => {
                if !(1..=99).contains(&pct) {
                    return Err(EngineError::InvalidCanaryPercent(pct));
                }
                Ok(Some(pct))
            }
            CanaryChoice::Disabled => Ok(None),
            CanaryChoice::Default => Ok(self
                .config
                .canary_default(env)
                .then_some(self.config.canary.default_percent)),
        }
    }

    /// Rewrite the environment binding for a fully gated promotion.
    fn deploy(
        &self,
        history: &mut [PromotionRecord],
        idx: usize,
    ) -> Result<GateOutcome, EngineError> {
        let release = ReleaseStore::new(self.paths).get(&history[idx].release)?;
        let env = history[idx].env.clone();

        let env_store = EnvStore::new(self.paths);
        let stored = env_store.read(&env)?;
        let binding = Binding {
            release: release.id.clone(),
            lock_artifact: release.lock_artifact.clone(),
        };

        let mut next = stored.clone();
        next.previous = if stored.traffic_split == 100 {
            stored.current.clone()
        } else {
            stored.previous.clone()
        };
        next.current = Some(binding);

        match history[idx].canary_percent {
            Some(percent) => {
                next.traffic_split = percent;
                next.rolled_back = false;
                env_store.write_cas(&next, stored.seq)?;
                history[idx].transition(PromotionState::DeployedCanary, &self.config.gates);
                Ledger::new(self.paths).append(&Event::CanaryStarted {
                    release: release.id.clone(),
                    env: env.clone(),
                    percent,
                    at: UtcTimestamp::now(),
                })?;
                info!(env = %env, release = release.id.short(), percent, "canary started");
                Ok(GateOutcome::DeployedCanary { percent })
            }
            None => {
                next.traffic_split = 100;
                next.rolled_back = false;
                env_store.write_cas(&next, stored.seq)?;
                let id = release.id.clone();
                self.supersede(history, idx, &id)?;
                history[idx].transition(PromotionState::DeployedFull, &self.config.gates);
                Ledger::new(self.paths).append(&Event::DeployedFull {
                    release: release.id.clone(),
                    env: env.clone(),
                    at: UtcTimestamp::now(),
                })?;
                info!(env = %env, release = release.id.short(), "deployed to full");
                Ok(GateOutcome::DeployedFull)
            }
        }
    }

    /// Mark earlier full promotions displaced by `by`.
    fn supersede(
        &self,
        history: &mut [PromotionRecord],
        keep_idx: usize,
        by: &ReleaseId,
    ) -> Result<(), EngineError> {
        let ledger = Ledger::new(self.paths);
        for (i, record) in history.iter_mut().enumerate() {
            if i != keep_idx && record.state == PromotionState::DeployedFull {
                record.transition(PromotionState::Superseded, &self.config.gates);
                ledger.append(&Event::Superseded {
                    release: record.release.clone(),
                    env: record.env.clone(),
                    by: by.clone(),
                    at: UtcTimestamp::now(),
                })?;
            }
        }
        Ok(())
    }

    /// Halt the active promotion in place.
    fn halt(
        &self,
        record: &mut PromotionRecord,
        gate: Gate,
        result: GateResult,
    ) -> Result<GateOutcome, EngineError> {
        record.transition(PromotionState::Halted { gate, result }, &self.config.gates);
        Ledger::new(self.paths).append(&Event::PromotionHalted {
            release: record.release.clone(),
            env: record.env.clone(),
            gate,
            result,
            at: UtcTimestamp::now(),
        })?;
        warn!(
            env = %record.env,
            release = record.release.short(),
            %gate,
            %result,
            "promotion halted"
        );
        Ok(GateOutcome::Halted { gate, result })
    }

    /// Apply timeout halts to any active record whose deadline passed.
    ///
    /// Returns whether the history changed.
    fn expire_gates(&self, history: &mut [PromotionRecord]) -> Result<bool, EngineError> {
        let now = UtcTimestamp::now();
        let mut changed = false;
        for record in history.iter_mut() {
            if record.gate_expired(&now) {
                if let Some(gate) = record.state.pending_gate() {
                    Ledger::new(self.paths).append(&Event::GateSignaled {
                        release: record.release.clone(),
                        env: record.env.clone(),
                        gate,
                        result: GateResult::Timeout,
                        at: now.clone(),
                    })?;
                    self.halt(record, gate, GateResult::Timeout)?;
                    changed = true;
                }
            }
        }
        Ok(changed)
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e)
    }
}
