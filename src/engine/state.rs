//! engine::state
//!
//! The promotion state machine.
//!
//! # States
//!
//! Each promotion of a release into an environment walks:
//!
//! ```text
//! Proposed -> GateUnit -> GateIntegration -> GateSmoke
//!          -> DeployedCanary -> DeployedFull -> Superseded
//! ```
//!
//! A state names the last stage completed: `Proposed` awaits the unit
//! gate, `GateUnit` awaits integration, and so on. A failing or expired
//! gate moves the promotion to `Halted` in place; the environment is
//! untouched and the release stays proposable after a new release is cut.
//! `RolledBack` is reachable from both deployed states, `Cancelled` only
//! before deployment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::config::GatesConfig;
use crate::core::types::{EnvName, ReleaseId, UtcTimestamp};

/// A verification gate, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    Unit,
    Integration,
    Smoke,
}

impl Gate {
    /// The configured timeout budget for this gate, in seconds.
    pub fn timeout_secs(&self, gates: &GatesConfig) -> u64 {
        match self {
            Self::Unit => gates.unit_timeout_secs,
            Self::Integration => gates.integration_timeout_secs,
            Self::Smoke => gates.smoke_timeout_secs,
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "unit"),
            Self::Integration => write!(f, "integration"),
            Self::Smoke => write!(f, "smoke"),
        }
    }
}

impl FromStr for Gate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unit" => Ok(Self::Unit),
            "integration" => Ok(Self::Integration),
            "smoke" => Ok(Self::Smoke),
            other => Err(format!(
                "unknown gate '{other}', expected unit, integration, or smoke"
            )),
        }
    }
}

/// The outcome a gate collaborator reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateResult {
    Pass,
    Fail,
    Timeout,
}

impl fmt::Display for GateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl FromStr for GateResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(Self::Pass),
            "fail" => Ok(Self::Fail),
            "timeout" => Ok(Self::Timeout),
            other => Err(format!(
                "unknown gate result '{other}', expected pass, fail, or timeout"
            )),
        }
    }
}

/// State of one promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PromotionState {
    /// Proposed; the unit gate is pending.
    Proposed,
    /// Unit passed; integration is pending.
    GateUnit,
    /// Integration passed; smoke is pending.
    GateIntegration,
    /// Smoke passed; deployment is underway.
    GateSmoke,
    /// Serving a traffic slice, awaiting confirmation.
    DeployedCanary,
    /// Serving 100% of traffic.
    DeployedFull,
    /// A later release reached full traffic.
    Superseded,
    /// Recovered to the previous full binding.
    RolledBack,
    /// A gate failed or timed out; the pipeline stopped in place.
    Halted { gate: Gate, result: GateResult },
    /// Withdrawn before deployment.
    Cancelled,
}

impl PromotionState {
    /// The gate this promotion is waiting on, if any.
    pub fn pending_gate(&self) -> Option<Gate> {
        match self {
            Self::Proposed => Some(Gate::Unit),
            Self::GateUnit => Some(Gate::Integration),
            Self::GateIntegration => Some(Gate::Smoke),
            _ => None,
        }
    }

    /// The state after passing `gate` (which must be the pending one).
    pub fn after_pass(&self, gate: Gate) -> Option<Self> {
        if self.pending_gate() != Some(gate) {
            return None;
        }
        Some(match gate {
            Gate::Unit => Self::GateUnit,
            Gate::Integration => Self::GateIntegration,
            Gate::Smoke => Self::GateSmoke,
        })
    }

    /// Whether this promotion blocks another from starting.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Proposed
                | Self::GateUnit
                | Self::GateIntegration
                | Self::GateSmoke
                | Self::DeployedCanary
        )
    }

    /// Whether cancellation is still permitted.
    pub fn cancellable(&self) -> bool {
        matches!(
            self,
            Self::Proposed | Self::GateUnit | Self::GateIntegration | Self::GateSmoke
        )
    }
}

impl fmt::Display for PromotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proposed => write!(f, "proposed"),
            Self::GateUnit => write!(f, "gate:unit passed"),
            Self::GateIntegration => write!(f, "gate:integration passed"),
            Self::GateSmoke => write!(f, "gate:smoke passed"),
            Self::DeployedCanary => write!(f, "deployed (canary)"),
            Self::DeployedFull => write!(f, "deployed (full)"),
            Self::Superseded => write!(f, "superseded"),
            Self::RolledBack => write!(f, "rolled back"),
            Self::Halted { gate, result } => write!(f, "halted ({gate}: {result})"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One promotion of a release into an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRecord {
    /// Unique id for the promotion attempt.
    pub id: String,
    pub release: ReleaseId,
    pub env: EnvName,
    pub requested_by: String,
    /// Traffic percentage for the canary stage; `None` deploys straight
    /// to full.
    pub canary_percent: Option<u8>,
    pub state: PromotionState,
    /// When the pending gate expires, if one is pending.
    pub gate_deadline: Option<UtcTimestamp>,
    pub started_at: UtcTimestamp,
    pub updated_at: UtcTimestamp,
}

impl PromotionRecord {
    pub fn new(
        release: ReleaseId,
        env: EnvName,
        requested_by: String,
        canary_percent: Option<u8>,
        gates: &GatesConfig,
    ) -> Self {
        let now = UtcTimestamp::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            release,
            env,
            requested_by,
            canary_percent,
            state: PromotionState::Proposed,
            gate_deadline: Some(now.plus_secs(Gate::Unit.timeout_secs(gates))),
            started_at: now.clone(),
            updated_at: now,
        }
    }

    /// Move to a new state, refreshing the gate deadline.
    pub fn transition(&mut self, state: PromotionState, gates: &GatesConfig) {
        self.updated_at = UtcTimestamp::now();
        self.gate_deadline = state
            .pending_gate()
            .map(|gate| self.updated_at.plus_secs(gate.timeout_secs(gates)));
        self.state = state;
    }

    /// Whether the pending gate deadline has passed.
    pub fn gate_expired(&self, now: &UtcTimestamp) -> bool {
        self.state.pending_gate().is_some()
            && self.gate_deadline.as_ref().is_some_and(|d| now > d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(state: PromotionState) -> PromotionRecord {
        let mut r = PromotionRecord::new(
            ReleaseId::generate(),
            EnvName::new("prod").unwrap(),
            "tester".to_string(),
            Some(10),
            &GatesConfig::default(),
        );
        r.state = state;
        r
    }

    mod gate_order {
        use super::*;

        #[test]
        fn pending_gate_follows_pipeline_order() {
            assert_eq!(PromotionState::Proposed.pending_gate(), Some(Gate::Unit));
            assert_eq!(
                PromotionState::GateUnit.pending_gate(),
                Some(Gate::Integration)
            );
            assert_eq!(
                PromotionState::GateIntegration.pending_gate(),
                Some(Gate::Smoke)
            );
            assert_eq!(PromotionState::GateSmoke.pending_gate(), None);
        }

        #[test]
        fn after_pass_advances_exactly_one_gate() {
            assert_eq!(
                PromotionState::Proposed.after_pass(Gate::Unit),
                Some(PromotionState::GateUnit)
            );
            assert_eq!(PromotionState::Proposed.after_pass(Gate::Smoke), None);
            assert_eq!(PromotionState::GateUnit.after_pass(Gate::Unit), None);
        }

        #[test]
        fn deployed_states_accept_no_gates() {
            assert_eq!(PromotionState::DeployedCanary.pending_gate(), None);
            assert_eq!(PromotionState::DeployedFull.pending_gate(), None);
        }
    }

    mod activity {
        use super::*;

        #[test]
        fn gating_and_canary_states_are_active() {
            for state in [
                PromotionState::Proposed,
                PromotionState::GateUnit,
                PromotionState::GateIntegration,
                PromotionState::GateSmoke,
                PromotionState::DeployedCanary,
            ] {
                assert!(state.is_active(), "{state} should be active");
            }
        }

        #[test]
        fn terminal_states_are_inactive() {
            for state in [
                PromotionState::DeployedFull,
                PromotionState::Superseded,
                PromotionState::RolledBack,
                PromotionState::Cancelled,
                PromotionState::Halted {
                    gate: Gate::Unit,
                    result: GateResult::Fail,
                },
            ] {
                assert!(!state.is_active(), "{state} should be inactive");
            }
        }

        #[test]
        fn cancellable_only_before_deploy() {
            assert!(PromotionState::Proposed.cancellable());
            assert!(PromotionState::GateIntegration.cancellable());
            assert!(!PromotionState::DeployedCanary.cancellable());
            assert!(!PromotionState::DeployedFull.cancellable());
        }
    }

    mod deadlines {
        use super::*;

        #[test]
        fn new_record_has_unit_deadline() {
            let r = record(PromotionState::Proposed);
            assert!(r.gate_deadline.is_some());
        }

        #[test]
        fn transition_to_deployed_clears_deadline() {
            let mut r = record(PromotionState::GateSmoke);
            r.transition(PromotionState::DeployedCanary, &GatesConfig::default());
            assert!(r.gate_deadline.is_none());
        }

        #[test]
        fn expiry_only_while_a_gate_is_pending() {
            let mut r = record(PromotionState::Proposed);
            let past = UtcTimestamp::now();
            r.gate_deadline = Some(past.clone());
            let later = past.plus_secs(10);
            assert!(r.gate_expired(&later));

            r.transition(PromotionState::DeployedFull, &GatesConfig::default());
            assert!(!r.gate_expired(&later));
        }
    }

    mod parsing {
        use super::*;

        #[test]
        fn gate_roundtrip() {
            for gate in [Gate::Unit, Gate::Integration, Gate::Smoke] {
                assert_eq!(gate.to_string().parse::<Gate>().unwrap(), gate);
            }
            assert!("e2e".parse::<Gate>().is_err());
        }

        #[test]
        fn result_roundtrip() {
            for result in [GateResult::Pass, GateResult::Fail, GateResult::Timeout] {
                assert_eq!(result.to_string().parse::<GateResult>().unwrap(), result);
            }
            assert!("flaky".parse::<GateResult>().is_err());
        }
    }
}
