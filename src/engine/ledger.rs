//! engine::ledger
//!
//! Append-only audit ledger.
//!
//! # Architecture
//!
//! The ledger is a JSON-lines file (`ledger.jsonl`) with one event per
//! line, fsynced per append. Events record what the engine did and who
//! asked for it.
//!
//! **Important:** the ledger is evidence, not authority. The catalog,
//! stores, and environment records remain the source of truth; the ledger
//! only explains how they got that way.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::{Gate, GateResult};
use crate::core::paths::StatePaths;
use crate::core::types::{ArtifactId, EnvName, ReleaseId, RevisionId, UtcTimestamp};

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize event: {0}")]
    Serialize(String),

    #[error("ledger corrupted at line {line}: {message}")]
    Corrupted { line: usize, message: String },
}

/// An audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A platform revision was added to the catalog.
    CatalogRevisionRecorded {
        revision: RevisionId,
        entries: usize,
        at: UtcTimestamp,
    },

    /// A lock artifact was recorded.
    LockRecorded {
        artifact: ArtifactId,
        pins: usize,
        at: UtcTimestamp,
    },

    /// A release was created.
    ReleaseCreated {
        release: ReleaseId,
        source_ref: String,
        artifact: ArtifactId,
        at: UtcTimestamp,
    },

    /// A promotion was proposed.
    PromotionProposed {
        release: ReleaseId,
        env: EnvName,
        requested_by: String,
        canary_percent: Option<u8>,
        at: UtcTimestamp,
    },

    /// A gate collaborator posted a result.
    GateSignaled {
        release: ReleaseId,
        env: EnvName,
        gate: Gate,
        result: GateResult,
        at: UtcTimestamp,
    },

    /// A canary deploy started serving a traffic slice.
    CanaryStarted {
        release: ReleaseId,
        env: EnvName,
        percent: u8,
        at: UtcTimestamp,
    },

    /// A canary was confirmed to full traffic.
    CanaryConfirmed {
        release: ReleaseId,
        env: EnvName,
        at: UtcTimestamp,
    },

    /// A release reached full traffic without a canary stage.
    DeployedFull {
        release: ReleaseId,
        env: EnvName,
        at: UtcTimestamp,
    },

    /// A gate failure or timeout stopped a promotion in place.
    PromotionHalted {
        release: ReleaseId,
        env: EnvName,
        gate: Gate,
        result: GateResult,
        at: UtcTimestamp,
    },

    /// A promotion was withdrawn before deployment.
    PromotionCancelled {
        release: ReleaseId,
        env: EnvName,
        at: UtcTimestamp,
    },

    /// An environment was recovered to its previous full binding.
    RolledBack {
        env: EnvName,
        restored_release: ReleaseId,
        at: UtcTimestamp,
    },

    /// A rollback was requested on an already rolled-back environment.
    RollbackNoOp { env: EnvName, at: UtcTimestamp },

    /// A full promotion was displaced by a later release.
    Superseded {
        release: ReleaseId,
        env: EnvName,
        by: ReleaseId,
        at: UtcTimestamp,
    },
}

impl Event {
    /// The environment this event concerns, if any.
    pub fn env(&self) -> Option<&EnvName> {
        match self {
            Self::CatalogRevisionRecorded { .. }
            | Self::LockRecorded { .. }
            | Self::ReleaseCreated { .. } => None,
            Self::PromotionProposed { env, .. }
            | Self::GateSignaled { env, .. }
            | Self::CanaryStarted { env, .. }
            | Self::CanaryConfirmed { env, .. }
            | Self::DeployedFull { env, .. }
            | Self::PromotionHalted { env, .. }
            | Self::PromotionCancelled { env, .. }
            | Self::RolledBack { env, .. }
            | Self::RollbackNoOp { env, .. }
            | Self::Superseded { env, .. } => Some(env),
        }
    }

    /// When the event happened.
    pub fn at(&self) -> &UtcTimestamp {
        match self {
            Self::CatalogRevisionRecorded { at, .. }
            | Self::LockRecorded { at, .. }
            | Self::ReleaseCreated { at, .. }
            | Self::PromotionProposed { at, .. }
            | Self::GateSignaled { at, .. }
            | Self::CanaryStarted { at, .. }
            | Self::CanaryConfirmed { at, .. }
            | Self::DeployedFull { at, .. }
            | Self::PromotionHalted { at, .. }
            | Self::PromotionCancelled { at, .. }
            | Self::RolledBack { at, .. }
            | Self::RollbackNoOp { at, .. }
            | Self::Superseded { at, .. } => at,
        }
    }

    /// A one-line human description.
    pub fn describe(&self) -> String {
        match self {
            Self::CatalogRevisionRecorded {
                revision, entries, ..
            } => {
                format!("catalog revision '{revision}' recorded ({entries} entries)")
            }
            Self::LockRecorded { artifact, pins, .. } => {
                format!("lock {} recorded ({pins} pins)", artifact.short())
            }
            Self::ReleaseCreated {
                release,
                source_ref,
                ..
            } => {
                format!("release {} created from {source_ref}", release.short())
            }
            Self::PromotionProposed {
                release,
                env,
                requested_by,
                ..
            } => format!(
                "promotion of {} into {env} proposed by {requested_by}",
                release.short()
            ),
            Self::GateSignaled {
                release,
                env,
                gate,
                result,
                ..
            } => format!("{gate} gate for {} in {env}: {result}", release.short()),
            Self::CanaryStarted {
                release,
                env,
                percent,
                ..
            } => format!("canary of {} at {percent}% in {env}", release.short()),
            Self::CanaryConfirmed { release, env, .. } => {
                format!("canary of {} confirmed to full in {env}", release.short())
            }
            Self::DeployedFull { release, env, .. } => {
                format!("{} deployed to full in {env}", release.short())
            }
            Self::PromotionHalted {
                release,
                env,
                gate,
                result,
                ..
            } => format!(
                "promotion of {} into {env} halted ({gate}: {result})",
                release.short()
            ),
            Self::PromotionCancelled { release, env, .. } => {
                format!("promotion of {} into {env} cancelled", release.short())
            }
            Self::RolledBack {
                env,
                restored_release,
                ..
            } => format!("{env} rolled back to {}", restored_release.short()),
            Self::RollbackNoOp { env, .. } => {
                format!("rollback of {env} was a no-op (already rolled back)")
            }
            Self::Superseded {
                release, env, by, ..
            } => format!("{} superseded by {} in {env}", release.short(), by.short()),
        }
    }
}

/// The append-only ledger.
pub struct Ledger<'a> {
    paths: &'a StatePaths,
}

impl<'a> Ledger<'a> {
    pub fn new(paths: &'a StatePaths) -> Self {
        Self { paths }
    }

    /// Append one event, fsyncing before returning.
    pub fn append(&self, event: &Event) -> Result<(), LedgerError> {
        let line =
            serde_json::to_string(event).map_err(|e| LedgerError::Serialize(e.to_string()))?;

        let path = self.paths.ledger_path();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        Ok(())
    }

    /// All events, oldest first.
    pub fn read_all(&self) -> Result<Vec<Event>, LedgerError> {
        let path = self.paths.ledger_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&path)?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event = serde_json::from_str(&line).map_err(|e| LedgerError::Corrupted {
                line: idx + 1,
                message: e.to_string(),
            })?;
            events.push(event);
        }
        Ok(events)
    }

    /// Events for one environment, oldest first.
    pub fn read_env(&self, env: &EnvName) -> Result<Vec<Event>, LedgerError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| e.env() == Some(env))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, StatePaths) {
        let temp = TempDir::new().unwrap();
        let paths = StatePaths::new(temp.path().join("state"));
        paths.ensure_dirs().unwrap();
        (temp, paths)
    }

    fn env(name: &str) -> EnvName {
        EnvName::new(name).unwrap()
    }

    fn proposed(env_name: &str) -> Event {
        Event::PromotionProposed {
            release: ReleaseId::generate(),
            env: env(env_name),
            requested_by: "tester".to_string(),
            canary_percent: Some(10),
            at: UtcTimestamp::now(),
        }
    }

    #[test]
    fn append_then_read_back_in_order() {
        let (_temp, paths) = setup();
        let ledger = Ledger::new(&paths);

        let first = proposed("prod");
        let second = Event::RollbackNoOp {
            env: env("prod"),
            at: UtcTimestamp::now(),
        };
        ledger.append(&first).unwrap();
        ledger.append(&second).unwrap();

        let events = ledger.read_all().unwrap();
        assert_eq!(events, vec![first, second]);
    }

    #[test]
    fn empty_ledger_reads_empty() {
        let (_temp, paths) = setup();
        let ledger = Ledger::new(&paths);
        assert!(ledger.read_all().unwrap().is_empty());
    }

    #[test]
    fn filter_by_environment() {
        let (_temp, paths) = setup();
        let ledger = Ledger::new(&paths);

        ledger.append(&proposed("prod")).unwrap();
        ledger.append(&proposed("staging")).unwrap();
        ledger.append(&proposed("prod")).unwrap();

        assert_eq!(ledger.read_env(&env("prod")).unwrap().len(), 2);
        assert_eq!(ledger.read_env(&env("staging")).unwrap().len(), 1);
    }

    #[test]
    fn catalog_events_carry_no_environment() {
        let event = Event::CatalogRevisionRecorded {
            revision: RevisionId::new("r1").unwrap(),
            entries: 3,
            at: UtcTimestamp::now(),
        };
        assert!(event.env().is_none());
    }

    #[test]
    fn corrupted_line_reported_with_position() {
        let (_temp, paths) = setup();
        let ledger = Ledger::new(&paths);
        std::fs::write(paths.ledger_path(), "not json\n").unwrap();

        match ledger.read_all() {
            Err(LedgerError::Corrupted { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected corruption error, got {other:?}"),
        }
    }
}
