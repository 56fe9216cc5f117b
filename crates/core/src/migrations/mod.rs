//! Migration bookkeeping types shared by the storage layer and the app shell.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::MigrationError;

/// Lifecycle of one migration step.
///
/// `Committed` and `Unrecoverable` are terminal. `RolledBack` may only go back
/// to `Pending`, which happens on the next launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationState {
    Pending,
    BackingUp,
    Verified,
    Applying,
    Committed,
    RolledBack,
    Unrecoverable,
}

impl MigrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::BackingUp => "BACKING_UP",
            Self::Verified => "VERIFIED",
            Self::Applying => "APPLYING",
            Self::Committed => "COMMITTED",
            Self::RolledBack => "ROLLED_BACK",
            Self::Unrecoverable => "UNRECOVERABLE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Unrecoverable)
    }

    pub fn can_transition_to(&self, next: MigrationState) -> bool {
        use MigrationState::*;
        matches!(
            (self, next),
            (Pending, BackingUp)
                | (BackingUp, Verified)
                // Verification failure aborts before anything was applied.
                | (BackingUp, RolledBack)
                | (Verified, Applying)
                | (Applying, Committed)
                | (Applying, RolledBack)
                | (Applying, Unrecoverable)
                | (RolledBack, Pending)
        )
    }

    pub fn transition(self, next: MigrationState) -> Result<MigrationState, MigrationError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(MigrationError::IllegalTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of a single step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MigrationOutcome {
    Committed,
    RolledBack {
        error: String,
    },
    Unrecoverable {
        error: String,
        restore_error: String,
    },
}

impl MigrationOutcome {
    pub fn state(&self) -> MigrationState {
        match self {
            Self::Committed => MigrationState::Committed,
            Self::RolledBack { .. } => MigrationState::RolledBack,
            Self::Unrecoverable { .. } => MigrationState::Unrecoverable,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Committed => None,
            Self::RolledBack { error } | Self::Unrecoverable { error, .. } => Some(error),
        }
    }

    /// Maps a failed outcome of step `from -> to` to the error the app shell sees.
    pub fn to_error(&self, from: i32, to: i32) -> Option<MigrationError> {
        match self {
            Self::Committed => None,
            Self::RolledBack { error } => Some(MigrationError::RolledBack {
                from,
                to,
                message: error.clone(),
            }),
            Self::Unrecoverable {
                error,
                restore_error,
            } => Some(MigrationError::Unrecoverable {
                from,
                to,
                message: error.clone(),
                restore_error: restore_error.clone(),
            }),
        }
    }
}

/// How much protection a step gets before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Shadow tables only.
    Low,
    /// Shadow tables plus a JSON export of the at-risk tables.
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub from: i32,
    pub to: i32,
    pub name: String,
    pub outcome: MigrationOutcome,
    pub table_counts_before: BTreeMap<String, i64>,
    pub table_counts_after: BTreeMap<String, i64>,
    pub backup_tables: Vec<String>,
    pub json_export: Option<PathBuf>,
}

/// Everything one `apply_migrations` call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRunReport {
    pub run_id: String,
    pub from_version: i32,
    pub target_version: i32,
    /// Version marker after the run. Equals `target_version` only on success.
    pub reached_version: i32,
    pub steps: Vec<StepReport>,
}

impl MigrationRunReport {
    pub fn new(run_id: impl Into<String>, from_version: i32, target_version: i32) -> Self {
        Self {
            run_id: run_id.into(),
            from_version,
            target_version,
            reached_version: from_version,
            steps: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.reached_version == self.target_version
            && self.steps.iter().all(|step| step.outcome.is_committed())
    }

    pub fn failed_step(&self) -> Option<&StepReport> {
        self.steps.iter().find(|step| !step.outcome.is_committed())
    }

    /// Ok when every step committed, otherwise the failure as a typed error.
    pub fn into_result(self) -> Result<Self, MigrationError> {
        match self
            .failed_step()
            .and_then(|step| step.outcome.to_error(step.from, step.to))
        {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}
