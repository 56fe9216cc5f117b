//! The ordered migration chain and its startup validation.

use std::fmt;

use diesel::sqlite::SqliteConnection;

use rentdesk_core::errors::{MigrationError, Result};
use rentdesk_core::migrations::RiskLevel;

/// How a step's statements are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// Statements and the version bump share one transaction.
    Transactional,
    /// Table rebuilds that need `PRAGMA foreign_keys = OFF`, which SQLite
    /// ignores inside a transaction. Recovery relies on the shadow tables.
    Autocommit,
}

pub type ApplyFn = fn(&mut SqliteConnection) -> Result<()>;

#[derive(Clone)]
pub struct MigrationStep {
    pub from: i32,
    pub to: i32,
    pub name: &'static str,
    /// Tables the step alters structurally; each one gets a shadow copy.
    pub at_risk_tables: &'static [&'static str],
    pub risk: RiskLevel,
    pub mode: StepMode,
    pub apply: ApplyFn,
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("name", &self.name)
            .field("at_risk_tables", &self.at_risk_tables)
            .field("risk", &self.risk)
            .field("mode", &self.mode)
            .finish()
    }
}

/// A contiguous `baseline -> latest` chain. Built once and validated up front
/// so a missing link fails at startup instead of silently skipping a version.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    steps: Vec<MigrationStep>,
}

impl MigrationPlan {
    pub fn new(mut steps: Vec<MigrationStep>) -> std::result::Result<Self, MigrationError> {
        if steps.is_empty() {
            return Err(MigrationError::BrokenChain("no migration steps registered".into()));
        }
        steps.sort_by_key(|step| step.from);

        for step in &steps {
            if step.to != step.from + 1 {
                return Err(MigrationError::BrokenChain(format!(
                    "step '{}' jumps from {} to {}",
                    step.name, step.from, step.to
                )));
            }
        }
        for pair in steps.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.from == next.from {
                return Err(MigrationError::BrokenChain(format!(
                    "duplicate steps for version {}: '{}' and '{}'",
                    prev.from, prev.name, next.name
                )));
            }
            if prev.to != next.from {
                return Err(MigrationError::MissingStep {
                    from: prev.to,
                    to: prev.to + 1,
                });
            }
        }

        Ok(Self { steps })
    }

    pub fn baseline_version(&self) -> i32 {
        self.steps.first().map(|s| s.from).unwrap_or_default()
    }

    pub fn latest_version(&self) -> i32 {
        self.steps.last().map(|s| s.to).unwrap_or_default()
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Fails fast unless `from..to` is fully covered by the chain.
    pub fn validate_range(&self, from: i32, to: i32) -> std::result::Result<(), MigrationError> {
        let (min, max) = (self.baseline_version(), self.latest_version());
        for version in [from, to] {
            if version < min || version > max {
                return Err(MigrationError::UnsupportedVersion {
                    found: version,
                    min,
                    max,
                });
            }
        }
        if from > to {
            return Err(MigrationError::BrokenChain(format!(
                "cannot migrate backwards from {} to {}",
                from, to
            )));
        }
        Ok(())
    }

    pub fn steps_between(
        &self,
        from: i32,
        to: i32,
    ) -> std::result::Result<Vec<&MigrationStep>, MigrationError> {
        self.validate_range(from, to)?;
        (from..to)
            .map(|version| {
                self.steps
                    .iter()
                    .find(|step| step.from == version)
                    .ok_or(MigrationError::MissingStep {
                        from: version,
                        to: version + 1,
                    })
            })
            .collect()
    }
}
