//! Runs the migration chain step by step with shadow-table rollback.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::{debug, error, info, warn};
use uuid::Uuid;

use rentdesk_core::errors::{Error, Result};
use rentdesk_core::migrations::{
    MigrationOutcome, MigrationRunReport, MigrationState, RiskLevel, StepReport,
};

use super::backup::{export_tables_json, remove_backup_file};
use super::ledger::record_step;
use super::plan::{MigrationPlan, MigrationStep, StepMode};
use super::shadow::{drop_snapshots, restore_snapshots, snapshot_tables, verify_snapshots, TableSnapshot};
use crate::config::{JsonExportPolicy, StoreConfig};
use crate::errors::StorageError;
use crate::sql::{count_rows, set_user_version, table_exists};

pub struct MigrationManager<'a> {
    conn: &'a mut SqliteConnection,
    plan: &'a MigrationPlan,
    backup_dir: PathBuf,
    json_export: JsonExportPolicy,
    cancel: Arc<AtomicBool>,
    whole_file_backup: Option<PathBuf>,
}

impl<'a> MigrationManager<'a> {
    pub fn new(conn: &'a mut SqliteConnection, plan: &'a MigrationPlan, config: &StoreConfig) -> Self {
        Self {
            conn,
            plan,
            backup_dir: config.backup_dir.clone(),
            json_export: config.json_export,
            cancel: Arc::clone(&config.backup_cancel),
            whole_file_backup: None,
        }
    }

    /// Hands the pre-open backup to the manager, which deletes it once the run
    /// commits or rolls back cleanly and keeps it otherwise.
    pub fn with_whole_file_backup(mut self, backup: Option<PathBuf>) -> Self {
        self.whole_file_backup = backup;
        self
    }

    /// Applies every step in `from..to` in order and stops at the first step
    /// that does not commit.
    ///
    /// Invalid ranges fail fast with an error. Step failures are reported in
    /// the returned run report, not as an `Err`.
    pub fn apply_migrations(&mut self, from: i32, to: i32) -> Result<MigrationRunReport> {
        let plan = self.plan;
        let steps = plan.steps_between(from, to)?;
        let run_id = Uuid::now_v7().to_string();
        let mut report = MigrationRunReport::new(run_id.clone(), from, to);

        if steps.is_empty() {
            debug!("[Migration] Schema already at version {}", to);
            self.discard_whole_file_backup();
            return Ok(report);
        }
        info!(
            "[Migration] Migrating schema {} -> {} ({} step(s), run {})",
            from,
            to,
            steps.len(),
            run_id
        );

        for step in steps {
            let started_at = Utc::now();
            let step_report = self.apply_step(step)?;
            record_step(self.conn, &run_id, &step_report, started_at);

            let committed = step_report.outcome.is_committed();
            report.steps.push(step_report);
            if !committed {
                break;
            }
            report.reached_version = step.to;
        }

        match report.failed_step().map(|step| &step.outcome) {
            None | Some(MigrationOutcome::RolledBack { .. }) => self.discard_whole_file_backup(),
            Some(_) => {
                if let Some(path) = &self.whole_file_backup {
                    error!(
                        "[Migration] Keeping whole-file backup {} for manual recovery",
                        path.display()
                    );
                }
            }
        }
        Ok(report)
    }

    fn apply_step(&mut self, step: &MigrationStep) -> Result<StepReport> {
        let state = MigrationState::Pending.transition(MigrationState::BackingUp)?;
        let mut report = StepReport {
            from: step.from,
            to: step.to,
            name: step.name.to_string(),
            outcome: MigrationOutcome::Committed,
            table_counts_before: self.table_counts(step.at_risk_tables)?,
            table_counts_after: BTreeMap::new(),
            backup_tables: Vec::new(),
            json_export: None,
        };

        let snapshots = match self.snapshot(step) {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!(
                    "[Migration] Backup before {} -> {} failed, nothing applied: {}",
                    step.from, step.to, e
                );
                state.transition(MigrationState::RolledBack)?;
                report.outcome = MigrationOutcome::RolledBack {
                    error: e.to_string(),
                };
                report.table_counts_after = report.table_counts_before.clone();
                return Ok(report);
            }
        };
        report.backup_tables = snapshots.iter().map(|s| s.shadow.clone()).collect();
        report.json_export = self.maybe_export_json(step);

        let state = state
            .transition(MigrationState::Verified)?
            .transition(MigrationState::Applying)?;

        // Past this point the step runs to commit or to a finished rollback.
        match self.execute(step) {
            Ok(()) => {
                state.transition(MigrationState::Committed)?;
                if let Err(e) = drop_snapshots(self.conn, &snapshots) {
                    warn!("[Migration] Failed to drop shadow tables: {}", e);
                }
                if let Some(path) = &report.json_export {
                    remove_backup_file(path);
                }
                report.table_counts_after = self.counts_after(step);
                info!(
                    "[Migration] Committed {} -> {} ({}): before {:?}, after {:?}",
                    step.from, step.to, step.name, report.table_counts_before, report.table_counts_after
                );
            }
            Err(apply_error) => {
                warn!(
                    "[Migration] Step {} -> {} ({}) failed, restoring shadow copies: {}",
                    step.from, step.to, step.name, apply_error
                );
                match self.rollback(step, &snapshots) {
                    Ok(()) => {
                        state.transition(MigrationState::RolledBack)?;
                        if let Some(path) = &report.json_export {
                            remove_backup_file(path);
                        }
                        report.outcome = MigrationOutcome::RolledBack {
                            error: apply_error.to_string(),
                        };
                    }
                    Err(restore_error) => {
                        state.transition(MigrationState::Unrecoverable)?;
                        error!(
                            "[Migration] UNRECOVERABLE: step {} -> {} failed ({}) and restoring its tables failed ({}). Shadow tables {:?}, JSON export {:?} and whole-file backup {:?} are kept for manual recovery.",
                            step.from,
                            step.to,
                            apply_error,
                            restore_error,
                            report.backup_tables,
                            report.json_export,
                            self.whole_file_backup
                        );
                        report.outcome = MigrationOutcome::Unrecoverable {
                            error: apply_error.to_string(),
                            restore_error: restore_error.to_string(),
                        };
                    }
                }
                report.table_counts_after = self.counts_after(step);
            }
        }
        Ok(report)
    }

    /// Creates and verifies shadow copies. On verification failure the copies
    /// are dropped again and the step must not run.
    fn snapshot(&mut self, step: &MigrationStep) -> Result<Vec<TableSnapshot>> {
        let snapshots = snapshot_tables(self.conn, step.at_risk_tables)?;
        if let Err(e) = verify_snapshots(self.conn, &snapshots) {
            if let Err(drop_err) = drop_snapshots(self.conn, &snapshots) {
                warn!("[Migration] Failed to drop unverified shadow tables: {}", drop_err);
            }
            return Err(e);
        }
        Ok(snapshots)
    }

    fn maybe_export_json(&mut self, step: &MigrationStep) -> Option<PathBuf> {
        let wanted = match self.json_export {
            JsonExportPolicy::Never => false,
            JsonExportPolicy::Always => true,
            JsonExportPolicy::HighRiskOnly => step.risk == RiskLevel::High,
        };
        if !wanted || step.at_risk_tables.is_empty() {
            return None;
        }
        if self.cancel.load(Ordering::SeqCst) {
            info!("[Backup] JSON export for {} -> {} cancelled", step.from, step.to);
            return None;
        }
        match export_tables_json(self.conn, step.at_risk_tables, step.from, &self.backup_dir) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(
                    "[Backup] JSON export before {} -> {} failed, continuing: {}",
                    step.from, step.to, e
                );
                None
            }
        }
    }

    fn execute(&mut self, step: &MigrationStep) -> Result<()> {
        match step.mode {
            StepMode::Transactional => self
                .conn
                .immediate_transaction::<_, StorageError, _>(|tx| {
                    (step.apply)(tx)?;
                    set_user_version(tx, step.to)?;
                    Ok(())
                })
                .map_err(Error::from),
            StepMode::Autocommit => {
                diesel::sql_query("PRAGMA foreign_keys = OFF")
                    .execute(self.conn)
                    .map_err(StorageError::from)?;
                let result =
                    (step.apply)(self.conn).and_then(|()| set_user_version(self.conn, step.to));
                if let Err(e) = diesel::sql_query("PRAGMA foreign_keys = ON").execute(self.conn) {
                    warn!("[Migration] Failed to re-enable foreign keys: {}", e);
                }
                result
            }
        }
    }

    fn rollback(&mut self, step: &MigrationStep, snapshots: &[TableSnapshot]) -> Result<()> {
        restore_snapshots(self.conn, snapshots)?;
        set_user_version(self.conn, step.from)
    }

    fn table_counts(&mut self, tables: &[&str]) -> Result<BTreeMap<String, i64>> {
        let mut counts = BTreeMap::new();
        for table in tables {
            if table_exists(self.conn, table)? {
                counts.insert(table.to_string(), count_rows(self.conn, table)?);
            }
        }
        Ok(counts)
    }

    /// Counts taken once the step has finished are informational only. Failing
    /// to read them must not lose the step's outcome.
    fn counts_after(&mut self, step: &MigrationStep) -> BTreeMap<String, i64> {
        self.table_counts(step.at_risk_tables).unwrap_or_else(|e| {
            warn!(
                "[Migration] Could not count tables after step {} -> {}: {}",
                step.from, step.to, e
            );
            BTreeMap::new()
        })
    }

    fn discard_whole_file_backup(&mut self) {
        if let Some(path) = self.whole_file_backup.take() {
            remove_backup_file(&path);
            debug!("[Backup] Removed whole-file backup {}", path.display());
        }
    }

    pub fn whole_file_backup(&self) -> Option<&Path> {
        self.whole_file_backup.as_deref()
    }
}
