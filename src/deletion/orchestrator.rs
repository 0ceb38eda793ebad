/*!
 * Deletion orchestrator.
 *
 * Runs a cascade plan against the injected connection:
 * relax pragmas, pre-suspension deletes, suspend triggers, dependent
 * deletes, root delete, restore triggers, rebuild search indexes,
 * restore pragmas. Triggers and pragmas are put back on every path that
 * changed them.
 */

use anyhow::Context;
use log::{debug, error, info, warn};
use std::sync::Arc;

use crate::app_config::DeletionConfig;
use crate::database::DatabaseConnection;
use crate::errors::{StorageError, StorageResult};

use super::diagnostics::{DeletionMetrics, MetricsSnapshot, PhaseTimer, ScopeCounts};
use super::plan::{CascadePlan, CascadeStep, DeleteMode, DeletionRoot, Phase, Table};
use super::pragmas::PragmaState;
use super::purger::{self, DEFAULT_BATCH_SIZE};
use super::triggers::TriggerRegistry;

/// Tunables for a [`DeletionService`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionOptions {
    /// Rows per statement for batched steps
    pub batch_size: usize,
    /// Count rows in scope before deleting (debug logging)
    pub collect_scope_counts: bool,
}

impl Default for DeletionOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            collect_scope_counts: true,
        }
    }
}

impl From<&DeletionConfig> for DeletionOptions {
    fn from(config: &DeletionConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            collect_scope_counts: config.log_scope_counts,
        }
    }
}

/// Removes projects and project languages with everything scoped to them
#[derive(Clone)]
pub struct DeletionService {
    db: DatabaseConnection,
    triggers: Arc<TriggerRegistry>,
    metrics: Arc<DeletionMetrics>,
    options: DeletionOptions,
}

impl DeletionService {
    /// Create a service over the given connection with default options
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_options(db, DeletionOptions::default())
    }

    /// Create a service with explicit options
    pub fn with_options(db: DatabaseConnection, options: DeletionOptions) -> Self {
        Self::with_registry(db, options, Arc::new(TriggerRegistry::new()))
    }

    /// Create a service that cycles the triggers of the given registry
    pub fn with_registry(
        db: DatabaseConnection,
        options: DeletionOptions,
        triggers: Arc<TriggerRegistry>,
    ) -> Self {
        Self {
            db,
            triggers,
            metrics: Arc::new(DeletionMetrics::default()),
            options,
        }
    }

    /// The options in use
    pub fn options(&self) -> DeletionOptions {
        self.options
    }

    /// Counters accumulated by this service
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(
            self.triggers.suspension_count(),
            self.triggers.restoration_count(),
        )
    }

    /// Delete a project and every row scoped to it
    pub async fn delete_project(&self, project_id: &str) -> StorageResult<()> {
        self.run_cascade(CascadePlan::for_project(), project_id).await
    }

    /// Delete one project language and every row scoped to it.
    ///
    /// A language with no versions is removed with a single statement,
    /// without touching triggers or pragmas. Foreign key cascades remove its
    /// batches and their members.
    pub async fn delete_project_language(&self, project_language_id: &str) -> StorageResult<()> {
        let plan = CascadePlan::for_project_language();

        let id = project_language_id.to_string();
        let has_versions = self
            .db
            .execute_async(move |conn| {
                let exists: bool = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM translation_versions WHERE project_language_id = ?1)",
                        [&id],
                        |row| row.get(0),
                    )
                    .context("Failed to check project language versions")?;
                Ok(exists)
            })
            .await
            .map_err(|e| StorageError::store("check project language versions", e))?;

        if has_versions {
            return self.run_cascade(plan, project_language_id).await;
        }

        debug!(
            "Project language {} has no versions, deleting directly",
            project_language_id
        );
        self.metrics.record_fast_path();
        self.delete_root(plan.root, plan.root_step, project_language_id)
            .await
    }

    async fn run_cascade(&self, plan: CascadePlan, root_id: &str) -> StorageResult<()> {
        let entity = plan.root.entity();
        info!("Deleting {} {}", entity, root_id);
        let mut timer = PhaseTimer::start(format!("Delete {} {}", entity, root_id));

        if self.options.collect_scope_counts {
            self.log_scope_counts(&plan, root_id).await;
            timer.lap("count");
        }

        let saved_pragmas = self
            .db
            .execute_async(|conn| PragmaState::relax(conn))
            .await
            .map_err(|e| StorageError::store("relax pragmas", e))?;
        timer.lap("relax pragmas");

        let mut outcome = self.run_phase(&plan, Phase::BeforeSuspend, root_id).await;
        timer.lap("pre-suspension deletes");

        let mut suspend_attempted = false;
        let mut suspend_complete = false;
        if outcome.is_ok() {
            suspend_attempted = true;
            outcome = self.suspend_triggers().await;
            suspend_complete = outcome.is_ok();
            timer.lap("suspend triggers");
        }

        if outcome.is_ok() {
            outcome = self.run_phase(&plan, Phase::Suspended, root_id).await;
        }
        if outcome.is_ok() {
            outcome = self.delete_root(plan.root, plan.root_step, root_id).await;
        }
        timer.lap("cascade");

        let mut restore_error = None;
        if suspend_attempted {
            if let Err(e) = self.restore_triggers(suspend_complete).await {
                restore_error = Some(e);
            }
            timer.lap("restore triggers");
        }

        if suspend_attempted && restore_error.is_none() {
            if let Err(e) = self.rebuild_indexes(&plan.rebuild).await {
                if outcome.is_ok() {
                    outcome = Err(e);
                } else {
                    warn!("Search index rebuild after a failed deletion also failed: {}", e);
                }
            }
            timer.lap("rebuild indexes");
        }

        if let Err(e) = self
            .db
            .execute_async(move |conn| saved_pragmas.restore(conn))
            .await
        {
            error!("Failed to restore pragmas after deleting {} {}: {:#}", entity, root_id, e);
            if outcome.is_ok() {
                outcome = Err(StorageError::store("restore pragmas", e));
            }
        }
        timer.lap("restore pragmas");

        if let Some(source) = restore_error {
            error!(
                "Triggers are missing after deleting {} {}: {:#}. Derived tables stop updating until the triggers are repaired",
                entity, root_id, source
            );
            if let Err(prior) = &outcome {
                error!("Deletion had already failed: {}", prior);
            }
            return Err(StorageError::RestorationFailure {
                prior: outcome.err().map(Box::new),
                source,
            });
        }

        match &outcome {
            Ok(()) => {
                timer.finish();
            }
            Err(e) => error!("Deleting {} {} failed: {}", entity, root_id, e),
        }
        outcome
    }

    async fn log_scope_counts(&self, plan: &CascadePlan, root_id: &str) {
        let plan = plan.clone();
        let id = root_id.to_string();

        match self
            .db
            .execute_async(move |conn| ScopeCounts::collect(conn, &plan, &id))
            .await
        {
            Ok(counts) => debug!("Rows in scope of {}: {}", root_id, counts),
            Err(e) => warn!("Could not count rows in scope of {}: {:#}", root_id, e),
        }
    }

    async fn run_phase(&self, plan: &CascadePlan, phase: Phase, root_id: &str) -> StorageResult<()> {
        for step in plan.steps_in(phase) {
            self.run_step(*step, root_id).await?;
        }
        Ok(())
    }

    async fn run_step(&self, step: CascadeStep, root_id: &str) -> StorageResult<usize> {
        let id = root_id.to_string();
        let batch_size = self.options.batch_size;

        let (rows, statements) = self
            .db
            .execute_async(move |conn| match step.mode {
                DeleteMode::Direct => {
                    let rows = conn
                        .execute(&step.delete_sql(), [&id])
                        .with_context(|| format!("Failed to delete from {}", step.table))?;
                    Ok((rows, 1))
                }
                DeleteMode::Batched => {
                    let outcome =
                        purger::purge_in_batches(conn, step.table, step.filter, &[&id], batch_size)?;
                    Ok((outcome.rows_deleted, outcome.statements))
                }
            })
            .await
            .map_err(|e| StorageError::store(format!("delete {}", step.table), e))?;

        self.metrics.record_statements(statements);
        self.metrics.record_rows(rows);
        if step.expect_large {
            debug!("Deleted {} rows from {}", rows, step.table);
        }
        Ok(rows)
    }

    async fn delete_root(
        &self,
        root: DeletionRoot,
        step: CascadeStep,
        root_id: &str,
    ) -> StorageResult<()> {
        let rows = self.run_step(step, root_id).await?;
        if rows == 0 {
            return Err(StorageError::NotFound {
                entity: root.entity(),
                id: root_id.to_string(),
            });
        }
        Ok(())
    }

    async fn suspend_triggers(&self) -> StorageResult<()> {
        let triggers = self.triggers.clone();
        self.db
            .execute_async(move |conn| triggers.suspend(conn))
            .await
            .map_err(|e| StorageError::store("suspend triggers", e))
    }

    /// Recreate the triggers. After a partial suspend only the missing ones
    /// are created.
    async fn restore_triggers(&self, suspend_complete: bool) -> anyhow::Result<()> {
        let triggers = self.triggers.clone();
        self.db
            .execute_async(move |conn| {
                if suspend_complete {
                    triggers.restore(conn)
                } else {
                    triggers.repair(conn).map(|_| ())
                }
            })
            .await
    }

    async fn rebuild_indexes(&self, tables: &[Table]) -> StorageResult<()> {
        for &table in tables {
            self.db
                .execute_async(move |conn| {
                    conn.execute_batch(&format!(
                        "INSERT INTO {table}({table}) VALUES('rebuild');"
                    ))
                    .with_context(|| format!("Failed to rebuild {}", table))?;
                    Ok(())
                })
                .await
                .map_err(|e| StorageError::store(format!("rebuild {}", table), e))?;
            self.metrics.record_statements(1);
            debug!("Rebuilt search index {}", table);
        }
        Ok(())
    }
}
