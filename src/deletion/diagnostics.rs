/*!
 * Counting and timing for deletion runs.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::Connection;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::plan::{CascadePlan, Table};

/// Rows in scope per table before a cascade runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeCounts {
    pub tables: Vec<(Table, i64)>,
}

impl ScopeCounts {
    /// Count the rows each step of `plan` would delete for `root_id`
    pub fn collect(conn: &Connection, plan: &CascadePlan, root_id: &str) -> Result<Self> {
        let mut tables = Vec::with_capacity(plan.steps.len() + 1);
        for step in plan.steps.iter().chain(std::iter::once(&plan.root_step)) {
            let count: i64 = conn
                .query_row(&step.count_sql(), [root_id], |row| row.get(0))
                .with_context(|| format!("Failed to count rows in {}", step.table))?;
            tables.push((step.table, count));
        }
        Ok(Self { tables })
    }

    /// Count for one table, zero when the plan does not touch it
    pub fn get(&self, table: Table) -> i64 {
        self.tables
            .iter()
            .find(|(t, _)| *t == table)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// Sum over all tables
    pub fn total(&self) -> i64 {
        self.tables.iter().map(|(_, count)| count).sum()
    }
}

impl fmt::Display for ScopeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .tables
            .iter()
            .map(|(table, count)| format!("{}={}", table, count))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Wall-clock timing per phase of one deletion
#[derive(Debug)]
pub struct PhaseTimer {
    label: String,
    started: Instant,
    phase_started: Instant,
    phases: Vec<(&'static str, Duration)>,
}

impl PhaseTimer {
    pub fn start(label: impl Into<String>) -> Self {
        let now = Instant::now();
        Self {
            label: label.into(),
            started: now,
            phase_started: now,
            phases: Vec::new(),
        }
    }

    /// Close the current phase under `name`
    pub fn lap(&mut self, name: &'static str) {
        let elapsed = self.phase_started.elapsed();
        debug!("{}: {} took {:?}", self.label, name, elapsed);
        self.phases.push((name, elapsed));
        self.phase_started = Instant::now();
    }

    /// Recorded phases in order
    pub fn phases(&self) -> &[(&'static str, Duration)] {
        &self.phases
    }

    /// Log the total and return it
    pub fn finish(self) -> Duration {
        let total = self.started.elapsed();
        info!("{} completed in {:?} ({} phases)", self.label, total, self.phases.len());
        total
    }
}

/// Counters shared by every deletion run of one service
#[derive(Debug, Default)]
pub struct DeletionMetrics {
    statements: AtomicU64,
    rows_deleted: AtomicU64,
    fast_paths: AtomicU64,
}

/// Point-in-time copy of [`DeletionMetrics`] plus the trigger counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Mutating statements issued
    pub statements: u64,
    /// Rows removed across all tables
    pub rows_deleted: u64,
    /// Language deletions that skipped the cascade
    pub fast_paths: u64,
    pub trigger_suspensions: u64,
    pub trigger_restorations: u64,
}

impl DeletionMetrics {
    pub fn record_statements(&self, count: usize) {
        self.statements.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_rows(&self, count: usize) {
        self.rows_deleted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_fast_path(&self) {
        self.fast_paths.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, trigger_suspensions: u64, trigger_restorations: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            statements: self.statements.load(Ordering::Relaxed),
            rows_deleted: self.rows_deleted.load(Ordering::Relaxed),
            fast_paths: self.fast_paths.load(Ordering::Relaxed),
            trigger_suspensions,
            trigger_restorations,
        }
    }
}
