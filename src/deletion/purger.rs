/*!
 * Batched row purger.
 *
 * Deletes an unbounded set of rows as a sequence of bounded autocommit
 * deletes, so no single statement holds the write lock for long.
 */

use anyhow::{anyhow, Context, Result};
use log::debug;
use rusqlite::{Connection, ToSql};

use super::plan::Table;

/// Rows removed per statement unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Result of a purge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeOutcome {
    /// Total rows removed
    pub rows_deleted: usize,
    /// Batches that removed at least one row
    pub batches: usize,
    /// Rows removed by the last non-empty batch
    pub last_batch_rows: usize,
    /// Statements issued, including the final empty batch
    pub statements: usize,
}

/// Delete every row of `table` matching `scope_filter`, `batch_size` rows at a time.
///
/// The filter is re-evaluated for each batch, so rows removed by earlier
/// batches are never matched again. Stops on the first batch that deletes
/// nothing.
pub fn purge_in_batches(
    conn: &Connection,
    table: Table,
    scope_filter: &str,
    scope_args: &[&dyn ToSql],
    batch_size: usize,
) -> Result<PurgeOutcome> {
    if batch_size == 0 {
        return Err(anyhow!("Batch size for {} must be positive", table));
    }

    let sql = format!(
        "DELETE FROM {table} WHERE rowid IN (SELECT rowid FROM {table} WHERE {scope_filter} LIMIT {batch_size})"
    );
    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("Failed to prepare batched delete on {}", table))?;

    let mut outcome = PurgeOutcome::default();
    loop {
        let deleted = stmt
            .execute(scope_args)
            .with_context(|| format!("Batch {} on {} failed", outcome.batches + 1, table))?;
        outcome.statements += 1;

        if deleted == 0 {
            break;
        }

        outcome.rows_deleted += deleted;
        outcome.batches += 1;
        outcome.last_batch_rows = deleted;
    }

    debug!(
        "Purged {} rows from {} in {} batches of up to {}",
        outcome.rows_deleted, table, outcome.batches, batch_size
    );
    Ok(outcome)
}
