/*!
 * Durability settings relaxed for the length of a cascade.
 */

use anyhow::{Context, Result};
use log::debug;
use rusqlite::Connection;

/// Connection settings observed before a cascade started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PragmaState {
    /// `PRAGMA synchronous` (0 = OFF, 1 = NORMAL, 2 = FULL, 3 = EXTRA)
    pub synchronous: i64,
    /// `PRAGMA foreign_keys`
    pub foreign_keys: bool,
}

impl PragmaState {
    /// Read the current settings
    pub fn capture(conn: &Connection) -> Result<Self> {
        let synchronous: i64 = conn
            .query_row("PRAGMA synchronous", [], |row| row.get(0))
            .context("Failed to read synchronous pragma")?;
        let foreign_keys: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .context("Failed to read foreign_keys pragma")?;

        Ok(Self {
            synchronous,
            foreign_keys: foreign_keys != 0,
        })
    }

    /// Capture the current settings, then switch to `synchronous = OFF`
    /// and `foreign_keys = OFF`.
    pub fn relax(conn: &Connection) -> Result<Self> {
        let saved = Self::capture(conn)?;
        conn.execute_batch("PRAGMA synchronous = OFF; PRAGMA foreign_keys = OFF;")
            .context("Failed to relax durability pragmas")?;
        debug!(
            "Relaxed pragmas (was synchronous={}, foreign_keys={})",
            saved.synchronous, saved.foreign_keys
        );
        Ok(saved)
    }

    /// Put these settings back on the connection
    pub fn restore(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "PRAGMA synchronous = {}; PRAGMA foreign_keys = {};",
            self.synchronous,
            if self.foreign_keys { "ON" } else { "OFF" }
        ))
        .context("Failed to restore durability pragmas")?;
        debug!("Restored pragmas");
        Ok(())
    }
}
