/*!
 * Trigger registry.
 *
 * Every trigger that keeps the search indexes, the view cache, the
 * progress percentage and the `updated_at` columns in sync is declared once
 * in [`TRIGGERS`]. The schema installer and the deletion engine both create
 * triggers from this list, so the definitions restored after a bulk delete
 * are the definitions the database was created with.
 */

use anyhow::{Context, Result};
use log::{debug, warn};
use rusqlite::Connection;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// A named trigger and the exact statement that creates it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerDef {
    /// Trigger name as stored in `sqlite_master`
    pub name: &'static str,
    /// Table the trigger fires on
    pub table: &'static str,
    /// Full `CREATE TRIGGER` statement
    pub create_sql: &'static str,
}

/// All maintenance triggers, in creation order
pub const TRIGGERS: &[TriggerDef] = &[
    // Units search index (external content, rowid-linked)
    TriggerDef {
        name: "trg_translation_units_fts_insert",
        table: "translation_units",
        create_sql: r#"CREATE TRIGGER trg_translation_units_fts_insert
AFTER INSERT ON translation_units
BEGIN
    INSERT INTO translation_units_fts(rowid, key, source_text)
    VALUES (NEW.rowid, NEW.key, NEW.source_text);
END"#,
    },
    TriggerDef {
        name: "trg_translation_units_fts_delete",
        table: "translation_units",
        create_sql: r#"CREATE TRIGGER trg_translation_units_fts_delete
AFTER DELETE ON translation_units
BEGIN
    INSERT INTO translation_units_fts(translation_units_fts, rowid, key, source_text)
    VALUES ('delete', OLD.rowid, OLD.key, OLD.source_text);
END"#,
    },
    TriggerDef {
        name: "trg_translation_units_fts_update",
        table: "translation_units",
        create_sql: r#"CREATE TRIGGER trg_translation_units_fts_update
AFTER UPDATE OF key, source_text ON translation_units
BEGIN
    INSERT INTO translation_units_fts(translation_units_fts, rowid, key, source_text)
    VALUES ('delete', OLD.rowid, OLD.key, OLD.source_text);
    INSERT INTO translation_units_fts(rowid, key, source_text)
    VALUES (NEW.rowid, NEW.key, NEW.source_text);
END"#,
    },
    // Versions search index (standalone, only ever written by these triggers)
    TriggerDef {
        name: "trg_translation_versions_fts_insert",
        table: "translation_versions",
        create_sql: r#"CREATE TRIGGER trg_translation_versions_fts_insert
AFTER INSERT ON translation_versions
WHEN NEW.translated_text IS NOT NULL
BEGIN
    INSERT INTO translation_versions_fts(version_id, translated_text)
    VALUES (NEW.id, NEW.translated_text);
END"#,
    },
    TriggerDef {
        name: "trg_translation_versions_fts_delete",
        table: "translation_versions",
        create_sql: r#"CREATE TRIGGER trg_translation_versions_fts_delete
AFTER DELETE ON translation_versions
BEGIN
    DELETE FROM translation_versions_fts WHERE version_id = OLD.id;
END"#,
    },
    TriggerDef {
        name: "trg_translation_versions_fts_update",
        table: "translation_versions",
        create_sql: r#"CREATE TRIGGER trg_translation_versions_fts_update
AFTER UPDATE OF translated_text ON translation_versions
BEGIN
    DELETE FROM translation_versions_fts WHERE version_id = OLD.id;
    INSERT INTO translation_versions_fts(version_id, translated_text)
    SELECT NEW.id, NEW.translated_text WHERE NEW.translated_text IS NOT NULL;
END"#,
    },
    // View cache
    TriggerDef {
        name: "trg_view_cache_version_insert",
        table: "translation_versions",
        create_sql: r#"CREATE TRIGGER trg_view_cache_version_insert
AFTER INSERT ON translation_versions
BEGIN
    INSERT OR REPLACE INTO translation_view_cache (
        version_id, unit_id, project_id, project_language_id, language_code,
        unit_key, source_text, translated_text, status, is_obsolete, updated_at
    )
    SELECT NEW.id, tu.id, tu.project_id, NEW.project_language_id, l.code,
           tu.key, tu.source_text, NEW.translated_text, NEW.status, tu.is_obsolete, NEW.updated_at
    FROM translation_units tu
    JOIN project_languages pl ON pl.id = NEW.project_language_id
    JOIN languages l ON l.id = pl.language_id
    WHERE tu.id = NEW.unit_id;
END"#,
    },
    TriggerDef {
        name: "trg_view_cache_version_update",
        table: "translation_versions",
        create_sql: r#"CREATE TRIGGER trg_view_cache_version_update
AFTER UPDATE OF translated_text, status ON translation_versions
BEGIN
    UPDATE translation_view_cache
    SET translated_text = NEW.translated_text,
        status = NEW.status,
        updated_at = NEW.updated_at
    WHERE version_id = NEW.id;
END"#,
    },
    TriggerDef {
        name: "trg_view_cache_version_delete",
        table: "translation_versions",
        create_sql: r#"CREATE TRIGGER trg_view_cache_version_delete
AFTER DELETE ON translation_versions
BEGIN
    DELETE FROM translation_view_cache WHERE version_id = OLD.id;
END"#,
    },
    TriggerDef {
        name: "trg_view_cache_unit_update",
        table: "translation_units",
        create_sql: r#"CREATE TRIGGER trg_view_cache_unit_update
AFTER UPDATE OF key, source_text, is_obsolete ON translation_units
BEGIN
    UPDATE translation_view_cache
    SET unit_key = NEW.key,
        source_text = NEW.source_text,
        is_obsolete = NEW.is_obsolete
    WHERE unit_id = NEW.id;
END"#,
    },
    TriggerDef {
        name: "trg_view_cache_unit_delete",
        table: "translation_units",
        create_sql: r#"CREATE TRIGGER trg_view_cache_unit_delete
AFTER DELETE ON translation_units
BEGIN
    DELETE FROM translation_view_cache WHERE unit_id = OLD.id;
END"#,
    },
    // Progress percentage
    TriggerDef {
        name: "trg_project_language_progress",
        table: "translation_versions",
        create_sql: r#"CREATE TRIGGER trg_project_language_progress
AFTER UPDATE OF status ON translation_versions
WHEN OLD.status IS NOT NEW.status
BEGIN
    UPDATE project_languages
    SET progress_percent = (
            SELECT COALESCE(ROUND(
                100.0 * SUM(CASE WHEN status IN ('translated', 'reviewed') THEN 1 ELSE 0 END)
                / COUNT(*), 2), 0)
            FROM translation_versions
            WHERE project_language_id = NEW.project_language_id
        ),
        updated_at = CAST(strftime('%s', 'now') AS INTEGER)
    WHERE id = NEW.project_language_id;
END"#,
    },
    // Timestamps
    TriggerDef {
        name: "trg_translation_units_updated_at",
        table: "translation_units",
        create_sql: r#"CREATE TRIGGER trg_translation_units_updated_at
AFTER UPDATE ON translation_units
WHEN NEW.updated_at = OLD.updated_at
BEGIN
    UPDATE translation_units
    SET updated_at = CAST(strftime('%s', 'now') AS INTEGER)
    WHERE id = NEW.id;
END"#,
    },
    TriggerDef {
        name: "trg_translation_versions_updated_at",
        table: "translation_versions",
        create_sql: r#"CREATE TRIGGER trg_translation_versions_updated_at
AFTER UPDATE ON translation_versions
WHEN NEW.updated_at = OLD.updated_at
BEGIN
    UPDATE translation_versions
    SET updated_at = CAST(strftime('%s', 'now') AS INTEGER)
    WHERE id = NEW.id;
END"#,
    },
];

/// Suspends and restores the maintenance triggers.
///
/// The registry holds no connection; the orchestrator hands it the one it
/// was constructed with. The counters let callers observe how often the
/// triggers were cycled.
#[derive(Debug)]
pub struct TriggerRegistry {
    definitions: Vec<TriggerDef>,
    suspensions: AtomicU64,
    restorations: AtomicU64,
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::with_definitions(TRIGGERS.to_vec())
    }
}

impl TriggerRegistry {
    /// Create a registry over [`TRIGGERS`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry over an explicit definition list.
    ///
    /// Definitions are suspended and restored in the given order.
    pub fn with_definitions(definitions: Vec<TriggerDef>) -> Self {
        Self {
            definitions,
            suspensions: AtomicU64::new(0),
            restorations: AtomicU64::new(0),
        }
    }

    /// The registered definitions
    pub fn definitions(&self) -> &[TriggerDef] {
        &self.definitions
    }

    /// Drop every registered trigger. Triggers that are already gone are skipped.
    pub fn suspend(&self, conn: &Connection) -> Result<()> {
        for def in &self.definitions {
            conn.execute_batch(&format!("DROP TRIGGER IF EXISTS {};", def.name))
                .with_context(|| format!("Failed to drop trigger {}", def.name))?;
        }

        self.suspensions.fetch_add(1, Ordering::Relaxed);
        debug!("Suspended {} triggers", self.definitions.len());
        Ok(())
    }

    /// Recreate every registered trigger.
    ///
    /// Must follow a [`suspend`](Self::suspend); creating a trigger that
    /// already exists fails.
    pub fn restore(&self, conn: &Connection) -> Result<()> {
        install_definitions(conn, &self.definitions)?;
        self.restorations.fetch_add(1, Ordering::Relaxed);
        debug!("Restored {} triggers", self.definitions.len());
        Ok(())
    }

    /// Names of registered triggers that are absent from the schema
    pub fn missing(&self, conn: &Connection) -> Result<Vec<&'static str>> {
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'trigger'")?;
        let present: HashSet<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()
            .context("Failed to list triggers")?;

        Ok(self
            .definitions
            .iter()
            .filter(|def| !present.contains(def.name))
            .map(|def| def.name)
            .collect())
    }

    /// Recreate only the registered triggers that are missing.
    ///
    /// Manual remediation after a failed restore; returns the names created.
    pub fn repair(&self, conn: &Connection) -> Result<Vec<&'static str>> {
        let missing = self.missing(conn)?;
        for name in &missing {
            if let Some(def) = self.definitions.iter().find(|def| def.name == *name) {
                conn.execute_batch(def.create_sql)
                    .with_context(|| format!("Failed to create trigger {}", def.name))?;
                warn!("Recreated missing trigger {}", def.name);
            }
        }
        Ok(missing)
    }

    /// Number of completed `suspend` calls
    pub fn suspension_count(&self) -> u64 {
        self.suspensions.load(Ordering::Relaxed)
    }

    /// Number of completed `restore` calls
    pub fn restoration_count(&self) -> u64 {
        self.restorations.load(Ordering::Relaxed)
    }
}

/// Create every registered trigger. Used for fresh schemas and for restore.
pub fn install(conn: &Connection) -> Result<()> {
    install_definitions(conn, TRIGGERS)
}

fn install_definitions(conn: &Connection, definitions: &[TriggerDef]) -> Result<()> {
    for def in definitions {
        conn.execute_batch(def.create_sql)
            .with_context(|| format!("Failed to create trigger {}", def.name))?;
    }
    Ok(())
}
