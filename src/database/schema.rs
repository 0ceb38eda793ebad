/*!
 * Database schema definitions and migrations.
 *
 * This module contains the SQL schema for the localization store: the
 * primary tables, the search indexes and the denormalized view cache.
 * Maintenance triggers are created from the trigger registry.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension};

use crate::deletion::triggers;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // Foreign keys are a per-connection setting
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        triggers::install(conn).context("Failed to install maintenance triggers")?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        // v1 is the first released schema, nothing older can be upgraded
        return Err(anyhow::anyhow!(
            "Unknown schema version: {}. Cannot migrate to v{}.",
            current_version,
            SCHEMA_VERSION
        ));
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to check schema_version table existence")?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()
        .context("Failed to read schema version")?;

    Ok(version.unwrap_or(0))
}

/// Set the schema version in the database
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, CAST(strftime('%s', 'now') AS INTEGER))",
        [version],
    )?;
    Ok(())
}

/// Create all database tables
fn create_all_tables(conn: &Connection) -> Result<()> {
    // WAL keeps readers unblocked while the batched deletes commit
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )?;

    // Projects and languages
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            game_code TEXT NOT NULL,
            mod_steam_id TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS languages (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS project_languages (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            language_id TEXT NOT NULL REFERENCES languages(id),
            progress_percent REAL NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(project_id, language_id)
        );

        CREATE INDEX IF NOT EXISTS idx_project_languages_project ON project_languages(project_id);
        "#,
    )?;

    // Units and versions
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS translation_units (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            source_text TEXT NOT NULL,
            context TEXT,
            is_obsolete INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(project_id, key)
        );

        CREATE INDEX IF NOT EXISTS idx_translation_units_project ON translation_units(project_id);

        CREATE TABLE IF NOT EXISTS translation_versions (
            id TEXT PRIMARY KEY,
            unit_id TEXT NOT NULL REFERENCES translation_units(id) ON DELETE CASCADE,
            project_language_id TEXT NOT NULL REFERENCES project_languages(id) ON DELETE CASCADE,
            translated_text TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            translation_source TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(unit_id, project_language_id)
        );

        CREATE INDEX IF NOT EXISTS idx_translation_versions_unit ON translation_versions(unit_id);
        CREATE INDEX IF NOT EXISTS idx_translation_versions_language ON translation_versions(project_language_id);
        CREATE INDEX IF NOT EXISTS idx_translation_versions_status ON translation_versions(project_language_id, status);

        CREATE TABLE IF NOT EXISTS translation_version_history (
            id TEXT PRIMARY KEY,
            version_id TEXT NOT NULL REFERENCES translation_versions(id) ON DELETE CASCADE,
            translated_text TEXT,
            status TEXT NOT NULL,
            changed_by TEXT NOT NULL,
            change_reason TEXT,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_version_history_version ON translation_version_history(version_id);

        CREATE TABLE IF NOT EXISTS translation_version_tm_usage (
            id TEXT PRIMARY KEY,
            version_id TEXT NOT NULL REFERENCES translation_versions(id) ON DELETE CASCADE,
            tm_id TEXT NOT NULL,
            match_confidence REAL NOT NULL,
            applied_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_version_tm_usage_version ON translation_version_tm_usage(version_id);
        "#,
    )?;

    // Batches
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS translation_batches (
            id TEXT PRIMARY KEY,
            project_language_id TEXT NOT NULL REFERENCES project_languages(id) ON DELETE CASCADE,
            provider_id TEXT NOT NULL,
            batch_number INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            started_at INTEGER,
            completed_at INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_translation_batches_language ON translation_batches(project_language_id);

        CREATE TABLE IF NOT EXISTS translation_batch_units (
            id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL REFERENCES translation_batches(id) ON DELETE CASCADE,
            unit_id TEXT NOT NULL REFERENCES translation_units(id) ON DELETE CASCADE,
            processing_order INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            UNIQUE(batch_id, unit_id)
        );

        CREATE INDEX IF NOT EXISTS idx_batch_units_batch ON translation_batch_units(batch_id);
        "#,
    )?;

    // Mod versions
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS mod_versions (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            version_string TEXT NOT NULL,
            is_current INTEGER NOT NULL DEFAULT 0,
            detected_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_mod_versions_project ON mod_versions(project_id);

        CREATE TABLE IF NOT EXISTS mod_version_changes (
            id TEXT PRIMARY KEY,
            version_id TEXT NOT NULL REFERENCES mod_versions(id) ON DELETE CASCADE,
            unit_key TEXT NOT NULL,
            change_type TEXT NOT NULL,
            old_source_text TEXT,
            new_source_text TEXT,
            detected_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_mod_version_changes_version ON mod_version_changes(version_id);
        "#,
    )?;

    // Derived structures
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS translation_view_cache (
            version_id TEXT PRIMARY KEY,
            unit_id TEXT NOT NULL,
            project_id TEXT NOT NULL,
            project_language_id TEXT NOT NULL,
            language_code TEXT NOT NULL,
            unit_key TEXT NOT NULL,
            source_text TEXT NOT NULL,
            translated_text TEXT,
            status TEXT NOT NULL,
            is_obsolete INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_view_cache_project ON translation_view_cache(project_id);
        CREATE INDEX IF NOT EXISTS idx_view_cache_language ON translation_view_cache(project_language_id);
        CREATE INDEX IF NOT EXISTS idx_view_cache_unit ON translation_view_cache(unit_id);

        CREATE VIRTUAL TABLE IF NOT EXISTS translation_units_fts USING fts5(
            key, source_text,
            content='translation_units', content_rowid='rowid'
        );

        CREATE VIRTUAL TABLE IF NOT EXISTS translation_versions_fts USING fts5(
            version_id UNINDEXED, translated_text
        );
        "#,
    )?;

    info!("Database schema created successfully");
    Ok(())
}
