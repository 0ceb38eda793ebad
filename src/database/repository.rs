/*!
 * Repository layer for database operations.
 *
 * Thin insert/update/query wrappers over the localization store. Bulk
 * removal of projects and languages lives in the deletion engine, not here.
 */

use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};

use super::connection::DatabaseConnection;
use super::models::{
    BatchUnitRecord, LanguageRecord, ModVersionChangeRecord, ModVersionRecord,
    ProjectLanguageRecord, ProjectRecord, TmUsageRecord, TranslationBatchRecord,
    TranslationStatus, TranslationUnitRecord, TranslationVersionRecord, VersionHistoryRecord,
    ViewCacheRecord,
};

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// The underlying connection handle
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // Projects and languages
    // =========================================================================

    /// Create a project
    pub async fn create_project(&self, project: &ProjectRecord) -> Result<()> {
        let project = project.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO projects (id, name, game_code, mod_steam_id, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                    params![
                        project.id,
                        project.name,
                        project.game_code,
                        project.mod_steam_id,
                        project.created_at,
                        project.updated_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Get a project by ID
    pub async fn get_project(&self, project_id: &str) -> Result<Option<ProjectRecord>> {
        let project_id = project_id.to_string();

        self.db
            .execute_async(move |conn| {
                let result = conn
                    .query_row(
                        r#"
                        SELECT id, name, game_code, mod_steam_id, created_at, updated_at
                        FROM projects WHERE id = ?1
                        "#,
                        [&project_id],
                        |row| {
                            Ok(ProjectRecord {
                                id: row.get(0)?,
                                name: row.get(1)?,
                                game_code: row.get(2)?,
                                mod_steam_id: row.get(3)?,
                                created_at: row.get(4)?,
                                updated_at: row.get(5)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(result)
            })
            .await
    }

    /// Register a reference language
    pub async fn create_language(&self, language: &LanguageRecord) -> Result<()> {
        let language = language.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "INSERT INTO languages (id, code, name) VALUES (?1, ?2, ?3)",
                    params![language.id, language.code, language.name],
                )?;
                Ok(())
            })
            .await
    }

    /// Add a target language to a project
    pub async fn add_project_language(&self, project_language: &ProjectLanguageRecord) -> Result<()> {
        let pl = project_language.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO project_languages (
                        id, project_id, language_id, progress_percent, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                    params![
                        pl.id,
                        pl.project_id,
                        pl.language_id,
                        pl.progress_percent,
                        pl.created_at,
                        pl.updated_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Get a project language by ID
    pub async fn get_project_language(&self, id: &str) -> Result<Option<ProjectLanguageRecord>> {
        let id = id.to_string();

        self.db
            .execute_async(move |conn| {
                let result = conn
                    .query_row(
                        r#"
                        SELECT id, project_id, language_id, progress_percent, created_at, updated_at
                        FROM project_languages WHERE id = ?1
                        "#,
                        [&id],
                        |row| {
                            Ok(ProjectLanguageRecord {
                                id: row.get(0)?,
                                project_id: row.get(1)?,
                                language_id: row.get(2)?,
                                progress_percent: row.get(3)?,
                                created_at: row.get(4)?,
                                updated_at: row.get(5)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(result)
            })
            .await
    }

    // =========================================================================
    // Units and versions
    // =========================================================================

    /// Insert translation units (batch insert)
    pub async fn insert_units(&self, units: Vec<TranslationUnitRecord>) -> Result<()> {
        self.db
            .transaction_async(move |tx| {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO translation_units (
                        id, project_id, key, source_text, context, is_obsolete, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#,
                )?;
                for unit in units {
                    stmt.execute(params![
                        unit.id,
                        unit.project_id,
                        unit.key,
                        unit.source_text,
                        unit.context,
                        unit.is_obsolete,
                        unit.created_at,
                        unit.updated_at,
                    ])?;
                }
                Ok(())
            })
            .await
    }

    /// Insert translation versions (batch insert)
    pub async fn insert_versions(&self, versions: Vec<TranslationVersionRecord>) -> Result<()> {
        self.db
            .transaction_async(move |tx| {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO translation_versions (
                        id, unit_id, project_language_id, translated_text, status,
                        translation_source, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#,
                )?;
                for version in versions {
                    stmt.execute(params![
                        version.id,
                        version.unit_id,
                        version.project_language_id,
                        version.translated_text,
                        version.status.to_string(),
                        version.translation_source,
                        version.created_at,
                        version.updated_at,
                    ])?;
                }
                Ok(())
            })
            .await
    }

    /// Change the status of a version
    pub async fn update_version_status(&self, version_id: &str, status: TranslationStatus) -> Result<()> {
        let version_id = version_id.to_string();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "UPDATE translation_versions SET status = ?1 WHERE id = ?2",
                    params![status.to_string(), version_id],
                )?;
                Ok(())
            })
            .await
    }

    /// Replace the translated text of a version
    pub async fn update_version_text(&self, version_id: &str, text: &str) -> Result<()> {
        let version_id = version_id.to_string();
        let text = text.to_string();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "UPDATE translation_versions SET translated_text = ?1 WHERE id = ?2",
                    params![text, version_id],
                )?;
                Ok(())
            })
            .await
    }

    /// Append a history entry
    pub async fn insert_history(&self, entry: &VersionHistoryRecord) -> Result<()> {
        let entry = entry.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO translation_version_history (
                        id, version_id, translated_text, status, changed_by, change_reason, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                    params![
                        entry.id,
                        entry.version_id,
                        entry.translated_text,
                        entry.status.to_string(),
                        entry.changed_by,
                        entry.change_reason,
                        entry.created_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Record a translation memory reuse
    pub async fn insert_tm_usage(&self, usage: &TmUsageRecord) -> Result<()> {
        let usage = usage.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO translation_version_tm_usage (id, version_id, tm_id, match_confidence, applied_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![
                        usage.id,
                        usage.version_id,
                        usage.tm_id,
                        usage.match_confidence,
                        usage.applied_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    // =========================================================================
    // Batches and mod versions
    // =========================================================================

    /// Create a translation batch with its unit memberships
    pub async fn create_batch(
        &self,
        batch: &TranslationBatchRecord,
        units: Vec<BatchUnitRecord>,
    ) -> Result<()> {
        let batch = batch.clone();

        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    r#"
                    INSERT INTO translation_batches (
                        id, project_language_id, provider_id, batch_number, status, started_at, completed_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                    params![
                        batch.id,
                        batch.project_language_id,
                        batch.provider_id,
                        batch.batch_number,
                        batch.status,
                        batch.started_at,
                        batch.completed_at,
                    ],
                )?;
                for unit in units {
                    tx.execute(
                        r#"
                        INSERT INTO translation_batch_units (id, batch_id, unit_id, processing_order, status)
                        VALUES (?1, ?2, ?3, ?4, ?5)
                        "#,
                        params![unit.id, unit.batch_id, unit.unit_id, unit.processing_order, unit.status],
                    )?;
                }
                Ok(())
            })
            .await
    }

    /// Record a mod release with its detected changes
    pub async fn create_mod_version(
        &self,
        version: &ModVersionRecord,
        changes: Vec<ModVersionChangeRecord>,
    ) -> Result<()> {
        let version = version.clone();

        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    r#"
                    INSERT INTO mod_versions (id, project_id, version_string, is_current, detected_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![
                        version.id,
                        version.project_id,
                        version.version_string,
                        version.is_current,
                        version.detected_at,
                    ],
                )?;
                for change in changes {
                    tx.execute(
                        r#"
                        INSERT INTO mod_version_changes (
                            id, version_id, unit_key, change_type, old_source_text, new_source_text, detected_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                        "#,
                        params![
                            change.id,
                            change.version_id,
                            change.unit_key,
                            change.change_type,
                            change.old_source_text,
                            change.new_source_text,
                            change.detected_at,
                        ],
                    )?;
                }
                Ok(())
            })
            .await
    }

    // =========================================================================
    // Derived structures
    // =========================================================================

    /// View cache rows of a project language, ordered by unit key
    pub async fn get_cache_rows(&self, project_language_id: &str) -> Result<Vec<ViewCacheRecord>> {
        let project_language_id = project_language_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT version_id, unit_id, project_id, project_language_id, language_code,
                           unit_key, source_text, translated_text, status, is_obsolete
                    FROM translation_view_cache
                    WHERE project_language_id = ?1
                    ORDER BY unit_key
                    "#,
                )?;

                let rows = stmt.query_map([&project_language_id], |row| {
                    Ok(ViewCacheRecord {
                        version_id: row.get(0)?,
                        unit_id: row.get(1)?,
                        project_id: row.get(2)?,
                        project_language_id: row.get(3)?,
                        language_code: row.get(4)?,
                        unit_key: row.get(5)?,
                        source_text: row.get(6)?,
                        translated_text: row.get(7)?,
                        status: row
                            .get::<_, String>(8)?
                            .parse()
                            .unwrap_or(TranslationStatus::Pending),
                        is_obsolete: row.get(9)?,
                    })
                })?;

                let records: Vec<ViewCacheRecord> = rows.filter_map(|r| r.ok()).collect();
                Ok(records)
            })
            .await
    }

    /// Ids of live units whose key or source text matches an FTS query
    pub async fn search_units(&self, query: &str) -> Result<Vec<String>> {
        let query = query.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT tu.id
                    FROM translation_units_fts f
                    JOIN translation_units tu ON tu.rowid = f.rowid
                    WHERE translation_units_fts MATCH ?1
                    ORDER BY tu.id
                    "#,
                )?;
                let ids = stmt
                    .query_map([&query], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(ids)
            })
            .await
    }

    /// Ids of versions whose translated text matches an FTS query
    pub async fn search_versions(&self, query: &str) -> Result<Vec<String>> {
        let query = query.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT version_id FROM translation_versions_fts
                    WHERE translation_versions_fts MATCH ?1
                    ORDER BY version_id
                    "#,
                )?;
                let ids = stmt
                    .query_map([&query], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(ids)
            })
            .await
    }

    /// Raw hit count of the units index, including entries whose row is gone
    pub async fn count_unit_index_hits(&self, query: &str) -> Result<i64> {
        let query = query.to_string();

        self.db
            .execute_async(move |conn| {
                let count = conn.query_row(
                    "SELECT COUNT(*) FROM translation_units_fts WHERE translation_units_fts MATCH ?1",
                    [&query],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
    }

    /// Number of versions in a project language
    pub async fn count_versions(&self, project_language_id: &str) -> Result<i64> {
        let project_language_id = project_language_id.to_string();

        self.db
            .execute_async(move |conn| Self::count_versions_sync(conn, &project_language_id))
            .await
    }

    fn count_versions_sync(conn: &Connection, project_language_id: &str) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM translation_versions WHERE project_language_id = ?1",
            [project_language_id],
            |row| row.get(0),
        )?;
        debug!("Project language {} has {} versions", project_language_id, count);
        Ok(count)
    }
}
