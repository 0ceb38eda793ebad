/*!
 * Common test utilities for the modlingo test suite
 */

use anyhow::Result;
use tempfile::TempDir;

use modlingo::database::models::{
    BatchUnitRecord, LanguageRecord, ModVersionChangeRecord, ModVersionRecord,
    ProjectLanguageRecord, ProjectRecord, TmUsageRecord, TranslationBatchRecord,
    TranslationUnitRecord, TranslationVersionRecord, VersionHistoryRecord,
};
use modlingo::database::{DatabaseConnection, Repository};
use modlingo::deletion::TriggerRegistry;

/// Route library logs to the test output; set RUST_LOG=debug to see them
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Everything seeded for one project
#[derive(Debug, Clone)]
pub struct SeededProject {
    pub project: ProjectRecord,
    /// French first, then German
    pub languages: Vec<ProjectLanguageRecord>,
    pub units: Vec<TranslationUnitRecord>,
    pub versions: Vec<TranslationVersionRecord>,
    pub batches: Vec<TranslationBatchRecord>,
    pub mod_versions: Vec<ModVersionRecord>,
}

impl SeededProject {
    pub fn project_language_ids(&self) -> Vec<String> {
        self.languages.iter().map(|pl| pl.id.clone()).collect()
    }

    pub fn unit_ids(&self) -> Vec<String> {
        self.units.iter().map(|u| u.id.clone()).collect()
    }

    pub fn version_ids(&self) -> Vec<String> {
        self.versions.iter().map(|v| v.id.clone()).collect()
    }

    pub fn batch_ids(&self) -> Vec<String> {
        self.batches.iter().map(|b| b.id.clone()).collect()
    }

    pub fn mod_version_ids(&self) -> Vec<String> {
        self.mod_versions.iter().map(|m| m.id.clone()).collect()
    }
}

/// Two projects sharing the French and German reference languages
pub struct Scenario {
    pub repo: Repository,
    pub french: LanguageRecord,
    pub german: LanguageRecord,
    pub alpha: SeededProject,
    pub beta: SeededProject,
}

impl Scenario {
    pub fn db(&self) -> &DatabaseConnection {
        self.repo.connection()
    }
}

/// Alpha: 3 units x 2 languages = 6 versions, 2 history entries and 1 TM
/// usage on the first version, one French batch holding 2 units, one mod
/// version with 2 changes.
///
/// Beta: 2 units x 2 languages = 4 versions, with its own batch and mod
/// version so both projects overlap on every table.
pub async fn seed_scenario() -> Result<Scenario> {
    init_test_logging();
    let repo = Repository::new_in_memory()?;

    let french = LanguageRecord::new("fr", "French");
    let german = LanguageRecord::new("de", "German");
    repo.create_language(&french).await?;
    repo.create_language(&german).await?;

    let alpha = seed_project(&repo, "Alpha", 3, &[&french, &german], "lighthouse", "phare").await?;

    let first = alpha.versions[0].clone();
    repo.insert_history(&VersionHistoryRecord::new(&first, "translator")).await?;
    repo.insert_history(&VersionHistoryRecord::new(&first, "reviewer")).await?;
    repo.insert_tm_usage(&TmUsageRecord::new(&first.id, "tm-alpha", 0.92)).await?;

    let beta = seed_project(&repo, "Beta", 2, &[&french, &german], "citadel", "forteresse").await?;

    Ok(Scenario {
        repo,
        french,
        german,
        alpha,
        beta,
    })
}

/// Seed a project with `unit_count` units translated into every language.
///
/// Unit source texts contain `unit_word`, version texts contain `version_word`,
/// so each project can be found through the search indexes.
pub async fn seed_project(
    repo: &Repository,
    name: &str,
    unit_count: usize,
    languages: &[&LanguageRecord],
    unit_word: &str,
    version_word: &str,
) -> Result<SeededProject> {
    let project = ProjectRecord::new(name, "wh3");
    repo.create_project(&project).await?;

    let mut project_languages = Vec::new();
    for language in languages {
        let pl = ProjectLanguageRecord::new(&project.id, &language.id);
        repo.add_project_language(&pl).await?;
        project_languages.push(pl);
    }

    let units: Vec<TranslationUnitRecord> = (0..unit_count)
        .map(|i| {
            TranslationUnitRecord::new(
                &project.id,
                format!("{}_key_{}", name.to_lowercase(), i),
                format!("{} source {} {}", name, i, unit_word),
            )
        })
        .collect();
    repo.insert_units(units.clone()).await?;

    let mut versions = Vec::new();
    for pl in &project_languages {
        for (i, unit) in units.iter().enumerate() {
            versions.push(TranslationVersionRecord::translated(
                &unit.id,
                &pl.id,
                format!("{} texte {} {}", name, i, version_word),
            ));
        }
    }
    repo.insert_versions(versions.clone()).await?;

    let batch = TranslationBatchRecord::new(&project_languages[0].id, "mock", 1);
    let members = units
        .iter()
        .take(2)
        .enumerate()
        .map(|(order, unit)| BatchUnitRecord::new(&batch.id, &unit.id, order as i64))
        .collect();
    repo.create_batch(&batch, members).await?;

    let mod_version = ModVersionRecord::new(&project.id, "1.0.0");
    let changes = units
        .iter()
        .take(2)
        .map(|unit| ModVersionChangeRecord::new(&mod_version.id, &unit.key, "added"))
        .collect();
    repo.create_mod_version(&mod_version, changes).await?;

    Ok(SeededProject {
        project,
        languages: project_languages,
        units,
        versions,
        batches: vec![batch],
        mod_versions: vec![mod_version],
    })
}

/// Count rows of `table` whose `column` is one of `ids`
pub fn count_in(db: &DatabaseConnection, table: &str, column: &str, ids: &[String]) -> Result<i64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let placeholders = (1..=ids.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {} IN ({})", table, column, placeholders);

    db.execute(|conn| {
        let count = conn.query_row(&sql, rusqlite::params_from_iter(ids.iter()), |row| row.get(0))?;
        Ok(count)
    })
}

/// Row counts of every table scoped to a seeded project, keyed by table name
pub fn descendant_counts(db: &DatabaseConnection, seeded: &SeededProject) -> Result<Vec<(&'static str, i64)>> {
    let project_ids = vec![seeded.project.id.clone()];
    let unit_ids = seeded.unit_ids();
    let version_ids = seeded.version_ids();
    let pl_ids = seeded.project_language_ids();

    Ok(vec![
        ("translation_units", count_in(db, "translation_units", "id", &unit_ids)?),
        ("translation_versions", count_in(db, "translation_versions", "id", &version_ids)?),
        (
            "translation_version_history",
            count_in(db, "translation_version_history", "version_id", &version_ids)?,
        ),
        (
            "translation_version_tm_usage",
            count_in(db, "translation_version_tm_usage", "version_id", &version_ids)?,
        ),
        ("translation_batches", count_in(db, "translation_batches", "id", &seeded.batch_ids())?),
        (
            "translation_batch_units",
            count_in(db, "translation_batch_units", "batch_id", &seeded.batch_ids())?,
        ),
        ("mod_versions", count_in(db, "mod_versions", "id", &seeded.mod_version_ids())?),
        (
            "mod_version_changes",
            count_in(db, "mod_version_changes", "version_id", &seeded.mod_version_ids())?,
        ),
        ("project_languages", count_in(db, "project_languages", "id", &pl_ids)?),
        ("translation_view_cache", count_in(db, "translation_view_cache", "project_id", &project_ids)?),
        (
            "translation_versions_fts",
            count_in(db, "translation_versions_fts", "version_id", &version_ids)?,
        ),
    ])
}

/// Name and SQL of every trigger in the schema, ordered by name
pub fn trigger_sql(db: &DatabaseConnection) -> Result<Vec<(String, String)>> {
    db.execute(|conn| {
        let mut stmt =
            conn.prepare("SELECT name, sql FROM sqlite_master WHERE type = 'trigger' ORDER BY name")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<(String, String)>>>()?;
        Ok(rows)
    })
}

/// Registered triggers absent from the schema
pub fn missing_triggers(db: &DatabaseConnection) -> Result<Vec<&'static str>> {
    let registry = TriggerRegistry::new();
    db.execute(|conn| registry.missing(conn))
}

/// Current value of an integer pragma
pub fn pragma(db: &DatabaseConnection, name: &str) -> Result<i64> {
    let sql = format!("PRAGMA {}", name);
    db.execute(|conn| Ok(conn.query_row(&sql, [], |row| row.get(0))?))
}
