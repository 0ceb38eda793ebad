/*!
 * Cascade plans.
 *
 * A plan is the ordered list of deletes that removes a root entity and
 * everything scoped to it. Children always come before their parents.
 * Every filter binds the root id as `?1`.
 */

use std::fmt;

/// Tables the deletion engine may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Projects,
    ProjectLanguages,
    TranslationUnits,
    TranslationVersions,
    VersionHistory,
    VersionTmUsage,
    TranslationBatches,
    BatchUnits,
    ModVersions,
    ModVersionChanges,
    ViewCache,
    UnitsSearchIndex,
    VersionsSearchIndex,
}

impl Table {
    /// SQL name of the table
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Projects => "projects",
            Table::ProjectLanguages => "project_languages",
            Table::TranslationUnits => "translation_units",
            Table::TranslationVersions => "translation_versions",
            Table::VersionHistory => "translation_version_history",
            Table::VersionTmUsage => "translation_version_tm_usage",
            Table::TranslationBatches => "translation_batches",
            Table::BatchUnits => "translation_batch_units",
            Table::ModVersions => "mod_versions",
            Table::ModVersionChanges => "mod_version_changes",
            Table::ViewCache => "translation_view_cache",
            Table::UnitsSearchIndex => "translation_units_fts",
            Table::VersionsSearchIndex => "translation_versions_fts",
        }
    }

    /// Tables whose rows reference rows of this table.
    ///
    /// Derived tables (cache, search indexes) count as children of the
    /// rows they mirror.
    pub fn children(&self) -> &'static [Table] {
        match self {
            Table::Projects => &[
                Table::ProjectLanguages,
                Table::TranslationUnits,
                Table::ModVersions,
                Table::ViewCache,
            ],
            Table::ProjectLanguages => &[
                Table::TranslationVersions,
                Table::TranslationBatches,
                Table::ViewCache,
            ],
            Table::TranslationUnits => &[
                Table::TranslationVersions,
                Table::BatchUnits,
                Table::ViewCache,
                Table::UnitsSearchIndex,
            ],
            Table::TranslationVersions => &[
                Table::VersionHistory,
                Table::VersionTmUsage,
                Table::ViewCache,
                Table::VersionsSearchIndex,
            ],
            Table::TranslationBatches => &[Table::BatchUnits],
            Table::ModVersions => &[Table::ModVersionChanges],
            _ => &[],
        }
    }

    /// External-content search indexes that can be rebuilt from their table
    pub fn is_rebuildable_index(&self) -> bool {
        matches!(self, Table::UnitsSearchIndex)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a step issues its delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// One `DELETE ... WHERE <filter>` statement
    Direct,
    /// Repeated bounded deletes through the batched purger
    Batched,
}

/// When a step runs relative to trigger suspension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Runs while triggers are still installed
    BeforeSuspend,
    /// Runs with triggers dropped
    Suspended,
}

/// Root entity of a cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionRoot {
    Project,
    ProjectLanguage,
}

impl DeletionRoot {
    /// Entity name used in errors and logs
    pub fn entity(&self) -> &'static str {
        match self {
            DeletionRoot::Project => "project",
            DeletionRoot::ProjectLanguage => "project language",
        }
    }
}

/// One delete in a cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeStep {
    pub table: Table,
    /// `WHERE` clause selecting the rows in scope; binds `?1`
    pub filter: &'static str,
    pub mode: DeleteMode,
    pub phase: Phase,
    /// Expected to hold many rows; the row count is logged
    pub expect_large: bool,
}

impl CascadeStep {
    const fn direct(table: Table, filter: &'static str) -> Self {
        Self {
            table,
            filter,
            mode: DeleteMode::Direct,
            phase: Phase::Suspended,
            expect_large: false,
        }
    }

    const fn batched(table: Table, filter: &'static str) -> Self {
        Self {
            table,
            filter,
            mode: DeleteMode::Batched,
            phase: Phase::Suspended,
            expect_large: true,
        }
    }

    const fn before_suspend(self) -> Self {
        Self {
            phase: Phase::BeforeSuspend,
            ..self
        }
    }

    const fn large(self) -> Self {
        Self {
            expect_large: true,
            ..self
        }
    }

    /// The `DELETE` statement of a direct step
    pub fn delete_sql(&self) -> String {
        format!("DELETE FROM {} WHERE {}", self.table, self.filter)
    }

    /// The `COUNT(*)` statement over the rows in scope
    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM {} WHERE {}", self.table, self.filter)
    }
}

const PROJECT_VERSIONS: &str = "version_id IN (
    SELECT tv.id FROM translation_versions tv
    JOIN translation_units tu ON tu.id = tv.unit_id
    WHERE tu.project_id = ?1)";

const LANGUAGE_VERSIONS: &str =
    "version_id IN (SELECT id FROM translation_versions WHERE project_language_id = ?1)";

/// Ordered deletes for one root
#[derive(Debug, Clone)]
pub struct CascadePlan {
    pub root: DeletionRoot,
    /// Dependent deletes, children before parents
    pub steps: Vec<CascadeStep>,
    /// Delete of the root row itself; zero affected rows means not found
    pub root_step: CascadeStep,
    /// Search indexes to rebuild once triggers are back
    pub rebuild: Vec<Table>,
}

impl CascadePlan {
    /// Plan for removing a whole project
    pub fn for_project() -> Self {
        Self {
            root: DeletionRoot::Project,
            steps: vec![
                CascadeStep::direct(Table::ViewCache, "project_id = ?1")
                    .large()
                    .before_suspend(),
                CascadeStep::direct(Table::VersionTmUsage, PROJECT_VERSIONS),
                CascadeStep::direct(Table::VersionHistory, PROJECT_VERSIONS),
                CascadeStep::direct(Table::VersionsSearchIndex, PROJECT_VERSIONS),
                CascadeStep::direct(
                    Table::BatchUnits,
                    "batch_id IN (
                        SELECT tb.id FROM translation_batches tb
                        JOIN project_languages pl ON pl.id = tb.project_language_id
                        WHERE pl.project_id = ?1)",
                ),
                CascadeStep::direct(
                    Table::TranslationBatches,
                    "project_language_id IN (SELECT id FROM project_languages WHERE project_id = ?1)",
                ),
                CascadeStep::batched(
                    Table::TranslationVersions,
                    "unit_id IN (SELECT id FROM translation_units WHERE project_id = ?1)",
                ),
                CascadeStep::direct(Table::TranslationUnits, "project_id = ?1").large(),
                CascadeStep::direct(
                    Table::ModVersionChanges,
                    "version_id IN (SELECT id FROM mod_versions WHERE project_id = ?1)",
                ),
                CascadeStep::direct(Table::ModVersions, "project_id = ?1"),
                CascadeStep::direct(Table::ProjectLanguages, "project_id = ?1"),
            ],
            root_step: CascadeStep::direct(Table::Projects, "id = ?1"),
            rebuild: vec![Table::UnitsSearchIndex],
        }
    }

    /// Plan for removing one project language
    pub fn for_project_language() -> Self {
        Self {
            root: DeletionRoot::ProjectLanguage,
            steps: vec![
                CascadeStep::direct(Table::ViewCache, "project_language_id = ?1").large(),
                CascadeStep::direct(Table::VersionTmUsage, LANGUAGE_VERSIONS),
                CascadeStep::direct(Table::VersionHistory, LANGUAGE_VERSIONS),
                CascadeStep::direct(Table::VersionsSearchIndex, LANGUAGE_VERSIONS),
                CascadeStep::direct(
                    Table::BatchUnits,
                    "batch_id IN (SELECT id FROM translation_batches WHERE project_language_id = ?1)",
                ),
                CascadeStep::direct(Table::TranslationBatches, "project_language_id = ?1"),
                CascadeStep::batched(Table::TranslationVersions, "project_language_id = ?1"),
            ],
            root_step: CascadeStep::direct(Table::ProjectLanguages, "id = ?1"),
            rebuild: Vec::new(),
        }
    }

    /// Plan for a root
    pub fn for_root(root: DeletionRoot) -> Self {
        match root {
            DeletionRoot::Project => Self::for_project(),
            DeletionRoot::ProjectLanguage => Self::for_project_language(),
        }
    }

    /// Steps of one phase, in order
    pub fn steps_in(&self, phase: Phase) -> impl Iterator<Item = &CascadeStep> {
        self.steps.iter().filter(move |step| step.phase == phase)
    }

    /// Check that no table is deleted before a table holding its children,
    /// and that pre-suspension steps come first.
    pub fn validate(&self) -> Result<(), String> {
        let ordered: Vec<Table> = self
            .steps
            .iter()
            .map(|step| step.table)
            .chain(std::iter::once(self.root_step.table))
            .collect();

        for (i, parent) in ordered.iter().enumerate() {
            for child in parent.children() {
                if let Some(j) = ordered.iter().position(|t| t == child) {
                    if j > i {
                        return Err(format!("{} is deleted before its child {}", parent, child));
                    }
                }
            }
        }

        let first_suspended = self
            .steps
            .iter()
            .position(|step| step.phase == Phase::Suspended)
            .unwrap_or(self.steps.len());
        if self.steps[first_suspended..]
            .iter()
            .any(|step| step.phase == Phase::BeforeSuspend)
        {
            return Err("pre-suspension steps must come first".to_string());
        }

        if self.root_step.mode != DeleteMode::Direct {
            return Err("the root row is deleted with a single statement".to_string());
        }

        Ok(())
    }
}
