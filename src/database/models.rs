/*!
 * Database entity models.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted data. Ids are UUID strings and
 * timestamps are unix seconds.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Translation status of a single version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationStatus {
    /// Not translated yet
    Pending,
    /// Translated, not reviewed
    Translated,
    /// Translated and approved
    Reviewed,
    /// Flagged for another look
    NeedsReview,
}

impl TranslationStatus {
    /// Whether this status counts toward the progress percentage
    pub fn is_complete(&self) -> bool {
        matches!(self, TranslationStatus::Translated | TranslationStatus::Reviewed)
    }
}

impl fmt::Display for TranslationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslationStatus::Pending => write!(f, "pending"),
            TranslationStatus::Translated => write!(f, "translated"),
            TranslationStatus::Reviewed => write!(f, "reviewed"),
            TranslationStatus::NeedsReview => write!(f, "needs_review"),
        }
    }
}

impl std::str::FromStr for TranslationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TranslationStatus::Pending),
            "translated" => Ok(TranslationStatus::Translated),
            "reviewed" => Ok(TranslationStatus::Reviewed),
            "needs_review" => Ok(TranslationStatus::NeedsReview),
            _ => Err(anyhow::anyhow!("Invalid translation status: {}", s)),
        }
    }
}

/// Localization project for one mod
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
    /// Game the mod belongs to
    pub game_code: String,
    /// Workshop id of the source mod, if any
    pub mod_steam_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ProjectRecord {
    /// Create a new project record with a fresh id
    pub fn new(name: impl Into<String>, game_code: impl Into<String>) -> Self {
        let now = now();
        Self {
            id: new_id(),
            name: name.into(),
            game_code: game_code.into(),
            mod_steam_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Reference language (shared by all projects)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageRecord {
    pub id: String,
    /// Short code, e.g. "fr"
    pub code: String,
    pub name: String,
}

impl LanguageRecord {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            code: code.into(),
            name: name.into(),
        }
    }
}

/// A target language of a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectLanguageRecord {
    pub id: String,
    pub project_id: String,
    pub language_id: String,
    /// Share of versions translated or reviewed, maintained by trigger
    pub progress_percent: f64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ProjectLanguageRecord {
    pub fn new(project_id: impl Into<String>, language_id: impl Into<String>) -> Self {
        let now = now();
        Self {
            id: new_id(),
            project_id: project_id.into(),
            language_id: language_id.into(),
            progress_percent: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A source string of the mod
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationUnitRecord {
    pub id: String,
    pub project_id: String,
    /// Localization key from the mod's string tables
    pub key: String,
    pub source_text: String,
    pub context: Option<String>,
    pub is_obsolete: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TranslationUnitRecord {
    pub fn new(
        project_id: impl Into<String>,
        key: impl Into<String>,
        source_text: impl Into<String>,
    ) -> Self {
        let now = now();
        Self {
            id: new_id(),
            project_id: project_id.into(),
            key: key.into(),
            source_text: source_text.into(),
            context: None,
            is_obsolete: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per-language translation state of a unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationVersionRecord {
    pub id: String,
    pub unit_id: String,
    pub project_language_id: String,
    pub translated_text: Option<String>,
    pub status: TranslationStatus,
    /// Where the text came from ("manual", "tm", "llm", ...)
    pub translation_source: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TranslationVersionRecord {
    /// Create a pending version with no text
    pub fn new(unit_id: impl Into<String>, project_language_id: impl Into<String>) -> Self {
        let now = now();
        Self {
            id: new_id(),
            unit_id: unit_id.into(),
            project_language_id: project_language_id.into(),
            translated_text: None,
            status: TranslationStatus::Pending,
            translation_source: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a translated version
    pub fn translated(
        unit_id: impl Into<String>,
        project_language_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            translated_text: Some(text.into()),
            status: TranslationStatus::Translated,
            translation_source: Some("manual".to_string()),
            ..Self::new(unit_id, project_language_id)
        }
    }
}

/// Audit trail entry of a version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionHistoryRecord {
    pub id: String,
    pub version_id: String,
    pub translated_text: Option<String>,
    pub status: TranslationStatus,
    pub changed_by: String,
    pub change_reason: Option<String>,
    pub created_at: i64,
}

impl VersionHistoryRecord {
    pub fn new(version: &TranslationVersionRecord, changed_by: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            version_id: version.id.clone(),
            translated_text: version.translated_text.clone(),
            status: version.status,
            changed_by: changed_by.into(),
            change_reason: None,
            created_at: now(),
        }
    }
}

/// Translation memory reuse by a version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmUsageRecord {
    pub id: String,
    pub version_id: String,
    pub tm_id: String,
    pub match_confidence: f64,
    pub applied_at: i64,
}

impl TmUsageRecord {
    pub fn new(version_id: impl Into<String>, tm_id: impl Into<String>, match_confidence: f64) -> Self {
        Self {
            id: new_id(),
            version_id: version_id.into(),
            tm_id: tm_id.into(),
            match_confidence,
            applied_at: now(),
        }
    }
}

/// Group of units sent to a translation provider together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationBatchRecord {
    pub id: String,
    pub project_language_id: String,
    pub provider_id: String,
    pub batch_number: i64,
    pub status: String,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl TranslationBatchRecord {
    pub fn new(
        project_language_id: impl Into<String>,
        provider_id: impl Into<String>,
        batch_number: i64,
    ) -> Self {
        Self {
            id: new_id(),
            project_language_id: project_language_id.into(),
            provider_id: provider_id.into(),
            batch_number,
            status: "pending".to_string(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// Membership of a unit in a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchUnitRecord {
    pub id: String,
    pub batch_id: String,
    pub unit_id: String,
    pub processing_order: i64,
    pub status: String,
}

impl BatchUnitRecord {
    pub fn new(batch_id: impl Into<String>, unit_id: impl Into<String>, processing_order: i64) -> Self {
        Self {
            id: new_id(),
            batch_id: batch_id.into(),
            unit_id: unit_id.into(),
            processing_order,
            status: "pending".to_string(),
        }
    }
}

/// A detected release of the source mod
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModVersionRecord {
    pub id: String,
    pub project_id: String,
    pub version_string: String,
    pub is_current: bool,
    pub detected_at: i64,
}

impl ModVersionRecord {
    pub fn new(project_id: impl Into<String>, version_string: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            project_id: project_id.into(),
            version_string: version_string.into(),
            is_current: true,
            detected_at: now(),
        }
    }
}

/// A source string change between two mod releases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModVersionChangeRecord {
    pub id: String,
    pub version_id: String,
    pub unit_key: String,
    /// "added", "modified" or "deleted"
    pub change_type: String,
    pub old_source_text: Option<String>,
    pub new_source_text: Option<String>,
    pub detected_at: i64,
}

impl ModVersionChangeRecord {
    pub fn new(
        version_id: impl Into<String>,
        unit_key: impl Into<String>,
        change_type: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            version_id: version_id.into(),
            unit_key: unit_key.into(),
            change_type: change_type.into(),
            old_source_text: None,
            new_source_text: None,
            detected_at: now(),
        }
    }
}

/// Row of the denormalized view cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewCacheRecord {
    pub version_id: String,
    pub unit_id: String,
    pub project_id: String,
    pub project_language_id: String,
    pub language_code: String,
    pub unit_key: String,
    pub source_text: String,
    pub translated_text: Option<String>,
    pub status: TranslationStatus,
    pub is_obsolete: bool,
}
