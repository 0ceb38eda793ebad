/*!
 * Error types for the modlingo library.
 *
 * The store layer works with `anyhow` and context strings; the deletion
 * engine converts those into the typed errors below at its boundary,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors surfaced by the deletion engine
#[derive(Error, Debug)]
pub enum StorageError {
    /// The root row was not there when the final delete ran
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity ("project", "project language")
        entity: &'static str,
        /// Id that was requested
        id: String,
    },

    /// A statement of the cascade failed
    #[error("storage operation '{operation}' failed: {source:#}")]
    StoreFailure {
        /// Step or phase that failed
        operation: String,
        /// Underlying cause with its context chain
        #[source]
        source: anyhow::Error,
    },

    /// Triggers could not be recreated; the schema is missing maintenance triggers
    #[error("failed to restore triggers: {source:#}")]
    RestorationFailure {
        /// Failure that happened before the restore, if any
        prior: Option<Box<StorageError>>,
        /// Why the restore failed
        #[source]
        source: anyhow::Error,
    },
}

impl StorageError {
    /// Wrap a store error raised by `operation`
    pub fn store(operation: impl Into<String>, source: anyhow::Error) -> Self {
        Self::StoreFailure {
            operation: operation.into(),
            source,
        }
    }

    /// Whether the error leaves the database without its maintenance triggers
    pub fn is_restoration_failure(&self) -> bool {
        matches!(self, Self::RestorationFailure { .. })
    }

    /// Whether the requested row did not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result alias for deletion operations
pub type StorageResult<T> = Result<T, StorageError>;
