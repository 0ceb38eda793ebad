/*!
 * # modlingo - bulk deletion engine for a game-mod localization store
 *
 * Removes a project, or a single project language, together with every
 * dependent row from a SQLite store that carries a denormalized view cache,
 * full-text search indexes and maintenance triggers.
 *
 * ## Features
 *
 * - Ordered cascade plans (children before parents) for both deletion roots
 * - Trigger suspension and byte-identical restoration from one registry
 * - Batched purging of the largest tables to keep transactions short
 * - Search index rebuild and pragma restoration on every exit path
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `database`: Schema, connection handling and a thin repository
 * - `deletion`: The deletion engine:
 *   - `deletion::triggers`: Trigger registry
 *   - `deletion::purger`: Batched row purger
 *   - `deletion::plan`: Cascade plans
 *   - `deletion::orchestrator`: Deletion service
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod database;
pub mod deletion;
pub mod errors;

// Re-export main types for easier usage
pub use app_config::Config;
pub use database::{DatabaseConnection, Repository};
pub use deletion::{DeletionOptions, DeletionService};
pub use errors::{StorageError, StorageResult};
