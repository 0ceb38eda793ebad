/*!
 * Database module for the localization store.
 *
 * This module provides SQLite-based persistence for:
 * - Projects, languages, translation units and versions
 * - Translation batches and mod release tracking
 * - The view cache and full-text search indexes derived from them
 */

pub mod schema;
pub mod connection;
pub mod repository;
pub mod models;

// Re-export main types
pub use connection::{DatabaseConnection, DatabaseStats};
pub use repository::Repository;
