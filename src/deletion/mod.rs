/*!
 * Bulk cascading deletion of projects and project languages.
 *
 * This module provides:
 * - The trigger registry used to suspend and restore derived-table maintenance
 * - A batched purger for very large child tables
 * - Explicit cascade plans, one per deletion root
 * - The orchestrator tying them together with guaranteed cleanup
 */

pub mod diagnostics;
pub mod orchestrator;
pub mod plan;
pub mod pragmas;
pub mod purger;
pub mod triggers;

// Re-export main types
pub use diagnostics::{MetricsSnapshot, ScopeCounts};
pub use orchestrator::{DeletionOptions, DeletionService};
pub use plan::{CascadePlan, CascadeStep, DeleteMode, DeletionRoot, Phase, Table};
pub use purger::{purge_in_batches, PurgeOutcome, DEFAULT_BATCH_SIZE};
pub use triggers::{TriggerDef, TriggerRegistry, TRIGGERS};
