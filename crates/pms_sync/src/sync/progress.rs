//! Progress events emitted while a sync run is underway.
//!
//! The library never renders anything itself; the CLI turns these events into
//! a spinner or log lines.

use super::types::{EntitySyncResult, FetchMode, RunPhase};

/// Progress events emitted during a sync run.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// The run moved to a new phase.
    Phase(RunPhase),

    /// Starting work on an entity.
    EntityStarted {
        entity: String,
        mode: FetchMode,
        /// Position in priority order (1-indexed).
        position: usize,
        /// Number of entities in the run.
        total: usize,
    },

    /// Fetched one page of an entity.
    FetchedPage {
        entity: String,
        /// Page number (1-indexed).
        page: u32,
        /// Records on this page.
        count: usize,
        /// Running total for this entity.
        total_so_far: usize,
    },

    /// The page walk stopped on an error; what was fetched is still persisted.
    FetchStopped {
        entity: String,
        page: u32,
        reason: String,
    },

    /// Writing one batch.
    PersistingBatch {
        entity: String,
        batch: usize,
        size: usize,
    },

    /// A batch failed after any retries.
    BatchFailed {
        entity: String,
        batch: usize,
        size: usize,
        error: String,
    },

    /// Finished an entity.
    EntityCompleted { result: EntitySyncResult },

    /// Skipped an entity because the time budget was spent.
    EntitySkipped { entity: String, elapsed_ms: u64 },

    /// An entity's pipeline failed.
    EntityCrashed { entity: String, error: String },

    /// The whole run finished.
    RunCompleted {
        total_upserted: i64,
        total_errored: i64,
        elapsed_ms: u64,
    },
}

/// Callback for progress updates during a sync run.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
