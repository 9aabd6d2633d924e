//! The sync run: window selection, the time budget and the orchestrator.
//!
//! # Module Structure
//!
//! - [`types`] - Options, per-entity results and the run report
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`window`] - Full vs incremental fetch selection
//! - [`deadline`] - The run's wall-clock budget
//! - [`engine`] - The orchestrator: `SyncEngine::run()`
//!
//! # Example
//!
//! ```ignore
//! use pms_sync::sync::{RunRequest, SyncEngine, TriggerSource};
//!
//! async fn nightly(engine: &SyncEngine) -> Result<(), pms_sync::sync::SyncError> {
//!     let report = engine.run(RunRequest::new(TriggerSource::Scheduler), None).await?;
//!     println!("{} upserted, status {}", report.total_upserted, report.status);
//!     Ok(())
//! }
//! ```

pub mod deadline;
pub mod engine;
mod error;
mod progress;
mod types;
pub mod window;

// Re-export types
pub use types::{
    EntityStatus, EntitySyncResult, FetchMode, RunPhase, SyncOptions, SyncReport, TriggerSource,
};

// Re-export constants
pub use types::{CRASHED, DEFAULT_TIME_BUDGET_SECS};
pub use window::{DEFAULT_INCREMENTAL_THRESHOLD, DEFAULT_LOOKBACK_HOURS, WindowPolicy};

// Re-export progress types
pub use progress::{ProgressCallback, SyncProgress, emit};

pub use deadline::Deadline;
pub use engine::{RunRequest, SyncEngine};
pub use error::{EntityError, SyncError};
