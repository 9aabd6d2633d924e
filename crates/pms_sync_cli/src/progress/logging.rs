use pms_sync::sync::{RunPhase, SyncProgress};

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::Phase(RunPhase::AuthFailed) => {
                tracing::error!("Authentication failed; no entities synced");
            }

            SyncProgress::Phase(phase) => {
                tracing::debug!(phase = ?phase, "Run phase");
            }

            SyncProgress::EntityStarted {
                entity,
                mode,
                position,
                total,
            } => {
                tracing::info!(entity = %entity, mode = %mode, position, total, "Syncing entity");
            }

            SyncProgress::FetchedPage {
                entity,
                page,
                count,
                total_so_far,
            } => {
                tracing::debug!(entity = %entity, page, count, total_so_far, "Fetched page");
            }

            SyncProgress::FetchStopped {
                entity,
                page,
                reason,
            } => {
                tracing::warn!(entity = %entity, page, reason = %reason, "Fetch stopped early");
            }

            SyncProgress::PersistingBatch {
                entity,
                batch,
                size,
            } => {
                tracing::debug!(entity = %entity, batch, size, "Persisting batch");
            }

            SyncProgress::BatchFailed {
                entity,
                batch,
                size,
                error,
            } => {
                tracing::error!(entity = %entity, batch, size, error = %error, "Batch failed");
            }

            SyncProgress::EntityCompleted { result } => {
                tracing::info!(
                    entity = %result.entity,
                    status = %result.status,
                    fetched = result.fetched,
                    upserted = result.upserted,
                    errored = result.errored,
                    elapsed_ms = result.elapsed_ms,
                    "Entity done"
                );
            }

            SyncProgress::EntitySkipped { entity, elapsed_ms } => {
                tracing::warn!(entity = %entity, elapsed_ms, "Skipped: time budget spent");
            }

            SyncProgress::EntityCrashed { entity, error } => {
                tracing::error!(entity = %entity, error = %error, "Entity crashed");
            }

            SyncProgress::RunCompleted {
                total_upserted,
                total_errored,
                elapsed_ms,
            } => {
                tracing::info!(total_upserted, total_errored, elapsed_ms, "Sync complete");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
