//! Batched, idempotent upserts into mirrored target tables.

use std::collections::HashMap;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use sea_orm::sea_query::{Alias, InsertStatement, OnConflict, Query, SimpleExpr};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};

use crate::catalog::{EntityDefinition, LocalRecord};
use crate::sync::{ProgressCallback, SyncProgress, emit};

use super::errors::{Result, StoreError};

/// Records per `INSERT ... ON CONFLICT` statement.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Retries for a batch that failed on a transient connection error.
pub const DEFAULT_PERSIST_RETRIES: usize = 3;

/// Initial backoff delay for batch retries.
pub const DEFAULT_PERSIST_BACKOFF_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct PersistOptions {
    pub batch_size: usize,
    /// Retry attempts for transient errors (0 = no retries).
    pub max_retries: usize,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_PERSIST_RETRIES,
            min_backoff: Duration::from_millis(DEFAULT_PERSIST_BACKOFF_MS),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl PersistOptions {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_backoff)
            .with_max_delay(self.max_backoff)
            .with_max_times(self.max_retries)
    }
}

/// A batch that could not be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// 1-indexed batch number.
    pub batch: usize,
    pub size: usize,
    pub error: String,
}

/// Counts from one [`persist`] call.
///
/// `upserted + errored + duplicates` equals the input length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    pub upserted: usize,
    pub errored: usize,
    /// Earlier records dropped because a later one shared their conflict key.
    pub duplicates: usize,
    pub batches: usize,
    pub failures: Vec<BatchFailure>,
}

/// Write `records` into the entity's target table in fixed-size batches.
///
/// A failed batch is counted into `errored` and the remaining batches still run.
/// Rows are keyed by the entity's conflict key, so re-running with the same
/// records overwrites rather than duplicates. Within one call the last record
/// for a key wins; a statement must not touch the same row twice.
pub async fn persist(
    db: &DatabaseConnection,
    entity: &EntityDefinition,
    records: &[LocalRecord],
    options: &PersistOptions,
    on_progress: Option<&ProgressCallback>,
) -> PersistOutcome {
    let input_len = records.len();
    let records = last_per_key(entity, records);
    let mut outcome = PersistOutcome {
        duplicates: input_len - records.len(),
        ..PersistOutcome::default()
    };
    if outcome.duplicates > 0 {
        tracing::debug!(
            entity = %entity.name,
            duplicates = outcome.duplicates,
            "collapsed records sharing a conflict key"
        );
    }

    for (index, chunk) in records.chunks(options.batch_size.max(1)).enumerate() {
        let batch = index + 1;
        outcome.batches += 1;

        emit(
            on_progress,
            SyncProgress::PersistingBatch {
                entity: entity.name.to_string(),
                batch,
                size: chunk.len(),
            },
        );

        match upsert_batch_with_retry(db, entity, chunk, options).await {
            Ok(()) => outcome.upserted += chunk.len(),
            Err(e) => {
                tracing::warn!(
                    entity = %entity.name,
                    batch,
                    size = chunk.len(),
                    error = %e,
                    "batch upsert failed"
                );
                emit(
                    on_progress,
                    SyncProgress::BatchFailed {
                        entity: entity.name.to_string(),
                        batch,
                        size: chunk.len(),
                        error: e.to_string(),
                    },
                );
                outcome.errored += chunk.len();
                outcome.failures.push(BatchFailure {
                    batch,
                    size: chunk.len(),
                    error: e.to_string(),
                });
            }
        }
    }

    outcome
}

/// Keep only the last record for each conflict key, in input order.
///
/// Records without the key are kept as they are.
fn last_per_key(entity: &EntityDefinition, records: &[LocalRecord]) -> Vec<LocalRecord> {
    let mut last: HashMap<String, usize> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        if let Some(key) = record.get(entity.conflict_key) {
            last.insert(format!("{key:?}"), index);
        }
    }

    records
        .iter()
        .enumerate()
        .filter(|(index, record)| {
            record
                .get(entity.conflict_key)
                .is_none_or(|key| last.get(&format!("{key:?}")) == Some(index))
        })
        .map(|(_, record)| record.clone())
        .collect()
}

/// Upsert one batch, retrying transient connection errors with backoff.
pub async fn upsert_batch_with_retry(
    db: &DatabaseConnection,
    entity: &EntityDefinition,
    records: &[LocalRecord],
    options: &PersistOptions,
) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }

    let statement = db.get_database_backend().build(&build_upsert(entity, records)?);

    (|| async { db.execute(statement.clone()).await })
        .retry(options.backoff())
        .when(is_retryable_db_error)
        .notify(|e: &DbErr, delay: Duration| {
            tracing::warn!(
                entity = %entity.name,
                backoff_ms = delay.as_millis() as u64,
                error = %e,
                "transient database error, retrying batch"
            );
        })
        .await?;

    Ok(())
}

/// Build a single `INSERT ... ON CONFLICT (<key>) DO UPDATE SET <others> = excluded.<others>`.
///
/// Every record must carry the same columns in the same order.
pub fn build_upsert(entity: &EntityDefinition, records: &[LocalRecord]) -> Result<InsertStatement> {
    let first = records.first().ok_or(StoreError::EmptyBatch)?;
    let columns = first.column_names();
    if !columns.contains(&entity.conflict_key) {
        return Err(StoreError::MissingConflictKey {
            table: entity.target_table,
            column: entity.conflict_key,
        });
    }

    let mut insert = Query::insert();
    insert
        .into_table(Alias::new(entity.target_table))
        .columns(columns.iter().map(|c| Alias::new(*c)));

    for (index, record) in records.iter().enumerate() {
        let found = record.column_names();
        if found != columns {
            return Err(StoreError::ColumnMismatch {
                index,
                expected: columns,
                found,
            });
        }
        insert
            .values(record.values().cloned().map(SimpleExpr::from))
            .map_err(|e| StoreError::Statement(e.to_string()))?;
    }

    let updates: Vec<Alias> = columns
        .iter()
        .filter(|c| **c != entity.conflict_key)
        .map(|c| Alias::new(*c))
        .collect();

    let mut on_conflict = OnConflict::column(Alias::new(entity.conflict_key));
    if updates.is_empty() {
        on_conflict.do_nothing();
    } else {
        on_conflict.update_columns(updates);
    }
    insert.on_conflict(on_conflict);

    Ok(insert)
}

/// Whether a database error is worth retrying (locks, dropped connections).
pub(crate) fn is_retryable_db_error(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(_) | DbErr::Query(_) => {
            let err_str = err.to_string().to_lowercase();
            // SQLite: database is locked / busy
            // PostgreSQL: connection reset, too many connections
            err_str.contains("locked")
                || err_str.contains("busy")
                || err_str.contains("timeout")
                || err_str.contains("connection reset")
                || err_str.contains("temporarily unavailable")
        }
        _ => false,
    }
}
