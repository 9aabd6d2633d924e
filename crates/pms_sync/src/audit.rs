//! Append-only run history.
//!
//! Every run that gets past entity selection writes exactly one row to
//! `sync_run_logs`, including runs that failed at authentication. A failed
//! write is logged and swallowed so it never changes the run's outcome.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde_json::json;
use tracing::{debug, error};
use uuid::Uuid;

use crate::entity::run_status::RunStatus;
use crate::entity::sync_run_log::{ActiveModel, Column, Entity as SyncRunLog, Model};
use crate::sync::SyncReport;

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Build the row recorded for a run.
pub fn run_log_row(report: &SyncReport) -> ActiveModel {
    ActiveModel {
        id: Set(Uuid::new_v4()),
        sync_type: Set(report.trigger.sync_type().to_string()),
        mode: Set(report.mode()),
        status: Set(report.status),
        records_synced: Set(report.total_upserted),
        records_errored: Set(report.total_errored()),
        metadata: Set(json!({
            "results": results_by_entity(report),
            "totalElapsedMs": report.total_elapsed_ms,
            "trigger": report.trigger,
        })),
        started_at: Set(report.started_at.fixed_offset()),
        finished_at: Set(report.finished_at.fixed_offset()),
        duration_ms: Set(i64::try_from(report.total_elapsed_ms).unwrap_or(i64::MAX)),
    }
}

fn results_by_entity(report: &SyncReport) -> serde_json::Map<String, serde_json::Value> {
    report
        .results
        .iter()
        .map(|r| (r.entity.clone(), json!(r)))
        .collect()
}

/// Insert the run's row.
///
/// # Errors
/// Returns `DbErr` if the insert fails.
pub async fn record_run(db: &DatabaseConnection, report: &SyncReport) -> Result<Model, DbErr> {
    run_log_row(report).insert(db).await
}

/// Insert the run's row, logging instead of failing.
pub async fn record_run_logged(db: &DatabaseConnection, report: &SyncReport) {
    match record_run(db, report).await {
        Ok(row) => debug!(id = %row.id, status = %row.status, "recorded sync run"),
        Err(e) => error!(
            error = %e,
            status = %report.status,
            "failed to record sync run; continuing"
        ),
    }
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// Most recent runs, newest first.
pub async fn recent_runs(db: &DatabaseConnection, limit: u64) -> Result<Vec<Model>, DbErr> {
    SyncRunLog::find()
        .order_by_desc(Column::FinishedAt)
        .limit(limit)
        .all(db)
        .await
}

/// Latest run that was not a failure.
pub async fn last_successful_run(db: &DatabaseConnection) -> Result<Option<Model>, DbErr> {
    SyncRunLog::find()
        .filter(Column::Status.ne(RunStatus::Failed))
        .order_by_desc(Column::FinishedAt)
        .one(db)
        .await
}
