//! SyncRunLog entity - one append-only row per sync invocation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::run_status::{RunMode, RunStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_run_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Who started the run: `scheduled`, `manual`, `operator`, `open` or `cli`.
    pub sync_type: String,

    pub mode: RunMode,

    pub status: RunStatus,

    /// Sum of upserted rows across entities.
    pub records_synced: i64,

    /// Sum of errored rows across entities; crash sentinels count as zero.
    pub records_errored: i64,

    /// Per-entity results, total elapsed time and trigger details.
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,

    pub started_at: DateTimeWithTimeZone,

    pub finished_at: DateTimeWithTimeZone,

    pub duration_ms: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Time since this run finished.
    pub fn age(&self, now: chrono::DateTime<chrono::Utc>) -> chrono::Duration {
        now.signed_duration_since(self.finished_at)
    }
}
