//! Result and option types shared by the sync engine, the auditor and the
//! trigger endpoint.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::entity::run_status::{RunMode, RunStatus};
use crate::store::PersistOptions;
use crate::sync::window::WindowPolicy;

/// Wall-clock budget for one run, below the host platform's hard limit.
pub const DEFAULT_TIME_BUDGET_SECS: u64 = 270;

/// Sentinel `errored` value for an entity whose pipeline failed outright.
pub const CRASHED: i64 = -1;

/// Tunables for one sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Checked before each entity; an entity already started always finishes.
    pub time_budget: Duration,
    /// Maximum pages fetched per entity.
    pub max_pages: u32,
    pub window: WindowPolicy,
    pub persist: PersistOptions,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            time_budget: Duration::from_secs(DEFAULT_TIME_BUDGET_SECS),
            max_pages: crate::source::DEFAULT_MAX_PAGES,
            window: WindowPolicy::default(),
            persist: PersistOptions::default(),
        }
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// The request was accepted; nothing has been contacted yet.
    Idle,
    Authenticating,
    Authenticated,
    /// Terminal: no token, no entity processed.
    AuthFailed,
    IteratingEntities,
    Completed,
}

/// How an entity's records were requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Every record, no `since` filter.
    Full,
    /// Only records modified inside the lookback window.
    Incremental,
}

impl std::fmt::Display for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchMode::Full => write!(f, "full"),
            FetchMode::Incremental => write!(f, "incremental"),
        }
    }
}

/// Outcome class of one entity within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    /// Fetched to the end (or the page cap) and persisted without errors.
    Synced,
    /// Some records were not persisted, or the fetch stopped on an error.
    Partial,
    /// Not attempted because the time budget was already spent.
    Skipped,
    /// The entity pipeline failed before producing counts.
    Crashed,
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityStatus::Synced => write!(f, "synced"),
            EntityStatus::Partial => write!(f, "partial"),
            EntityStatus::Skipped => write!(f, "skipped"),
            EntityStatus::Crashed => write!(f, "crashed"),
        }
    }
}

/// Per-entity counts for one run.
///
/// `errored` is [`CRASHED`] (`-1`) when the entity failed outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySyncResult {
    #[serde(skip)]
    pub entity: String,
    pub fetched: i64,
    pub upserted: i64,
    pub errored: i64,
    pub elapsed_ms: u64,
    pub status: EntityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<FetchMode>,
    #[serde(default)]
    pub pages: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EntitySyncResult {
    pub fn skipped(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            fetched: 0,
            upserted: 0,
            errored: 0,
            elapsed_ms: 0,
            status: EntityStatus::Skipped,
            mode: None,
            pages: 0,
            error: None,
        }
    }

    pub fn crashed(entity: impl Into<String>, error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            entity: entity.into(),
            fetched: 0,
            upserted: 0,
            errored: CRASHED,
            elapsed_ms,
            status: EntityStatus::Crashed,
            mode: None,
            pages: 0,
            error: Some(error.into()),
        }
    }

    /// `errored` with the crash sentinel counted as zero.
    pub fn errored_rows(&self) -> i64 {
        self.errored.max(0)
    }
}

/// Who asked for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerSource {
    /// The scheduler, authenticated by the shared secret.
    Scheduler,
    /// The manual console sentinel.
    ManualConsole,
    /// A signed-in operator.
    Operator { email: String },
    /// No shared secret configured; the gate is open.
    Open,
    /// The command line, in-process.
    Cli,
}

impl TriggerSource {
    /// Label stored as the run log's `sync_type`.
    pub fn sync_type(&self) -> &'static str {
        match self {
            TriggerSource::Scheduler => "scheduled",
            TriggerSource::ManualConsole => "manual",
            TriggerSource::Operator { .. } => "operator",
            TriggerSource::Open => "open",
            TriggerSource::Cli => "cli",
        }
    }
}

/// Outcome of one run, as returned to the trigger caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub success: bool,
    /// Per-entity results in priority order, serialized as an object keyed by entity.
    #[serde(serialize_with = "serialize_results")]
    pub results: Vec<EntitySyncResult>,
    pub total_elapsed_ms: u64,
    /// Records fetched across all entities.
    pub total_records: i64,
    pub total_upserted: i64,
    #[serde(skip)]
    pub status: RunStatus,
    #[serde(skip)]
    pub trigger: TriggerSource,
    #[serde(skip)]
    pub started_at: DateTime<Utc>,
    #[serde(skip)]
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    /// A run that processed its entities (successfully or not).
    pub fn completed(
        results: Vec<EntitySyncResult>,
        trigger: TriggerSource,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        total_elapsed_ms: u64,
    ) -> Self {
        let clean = results
            .iter()
            .all(|r| r.status == EntityStatus::Synced && r.errored == 0);
        Self {
            success: true,
            total_records: results.iter().map(|r| r.fetched).sum(),
            total_upserted: results.iter().map(|r| r.upserted).sum(),
            results,
            total_elapsed_ms,
            status: if clean {
                RunStatus::Completed
            } else {
                RunStatus::Partial
            },
            trigger,
            started_at,
            finished_at,
        }
    }

    /// A run that stopped at authentication.
    pub fn auth_failed(
        trigger: TriggerSource,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        total_elapsed_ms: u64,
    ) -> Self {
        Self {
            success: false,
            results: Vec::new(),
            total_elapsed_ms,
            total_records: 0,
            total_upserted: 0,
            status: RunStatus::Failed,
            trigger,
            started_at,
            finished_at,
        }
    }

    /// Errored rows across entities; crash sentinels count as zero.
    pub fn total_errored(&self) -> i64 {
        self.results.iter().map(EntitySyncResult::errored_rows).sum()
    }

    /// Fetch modes used across the entities that reached the fetch step.
    pub fn mode(&self) -> RunMode {
        let mut modes = self.results.iter().filter_map(|r| r.mode);
        let Some(first) = modes.next() else {
            return RunMode::None;
        };
        if modes.any(|m| m != first) {
            return RunMode::Mixed;
        }
        match first {
            FetchMode::Full => RunMode::Full,
            FetchMode::Incremental => RunMode::Incremental,
        }
    }

    pub fn result(&self, entity: &str) -> Option<&EntitySyncResult> {
        self.results.iter().find(|r| r.entity == entity)
    }
}

fn serialize_results<S: Serializer>(
    results: &[EntitySyncResult],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(results.iter().map(|r| (r.entity.as_str(), r)))
}
