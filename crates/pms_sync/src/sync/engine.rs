//! The sync orchestrator.
//!
//! One run authenticates once, then walks the catalog in priority order. For
//! each entity it picks the fetch window, walks the pages, maps the records and
//! upserts them in batches. The time budget is checked only before an entity
//! starts; an entity in flight always finishes. A failure inside one entity is
//! recorded in its result and never stops the run.
//!
//! ```ignore
//! let engine = SyncEngine::new(db, credentials, source, Arc::new(Catalog::standard()), SyncOptions::default());
//! let report = engine.run(RunRequest::new(TriggerSource::Cli), None).await?;
//! println!("{} records upserted", report.total_upserted);
//! ```

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use sea_orm::DatabaseConnection;
use tracing::{error, info, warn};

use crate::audit;
use crate::catalog::{Catalog, EntityDefinition, LocalRecord, RawRecord};
use crate::credential::{AccessToken, CredentialManager};
use crate::source::{SourceClient, fetch_all_pages};
use crate::store;

use super::deadline::Deadline;
use super::error::{EntityError, Result, SyncError};
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{
    EntityStatus, EntitySyncResult, RunPhase, SyncOptions, SyncReport, TriggerSource,
};
use super::window;

/// Parameters of a single invocation.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub trigger: TriggerSource,
    /// Restrict the run to these entities; `None` runs the whole catalog.
    pub entities: Option<Vec<String>>,
}

impl RunRequest {
    pub fn new(trigger: TriggerSource) -> Self {
        Self {
            trigger,
            entities: None,
        }
    }

    pub fn with_entities(mut self, entities: Vec<String>) -> Self {
        self.entities = if entities.is_empty() {
            None
        } else {
            Some(entities)
        };
        self
    }
}

/// Runs sync invocations against one mirror database.
#[derive(Clone)]
pub struct SyncEngine {
    db: Arc<DatabaseConnection>,
    credentials: CredentialManager,
    source: SourceClient,
    catalog: Arc<Catalog>,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(
        db: Arc<DatabaseConnection>,
        credentials: CredentialManager,
        source: SourceClient,
        catalog: Arc<Catalog>,
        options: SyncOptions,
    ) -> Self {
        Self {
            db,
            credentials,
            source,
            catalog,
            options,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run one sync invocation.
    ///
    /// # Errors
    /// - [`SyncError::UnknownEntity`] if the request names an entity not in the
    ///   catalog; nothing runs and nothing is recorded.
    /// - [`SyncError::Unauthorized`] if no valid token can be obtained; a
    ///   `failed` run is still recorded.
    ///
    /// Every other failure is reported inside the returned [`SyncReport`].
    pub async fn run(
        &self,
        request: RunRequest,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<SyncReport> {
        let deadline = Deadline::start(self.options.time_budget);
        let started_at = Utc::now();
        let entities = self.select_entities(&request)?;
        emit(on_progress, SyncProgress::Phase(RunPhase::Idle));

        info!(
            trigger = request.trigger.sync_type(),
            entities = entities.len(),
            budget_secs = self.options.time_budget.as_secs(),
            "sync run starting"
        );

        emit(on_progress, SyncProgress::Phase(RunPhase::Authenticating));
        let Some(token) = self.credentials.get_valid_token().await else {
            emit(on_progress, SyncProgress::Phase(RunPhase::AuthFailed));
            error!("sync run aborted: no valid access token");
            let report = SyncReport::auth_failed(
                request.trigger,
                started_at,
                Utc::now(),
                deadline.elapsed_ms(),
            );
            audit::record_run_logged(&self.db, &report).await;
            return Err(SyncError::Unauthorized);
        };
        emit(on_progress, SyncProgress::Phase(RunPhase::Authenticated));

        emit(on_progress, SyncProgress::Phase(RunPhase::IteratingEntities));
        let total = entities.len();
        let mut results = Vec::with_capacity(total);

        for (index, entity) in entities.into_iter().enumerate() {
            if deadline.is_exceeded() {
                warn!(
                    entity = %entity.name,
                    elapsed_ms = deadline.elapsed_ms(),
                    budget_ms = deadline.budget().as_millis() as u64,
                    "time budget spent, skipping entity"
                );
                emit(
                    on_progress,
                    SyncProgress::EntitySkipped {
                        entity: entity.name.to_string(),
                        elapsed_ms: deadline.elapsed_ms(),
                    },
                );
                results.push(EntitySyncResult::skipped(entity.name));
                continue;
            }

            let entity_started = Instant::now();
            let result = match self
                .sync_entity(entity, &token, index + 1, total, on_progress)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    error!(entity = %entity.name, error = %e, "entity sync crashed");
                    emit(
                        on_progress,
                        SyncProgress::EntityCrashed {
                            entity: entity.name.to_string(),
                            error: e.to_string(),
                        },
                    );
                    EntitySyncResult::crashed(
                        entity.name,
                        e.to_string(),
                        entity_started.elapsed().as_millis() as u64,
                    )
                }
            };

            emit(
                on_progress,
                SyncProgress::EntityCompleted {
                    result: result.clone(),
                },
            );
            results.push(result);
        }

        let report = SyncReport::completed(
            results,
            request.trigger,
            started_at,
            Utc::now(),
            deadline.elapsed_ms(),
        );

        emit(on_progress, SyncProgress::Phase(RunPhase::Completed));
        emit(
            on_progress,
            SyncProgress::RunCompleted {
                total_upserted: report.total_upserted,
                total_errored: report.total_errored(),
                elapsed_ms: report.total_elapsed_ms,
            },
        );
        info!(
            status = %report.status,
            fetched = report.total_records,
            upserted = report.total_upserted,
            errored = report.total_errored(),
            elapsed_ms = report.total_elapsed_ms,
            "sync run finished"
        );

        audit::record_run_logged(&self.db, &report).await;
        Ok(report)
    }

    fn select_entities(&self, request: &RunRequest) -> Result<Vec<&EntityDefinition>> {
        match &request.entities {
            None => Ok(self.catalog.in_priority_order().collect()),
            Some(names) => self.catalog.select(names).map_err(SyncError::UnknownEntity),
        }
    }

    async fn sync_entity(
        &self,
        entity: &EntityDefinition,
        token: &AccessToken,
        position: usize,
        total: usize,
        on_progress: Option<&ProgressCallback>,
    ) -> std::result::Result<EntitySyncResult, EntityError> {
        let started = Instant::now();

        let base = self.source.entity_url(entity)?;
        let window =
            window::build_source_url(&self.db, entity, base, &self.options.window, Utc::now())
                .await?;

        info!(
            entity = %entity.name,
            mode = %window.mode,
            url = %window.url,
            "syncing entity"
        );
        emit(
            on_progress,
            SyncProgress::EntityStarted {
                entity: entity.name.to_string(),
                mode: window.mode,
                position,
                total,
            },
        );

        let fetched = fetch_all_pages(
            &self.source,
            token,
            entity.name,
            window.url.as_str(),
            self.options.max_pages,
            on_progress,
        )
        .await;

        let synced_at = Utc::now();
        let (keyed, unkeyed): (Vec<LocalRecord>, Vec<LocalRecord>) = fetched
            .records
            .iter()
            .map(|value| (entity.map)(&RawRecord::from_value(value), synced_at))
            .partition(|record| record.has_value(entity.conflict_key));

        if !unkeyed.is_empty() {
            warn!(
                entity = %entity.name,
                count = unkeyed.len(),
                "records without a remote id were not persisted"
            );
        }

        let persisted =
            store::persist(&self.db, entity, &keyed, &self.options.persist, on_progress).await;

        let errored = persisted.errored + unkeyed.len();
        let status = if fetched.failure().is_some() || errored > 0 {
            EntityStatus::Partial
        } else {
            EntityStatus::Synced
        };
        let error = fetched.failure().map(ToString::to_string).or_else(|| {
            persisted
                .failures
                .first()
                .map(|f| format!("batch {}: {}", f.batch, f.error))
        });

        let result = EntitySyncResult {
            entity: entity.name.to_string(),
            fetched: fetched.records.len() as i64,
            upserted: persisted.upserted as i64,
            errored: errored as i64,
            elapsed_ms: started.elapsed().as_millis() as u64,
            status,
            mode: Some(window.mode),
            pages: fetched.pages_fetched,
            error,
        };

        info!(
            entity = %entity.name,
            fetched = result.fetched,
            upserted = result.upserted,
            errored = result.errored,
            duplicates = persisted.duplicates,
            pages = result.pages,
            elapsed_ms = result.elapsed_ms,
            "entity synced"
        );
        Ok(result)
    }
}
