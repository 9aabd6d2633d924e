//! HTTP trigger for sync runs.
//!
//! `GET /sync` and `POST /sync` are aliases (some schedulers can only issue
//! one verb). The optional `?entities=a,b` query restricts the run. Runs in
//! one process never overlap: a trigger that arrives while a run is underway
//! gets `409 Conflict`.
//!
//! ```ignore
//! let state = AppState::new(engine, AuthGate::new(Some(secret)));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! pms_sync::trigger::serve(listener, state, shutdown_signal()).await?;
//! ```

pub mod auth;
mod error;

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::sync::{ProgressCallback, RunRequest, SyncEngine};

pub use auth::{AuthGate, DEFAULT_MANUAL_SENTINEL, DbOperatorDirectory, OperatorDirectory, token_digest};
pub use error::{Result, TriggerError};

/// Shared state for the trigger handlers.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<SyncEngine>,
    gate: Arc<AuthGate>,
    running: Arc<Mutex<()>>,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl AppState {
    pub fn new(engine: SyncEngine, gate: AuthGate) -> Self {
        Self {
            engine: Arc::new(engine),
            gate: Arc::new(gate),
            running: Arc::new(Mutex::new(())),
            on_progress: None,
        }
    }

    /// Forward every run's progress events to `callback`.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }
}

/// Query parameters accepted by `/sync`.
#[derive(Debug, Default, Deserialize)]
pub struct SyncQuery {
    /// Comma-separated entity names.
    pub entities: Option<String>,
}

impl SyncQuery {
    fn entity_names(&self) -> Vec<String> {
        self.entities
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sync", get(trigger_sync).post(trigger_sync))
        .route("/health", get(health))
        .with_state(state)
}

/// Serve the trigger until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if state.gate.is_open() {
        warn!("no trigger secret configured; /sync accepts unauthenticated requests");
    }
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "trigger listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health() -> &'static str {
    "ok"
}

/// Authorize, run, and return the run summary as JSON.
pub async fn trigger_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SyncQuery>,
) -> Response {
    match run_triggered(&state, &headers, &query).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, status = %e.status(), "sync trigger rejected");
            e.into_response()
        }
    }
}

async fn run_triggered(state: &AppState, headers: &HeaderMap, query: &SyncQuery) -> Result<Response> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let trigger = state.gate.authorize(authorization).await?;

    let _guard = state.running.try_lock().map_err(|_| TriggerError::Busy)?;

    info!(trigger = trigger.sync_type(), "sync triggered");
    let request = RunRequest::new(trigger).with_entities(query.entity_names());
    let report = state
        .engine
        .run(request, state.on_progress.as_deref())
        .await?;

    Ok(Json(report).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::{HeaderValue, StatusCode};
    use chrono::{TimeDelta, Utc};
    use sea_orm::DatabaseConnection;
    use serde_json::{Value, json};

    use crate::catalog::Catalog;
    use crate::credential::{CredentialConfig, CredentialManager, CredentialUpdate, store};
    use crate::db::connect_and_migrate;
    use crate::http::{HttpMethod, MockTransport};
    use crate::source::SourceClient;
    use crate::sync::SyncOptions;

    const RESOURCES_URL: &str = "https://pms.test/api/v1/resource?page_size=100";

    async fn state(seed_token: bool, transport: MockTransport) -> (AppState, Arc<DatabaseConnection>) {
        let db = Arc::new(connect_and_migrate("sqlite::memory:").await.unwrap());
        if seed_token {
            let now = Utc::now();
            store::save(
                &db,
                &CredentialUpdate {
                    access_token: "valid",
                    refresh_token: "refresh",
                    expires_at: now + TimeDelta::hours(1),
                    issued_at: now,
                },
            )
            .await
            .unwrap();
        }
        let transport = Arc::new(transport);
        let credentials = CredentialManager::new(
            Arc::clone(&db),
            transport.clone(),
            CredentialConfig::new("https://pms.test/oauth/token", "client"),
        );
        let source = SourceClient::new(transport, "https://pms.test/api/").unwrap();
        let engine = SyncEngine::new(
            Arc::clone(&db),
            credentials,
            source,
            Arc::new(Catalog::standard()),
            SyncOptions::default(),
        );
        let gate = AuthGate::new(Some("s3cret".to_string()));
        (AppState::new(engine, gate), db)
    }

    fn bearer(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {value}")).unwrap(),
        );
        headers
    }

    fn only(entities: &str) -> Query<SyncQuery> {
        Query(SyncQuery {
            entities: Some(entities.to_string()),
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn entity_list_is_trimmed_and_blank_entries_dropped() {
        let query = SyncQuery {
            entities: Some(" resources, ,patients,".to_string()),
        };
        assert_eq!(query.entity_names(), vec!["resources", "patients"]);
        assert!(SyncQuery::default().entity_names().is_empty());
    }

    #[tokio::test]
    async fn authorized_trigger_returns_the_summary() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            RESOURCES_URL,
            200,
            &json!({"results": [{"id": 1, "name": "Room 1"}, {"id": 2, "name": "Room 2"}], "next": null}),
        );
        let (state, _db) = state(true, transport).await;

        let response = trigger_sync(State(state), bearer("s3cret"), only("resources")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["totalRecords"], 2);
        assert_eq!(body["totalUpserted"], 2);
        assert_eq!(body["results"]["resources"]["upserted"], 2);
        assert_eq!(body["results"]["resources"]["status"], "synced");
        assert!(body["totalElapsedMs"].is_u64());
    }

    #[tokio::test]
    async fn bad_bearer_is_401_without_running() {
        let transport = MockTransport::new();
        let (state, _db) = state(true, transport.clone()).await;

        let response = trigger_sync(State(state), bearer("wrong"), only("resources")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["success"], false);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn missing_platform_credential_is_401() {
        let (state, _db) = state(false, MockTransport::new()).await;

        let response = trigger_sync(State(state), bearer("s3cret"), Query(SyncQuery::default())).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("unauthorized"));
    }

    #[tokio::test]
    async fn unknown_entity_is_400() {
        let (state, _db) = state(true, MockTransport::new()).await;

        let response = trigger_sync(State(state), bearer("s3cret"), only("vaccinations")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn overlapping_trigger_is_409() {
        let (state, _db) = state(true, MockTransport::new()).await;
        let _held = state.running.clone().try_lock_owned().unwrap();

        let response = trigger_sync(State(state), bearer("s3cret"), only("resources")).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn health_is_ok() {
        assert_eq!(health().await, "ok");
    }
}
