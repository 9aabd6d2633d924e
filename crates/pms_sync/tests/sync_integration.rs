//! End-to-end runs against an in-memory SQLite mirror and a scripted platform.
//!
//! Key scenarios tested:
//! - A full catalog run is idempotent: the second run leaves identical row counts
//! - Upserts overwrite changed fields in place
//! - Cursor pagination across several pages lands every record
//! - A page repeating an id lands one row carrying the last copy
//! - An expired token is refreshed once and the new pair is stored
//! - Every run leaves exactly one audit row

#![cfg(all(feature = "sqlite", feature = "migrate"))]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use pms_sync::catalog::Catalog;
use pms_sync::credential::{CredentialConfig, CredentialManager, CredentialUpdate, store};
use pms_sync::http::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use pms_sync::source::SourceClient;
use pms_sync::store::count_rows;
use pms_sync::sync::{EntityStatus, RunRequest, SyncEngine, SyncOptions, TriggerSource};
use pms_sync::{RunStatus, SyncRunLog, audit, connect_and_migrate};
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, Statement};
use serde_json::{Value, json};
use url::Url;

/// Any single run should finish well within this in tests.
const RUN_TIMEOUT: Duration = Duration::from_secs(10);

const API_BASE: &str = "https://pms.test/api/";
const TOKEN_URL: &str = "https://pms.test/oauth/token";

/// A scripted remote platform: pages keyed by path and `page` number, plus a
/// token endpoint that counts refreshes.
#[derive(Default)]
struct FakePlatform {
    pages: Mutex<HashMap<(String, u32), Value>>,
    refreshes: AtomicUsize,
    page_requests: AtomicUsize,
}

impl FakePlatform {
    fn set_page(&self, path: &str, page: u32, body: Value) {
        self.pages
            .lock()
            .unwrap()
            .insert((path.to_string(), page), body);
    }

    /// A single final page of `count` records.
    fn set_records(&self, path: &str, count: u32, label: &str) {
        let results: Vec<Value> = (1..=count)
            .map(|i| json!({"id": i, "name": format!("{label} {i}"), "code": format!("C{i}")}))
            .collect();
        self.set_page(path, 1, json!({"results": results, "next": null}));
    }
}

#[async_trait]
impl HttpTransport for FakePlatform {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = Url::parse(&request.url).map_err(|e| HttpError::Transport(e.to_string()))?;

        if request.method == HttpMethod::Post && url.as_str() == TOKEN_URL {
            let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            return Ok(json_response(
                200,
                &json!({
                    "access_token": format!("fresh-{n}"),
                    "refresh_token": format!("rotated-{n}"),
                    "expires_in": 3600,
                }),
            ));
        }

        self.page_requests.fetch_add(1, Ordering::SeqCst);
        let page = url
            .query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(1);
        let body = self
            .pages
            .lock()
            .unwrap()
            .get(&(url.path().to_string(), page))
            .cloned();

        Ok(match body {
            Some(body) => json_response(200, &body),
            None => json_response(200, &json!({"results": [], "next": null})),
        })
    }
}

fn json_response(status: u16, body: &Value) -> HttpResponse {
    HttpResponse {
        status,
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        body: body.to_string().into_bytes(),
    }
}

async fn setup(expires_in: TimeDelta) -> Arc<DatabaseConnection> {
    let db = connect_and_migrate("sqlite::memory:")
        .await
        .expect("Failed to create test database");
    let now = Utc::now();
    store::save(
        &db,
        &CredentialUpdate {
            access_token: "seeded",
            refresh_token: "seeded-refresh",
            expires_at: now + expires_in,
            issued_at: now,
        },
    )
    .await
    .expect("Failed to seed credential");
    Arc::new(db)
}

fn engine(db: &Arc<DatabaseConnection>, platform: Arc<FakePlatform>) -> SyncEngine {
    let credentials = CredentialManager::new(
        Arc::clone(db),
        platform.clone(),
        CredentialConfig::new(TOKEN_URL, "integration"),
    );
    let source = SourceClient::new(platform, API_BASE).expect("source client");
    SyncEngine::new(
        Arc::clone(db),
        credentials,
        source,
        Arc::new(Catalog::standard()),
        SyncOptions::default(),
    )
}

async fn run(engine: &SyncEngine, trigger: TriggerSource) -> pms_sync::SyncReport {
    tokio::time::timeout(RUN_TIMEOUT, engine.run(RunRequest::new(trigger), None))
        .await
        .expect("run timed out")
        .expect("run failed")
}

async fn scalar(db: &DatabaseConnection, sql: &str) -> i64 {
    let row = db
        .query_one(Statement::from_string(db.get_database_backend(), sql.to_string()))
        .await
        .unwrap()
        .expect("one row");
    row.try_get::<i64>("", "n").unwrap()
}

async fn text(db: &DatabaseConnection, sql: &str) -> String {
    let row = db
        .query_one(Statement::from_string(db.get_database_backend(), sql.to_string()))
        .await
        .unwrap()
        .expect("one row");
    row.try_get::<String>("", "v").unwrap()
}

fn seed_every_entity(platform: &FakePlatform, catalog: &Catalog) -> HashMap<&'static str, u32> {
    catalog
        .in_priority_order()
        .enumerate()
        .map(|(i, entity)| {
            let count = 3 + i as u32;
            platform.set_records(&format!("/api/{}", entity.source_path), count, entity.name);
            (entity.target_table, count)
        })
        .collect()
}

#[tokio::test]
async fn test_full_catalog_run_is_idempotent() {
    let db = setup(TimeDelta::hours(1)).await;
    let platform = Arc::new(FakePlatform::default());
    let catalog = Catalog::standard();
    let expected = seed_every_entity(&platform, &catalog);
    let engine = engine(&db, platform.clone());

    let first = run(&engine, TriggerSource::Scheduler).await;
    assert_eq!(first.status, RunStatus::Completed);
    assert_eq!(first.results.len(), catalog.len());
    assert!(
        first
            .results
            .iter()
            .all(|r| r.status == EntityStatus::Synced && r.errored == 0)
    );

    let mut after_first = HashMap::new();
    for (table, count) in &expected {
        let rows = count_rows(&db, table).await.unwrap();
        assert_eq!(rows, u64::from(*count), "{table}");
        after_first.insert(*table, rows);
    }

    let second = run(&engine, TriggerSource::Scheduler).await;
    assert_eq!(second.total_upserted, first.total_upserted);

    for (table, rows) in &after_first {
        assert_eq!(count_rows(&db, table).await.unwrap(), *rows, "{table}");
        let distinct = scalar(
            &db,
            &format!("SELECT COUNT(DISTINCT pms_id) AS n FROM {table}"),
        )
        .await;
        assert_eq!(distinct as u64, *rows, "{table} has duplicate keys");
    }

    assert_eq!(platform.refreshes.load(Ordering::SeqCst), 0);
    assert_eq!(
        platform.page_requests.load(Ordering::SeqCst),
        2 * catalog.len()
    );
}

#[tokio::test]
async fn test_upsert_overwrites_changed_fields() {
    let db = setup(TimeDelta::hours(1)).await;
    let platform = Arc::new(FakePlatform::default());
    platform.set_page(
        "/api/v1/resource",
        1,
        json!({"results": [{"id": 7, "name": "Consult Room"}], "next": null}),
    );
    let engine = engine(&db, platform.clone());

    run(&engine, TriggerSource::Cli).await;
    let first_sync = text(
        &db,
        "SELECT CAST(last_synced_at AS TEXT) AS v FROM pms_resources WHERE pms_id = '7'",
    )
    .await;

    platform.set_page(
        "/api/v1/resource",
        1,
        json!({"results": [{"id": 7, "name": "Surgery"}], "next": null}),
    );
    tokio::time::sleep(Duration::from_millis(5)).await;
    run(&engine, TriggerSource::Cli).await;

    assert_eq!(count_rows(&db, "pms_resources").await.unwrap(), 1);
    assert_eq!(
        text(&db, "SELECT name AS v FROM pms_resources WHERE pms_id = '7'").await,
        "Surgery"
    );
    let second_sync = text(
        &db,
        "SELECT CAST(last_synced_at AS TEXT) AS v FROM pms_resources WHERE pms_id = '7'",
    )
    .await;
    assert_ne!(first_sync, second_sync);
}

#[tokio::test]
async fn test_cursor_pages_are_all_persisted() {
    let db = setup(TimeDelta::hours(1)).await;
    let platform = Arc::new(FakePlatform::default());
    for page in 1..=3u32 {
        let results: Vec<Value> = (0..10)
            .map(|i| json!({"id": format!("p{page}-{i}"), "name": "Rex", "species": "Canine"}))
            .collect();
        let next = (page < 3).then(|| format!("/api/v1/animal?page_size=100&page={}", page + 1));
        platform.set_page("/api/v1/animal", page, json!({"results": results, "next": next}));
    }
    let engine = engine(&db, platform.clone());

    let report = tokio::time::timeout(
        RUN_TIMEOUT,
        engine.run(
            RunRequest::new(TriggerSource::Cli).with_entities(vec!["patients".to_string()]),
            None,
        ),
    )
    .await
    .unwrap()
    .unwrap();

    let patients = report.result("patients").unwrap();
    assert_eq!(patients.pages, 3);
    assert_eq!(patients.fetched, 30);
    assert_eq!(patients.upserted, 30);
    assert_eq!(count_rows(&db, "pms_patients").await.unwrap(), 30);
}

#[tokio::test]
async fn test_repeated_ids_in_a_page_land_once() {
    let db = setup(TimeDelta::hours(1)).await;
    let platform = Arc::new(FakePlatform::default());
    platform.set_page(
        "/api/v1/product",
        1,
        json!({
            "results": [
                {"id": 1, "name": "Old Label"},
                {"id": 1, "name": "New Label"},
                {"id": 2, "name": "Wormer"},
            ],
            "next": null
        }),
    );
    let engine = engine(&db, platform.clone());

    let report = tokio::time::timeout(
        RUN_TIMEOUT,
        engine.run(
            RunRequest::new(TriggerSource::Cli).with_entities(vec!["products".to_string()]),
            None,
        ),
    )
    .await
    .unwrap()
    .unwrap();

    let products = report.result("products").unwrap();
    assert_eq!(products.status, EntityStatus::Synced);
    assert_eq!(products.fetched, 3);
    assert_eq!(products.upserted, 2);
    assert_eq!(products.errored, 0);
    assert_eq!(count_rows(&db, "pms_products").await.unwrap(), 2);
    assert_eq!(
        text(&db, "SELECT name AS v FROM pms_products WHERE pms_id = '1'").await,
        "New Label"
    );
}

#[tokio::test]
async fn test_expired_token_is_refreshed_once_and_stored() {
    let db = setup(TimeDelta::seconds(30)).await;
    let platform = Arc::new(FakePlatform::default());
    platform.set_records("/api/v1/product", 2, "product");
    let engine = engine(&db, platform.clone());

    let report = tokio::time::timeout(
        RUN_TIMEOUT,
        engine.run(
            RunRequest::new(TriggerSource::Cli).with_entities(vec!["products".to_string()]),
            None,
        ),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(report.total_upserted, 2);
    assert_eq!(platform.refreshes.load(Ordering::SeqCst), 1);

    let stored = store::load(&db).await.unwrap().expect("credential row");
    assert_eq!(stored.access_token, "fresh-1");
    assert_eq!(stored.refresh_token, "rotated-1");

    run(&engine, TriggerSource::Cli).await;
    assert_eq!(platform.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_each_run_is_audited() {
    let db = setup(TimeDelta::hours(1)).await;
    let platform = Arc::new(FakePlatform::default());
    platform.set_records("/api/v1/contact", 4, "contact");
    let engine = engine(&db, platform);

    run(&engine, TriggerSource::ManualConsole).await;
    run(&engine, TriggerSource::Scheduler).await;

    let rows = SyncRunLog::find().all(db.as_ref()).await.unwrap();
    assert_eq!(rows.len(), 2);

    let latest = audit::recent_runs(&db, 1).await.unwrap();
    assert_eq!(latest[0].sync_type, "scheduled");
    assert_eq!(latest[0].records_synced, 4);
    assert_eq!(latest[0].metadata["results"]["contacts"]["upserted"], 4);
    assert_eq!(latest[0].metadata["trigger"]["kind"], "scheduler");

    let last = audit::last_successful_run(&db).await.unwrap().unwrap();
    assert!(last.age(Utc::now()) >= TimeDelta::zero());
}
