//! pms_sync - mirror a practice-management platform's REST API into SQL.
//!
//! A run authenticates against the platform once, then walks a fixed catalog of
//! entities (reference data first, large transactional tables last). Each
//! entity is fetched page by page, mapped into its target table's columns and
//! upserted in batches keyed on the remote id. Every run is recorded in
//! `sync_run_logs`.
//!
//! # Features
//!
//! - `sqlite` / `postgres` - Database backends for the mirror.
//! - `migrate` - Enables database migration support. When enabled, you can use
//!   [`connect_and_migrate`] to create every table on connection.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pms_sync::catalog::Catalog;
//! use pms_sync::credential::{CredentialConfig, CredentialManager};
//! use pms_sync::http::reqwest_transport::ReqwestTransport;
//! use pms_sync::source::SourceClient;
//! use pms_sync::sync::{RunRequest, SyncEngine, SyncOptions, TriggerSource};
//!
//! let db = Arc::new(pms_sync::connect_and_migrate("sqlite://mirror.db?mode=rwc").await?);
//! let transport = Arc::new(ReqwestTransport::new(reqwest::Client::new()));
//! let credentials = CredentialManager::new(Arc::clone(&db), transport.clone(), CredentialConfig::new(token_url, client_id));
//! let source = SourceClient::new(transport, "https://api.pms.example/")?;
//! let engine = SyncEngine::new(db, credentials, source, Arc::new(Catalog::standard()), SyncOptions::default());
//!
//! let report = engine.run(RunRequest::new(TriggerSource::Cli), None).await?;
//! println!("{} upserted in {} ms", report.total_upserted, report.total_elapsed_ms);
//! ```

pub mod audit;
pub mod catalog;
pub mod credential;
pub mod db;
pub mod entity;
pub mod http;
pub mod source;
pub mod store;
pub mod sync;
pub mod trigger;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use sync::{RunRequest, SyncEngine, SyncError, SyncOptions, SyncReport, TriggerSource};
