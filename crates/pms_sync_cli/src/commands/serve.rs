//! Run the HTTP trigger server.

use std::sync::Arc;

use pms_sync::trigger::{self, AppState, AuthGate, DbOperatorDirectory};
use sea_orm::DatabaseConnection;
use tokio::net::TcpListener;

use super::shared::build_engine;
use crate::config::Config;
use crate::progress::ProgressReporter;
use crate::shutdown::shutdown_signal;

pub(crate) async fn handle_serve(
    bind: Option<String>,
    config: &Config,
    db: &Arc<DatabaseConnection>,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = build_engine(config, db)?;

    let gate = AuthGate::new(config.trigger.secret.clone())
        .with_manual_sentinel(config.trigger.manual_sentinel.clone())
        .with_operators(Arc::new(DbOperatorDirectory::new(Arc::clone(db))));

    // Server output goes to the log, never to spinners.
    let reporter = Arc::new(ProgressReporter::logging());
    let state = AppState::new(engine, gate).with_progress(reporter.as_callback());

    let bind = bind.unwrap_or_else(|| config.trigger.bind.clone());
    let listener = TcpListener::bind(&bind)
        .await
        .map_err(|e| format!("Failed to bind trigger server to {bind}: {e}"))?;

    trigger::serve(listener, state, shutdown_signal()).await?;
    tracing::info!("Trigger server stopped");
    Ok(())
}
