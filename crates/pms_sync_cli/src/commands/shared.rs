use std::sync::Arc;
use std::time::Duration;

use pms_sync::catalog::Catalog;
use pms_sync::credential::CredentialManager;
use pms_sync::http::HttpTransport;
use pms_sync::http::reqwest_transport::ReqwestTransport;
use pms_sync::source::SourceClient;
use pms_sync::sync::SyncEngine;
use sea_orm::DatabaseConnection;

use crate::config::Config;

/// Output format for listing commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// HTTP transport to the remote platform with the configured timeout.
pub(crate) fn transport(config: &Config) -> Result<Arc<dyn HttpTransport>, Box<dyn std::error::Error>> {
    let transport = ReqwestTransport::with_timeout(Duration::from_secs(config.source.timeout_secs))?;
    Ok(Arc::new(transport))
}

pub(crate) fn credential_manager(
    config: &Config,
    db: &Arc<DatabaseConnection>,
    transport: Arc<dyn HttpTransport>,
) -> Result<CredentialManager, Box<dyn std::error::Error>> {
    Ok(CredentialManager::new(
        Arc::clone(db),
        transport,
        config.credential_config()?,
    ))
}

/// Assemble an engine over the standard catalog from configuration.
pub(crate) fn build_engine(
    config: &Config,
    db: &Arc<DatabaseConnection>,
) -> Result<SyncEngine, Box<dyn std::error::Error>> {
    let transport = transport(config)?;
    let credentials = credential_manager(config, db, transport.clone())?;
    let source = SourceClient::new(transport, config.api_base()?)?
        .with_page_size(config.source.page_size)
        .with_rate_limit(config.source.requests_per_second);

    Ok(SyncEngine::new(
        Arc::clone(db),
        credentials,
        source,
        Arc::new(Catalog::standard()),
        config.sync_options()?,
    ))
}

/// Format milliseconds for humans, e.g. `1.2s` or `3m 05s`.
pub(crate) fn format_duration_ms(ms: u64) -> String {
    let secs = ms / 1000;
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}
