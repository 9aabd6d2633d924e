use sea_orm::DbErr;
use thiserror::Error;

use crate::source::SourceError;

/// Run-level failures. Everything else is reported inside the run's results.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No valid access token; nothing was synced.
    #[error("unauthorized: no valid access token for the remote platform")]
    Unauthorized,

    #[error("unknown entity: {0}")]
    UnknownEntity(String),
}

/// Failure of one entity's pipeline, recorded as a crashed result.
#[derive(Debug, Error)]
pub enum EntityError {
    #[error("cannot build source URL: {0}")]
    Source(#[from] SourceError),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

pub type Result<T> = std::result::Result<T, SyncError>;
