//! Credential refresh errors.

use thiserror::Error;

use crate::http::HttpError;

/// Why a valid access token could not be produced.
///
/// These never reach the sync engine as errors; the credential manager logs
/// them and reports "no token".
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No credential row exists yet (run `pms-sync auth seed`).
    #[error("no stored credential; seed one before syncing")]
    NotSeeded,

    #[error("token endpoint request failed: {0}")]
    Http(#[from] HttpError),

    /// The token endpoint answered with a non-success status.
    #[error("token endpoint rejected the refresh ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("failed to parse token response: {0}")]
    Parse(String),

    #[error("credential storage failed: {0}")]
    Database(#[from] sea_orm::DbErr),
}

pub type Result<T> = std::result::Result<T, CredentialError>;
