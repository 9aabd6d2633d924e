use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;

use crate::sync::SyncError;

/// Errors surfaced by the trigger endpoint.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// The bearer credential is missing or matches nothing.
    #[error("unauthorized")]
    Unauthorized,

    /// Another run is still in progress in this process.
    #[error("a sync run is already in progress")]
    Busy,

    /// The operator lookup failed.
    #[error("operator lookup failed: {0}")]
    Directory(#[from] DbErr),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl TriggerError {
    pub fn status(&self) -> StatusCode {
        match self {
            TriggerError::Unauthorized | TriggerError::Sync(SyncError::Unauthorized) => {
                StatusCode::UNAUTHORIZED
            }
            TriggerError::Busy => StatusCode::CONFLICT,
            TriggerError::Sync(SyncError::UnknownEntity(_)) => StatusCode::BAD_REQUEST,
            TriggerError::Directory(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TriggerError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "success": false, "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, TriggerError>;
