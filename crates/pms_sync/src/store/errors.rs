use sea_orm::DbErr;
use thiserror::Error;

/// Errors writing mirrored records.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Records in one batch do not share the same columns.
    #[error("record {index} has columns {found:?}, expected {expected:?}")]
    ColumnMismatch {
        index: usize,
        expected: Vec<&'static str>,
        found: Vec<&'static str>,
    },

    /// The conflict key is not among the record's columns.
    #[error("conflict key `{column}` missing from records for {table}")]
    MissingConflictKey {
        table: &'static str,
        column: &'static str,
    },

    #[error("cannot build an upsert for an empty batch")]
    EmptyBatch,

    #[error("invalid statement: {0}")]
    Statement(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
