//! Persistence of mapped records into the mirror's target tables.

pub mod bulk;
mod count;
mod errors;

pub use bulk::{
    BatchFailure, DEFAULT_BATCH_SIZE, DEFAULT_PERSIST_RETRIES, PersistOptions, PersistOutcome,
    build_upsert, persist, upsert_batch_with_retry,
};
pub use count::count_rows;
pub use errors::{Result, StoreError};
