//! SeaORM entity definitions for the sync bookkeeping tables.
//!
//! The mirrored target tables are not modelled here; the persister writes them
//! through dynamically built statements driven by the entity catalog.

pub mod credential;
pub mod operator;
pub mod prelude;
pub mod run_status;
pub mod sync_run_log;
