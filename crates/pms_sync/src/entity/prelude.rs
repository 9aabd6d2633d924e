//! Common re-exports for convenient entity usage.

pub use super::credential::{
    ActiveModel as CredentialActiveModel, Column as CredentialColumn, Entity as Credential,
    Model as CredentialModel,
};
pub use super::operator::{
    ActiveModel as OperatorActiveModel, Column as OperatorColumn, Entity as Operator,
    Model as OperatorModel,
};
pub use super::run_status::{RunMode, RunStatus};
pub use super::sync_run_log::{
    ActiveModel as SyncRunLogActiveModel, Column as SyncRunLogColumn, Entity as SyncRunLog,
    Model as SyncRunLogModel,
};
