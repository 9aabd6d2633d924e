//! Status and mode labels stored on each sync run log row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Outcome of a whole sync invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every entity ran and nothing errored.
    #[sea_orm(string_value = "completed")]
    Completed,
    /// The run finished, but some entity errored, crashed, stopped early or was skipped.
    #[sea_orm(string_value = "partial")]
    Partial,
    /// Authentication failed; no entity was processed.
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// Which fetch modes the entities of a run used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[sea_orm(string_value = "full")]
    Full,
    #[sea_orm(string_value = "incremental")]
    Incremental,
    #[sea_orm(string_value = "mixed")]
    Mixed,
    /// No entity reached the fetch step.
    #[sea_orm(string_value = "none")]
    None,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Partial => write!(f, "partial"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Full => write!(f, "full"),
            RunMode::Incremental => write!(f, "incremental"),
            RunMode::Mixed => write!(f, "mixed"),
            RunMode::None => write!(f, "none"),
        }
    }
}
