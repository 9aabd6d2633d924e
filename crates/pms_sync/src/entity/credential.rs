//! Credential entity - the singleton OAuth credential for the remote platform.
//!
//! Exactly one row exists (`id = 1`). It is written by the credential manager
//! after a successful refresh and by the `auth seed` bootstrap command.

use sea_orm::entity::prelude::*;

/// Primary key of the only credential row.
pub const SINGLETON_ID: i32 = 1;

#[derive(Clone, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pms_credentials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,

    #[sea_orm(column_type = "Text")]
    pub access_token: String,

    #[sea_orm(column_type = "Text")]
    pub refresh_token: String,

    /// Absolute expiry of `access_token`.
    pub expires_at: DateTimeWithTimeZone,

    /// When `access_token` was issued (or seeded).
    pub issued_at: DateTimeWithTimeZone,
}

// Tokens never reach log output.
impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
