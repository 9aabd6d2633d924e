//! Load and save the singleton credential row.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, DatabaseConnection, DbErr, EntityTrait};

use crate::entity::credential::{self, SINGLETON_ID};

/// Values written to the credential row.
pub struct CredentialUpdate<'a> {
    pub access_token: &'a str,
    pub refresh_token: &'a str,
    pub expires_at: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
}

/// Read the stored credential, if one has been seeded.
pub async fn load(db: &DatabaseConnection) -> Result<Option<credential::Model>, DbErr> {
    credential::Entity::find_by_id(SINGLETON_ID).one(db).await
}

/// Insert or overwrite the singleton row.
pub async fn save(db: &DatabaseConnection, update: &CredentialUpdate<'_>) -> Result<(), DbErr> {
    let model = credential::ActiveModel {
        id: Set(SINGLETON_ID),
        access_token: Set(update.access_token.to_string()),
        refresh_token: Set(update.refresh_token.to_string()),
        expires_at: Set(update.expires_at.fixed_offset()),
        issued_at: Set(update.issued_at.fixed_offset()),
    };

    credential::Entity::insert(model)
        .on_conflict(
            OnConflict::column(credential::Column::Id)
                .update_columns([
                    credential::Column::AccessToken,
                    credential::Column::RefreshToken,
                    credential::Column::ExpiresAt,
                    credential::Column::IssuedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    Ok(())
}
