//! Bookkeeping tables: the credential singleton, the run log and operators.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_credentials(manager).await?;
        self.create_sync_run_logs(manager).await?;
        self.create_operators(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Operators::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyncRunLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PmsCredentials::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_credentials(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PmsCredentials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PmsCredentials::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PmsCredentials::AccessToken).text().not_null())
                    .col(
                        ColumnDef::new(PmsCredentials::RefreshToken)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PmsCredentials::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PmsCredentials::IssuedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_sync_run_logs(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncRunLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncRunLogs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncRunLogs::SyncType).string().not_null())
                    .col(ColumnDef::new(SyncRunLogs::Mode).string().not_null())
                    .col(ColumnDef::new(SyncRunLogs::Status).string().not_null())
                    .col(
                        ColumnDef::new(SyncRunLogs::RecordsSynced)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncRunLogs::RecordsErrored)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncRunLogs::Metadata)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'")),
                    )
                    .col(
                        ColumnDef::new(SyncRunLogs::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncRunLogs::FinishedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncRunLogs::DurationMs)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // "Last successful sync" and "recent runs" both sort by finish time.
        manager
            .create_index(
                Index::create()
                    .name("idx_sync_run_logs_finished_at")
                    .table(SyncRunLogs::Table)
                    .col((SyncRunLogs::FinishedAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await
    }

    async fn create_operators(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Operators::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Operators::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Operators::Email)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Operators::TokenSha256)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Operators::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Operators::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum PmsCredentials {
    Table,
    Id,
    AccessToken,
    RefreshToken,
    ExpiresAt,
    IssuedAt,
}

#[derive(DeriveIden)]
enum SyncRunLogs {
    Table,
    Id,
    SyncType,
    Mode,
    Status,
    RecordsSynced,
    RecordsErrored,
    Metadata,
    StartedAt,
    FinishedAt,
    DurationMs,
}

#[derive(DeriveIden)]
enum Operators {
    Table,
    Id,
    Email,
    TokenSha256,
    IsActive,
    CreatedAt,
}
