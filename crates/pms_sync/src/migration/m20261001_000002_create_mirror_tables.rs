//! Target tables mirrored from the remote platform, one per catalog entity.
//!
//! Every table carries a surrogate `id`, the remote identifier `pms_id` under a
//! UNIQUE index (the upsert conflict key) and `last_synced_at`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (table, columns) in mirror_tables() {
            manager
                .create_table(mirror_table(table, columns))
                .await?;
            manager
                .create_index(
                    Index::create()
                        .name(format!("idx_{table}_pms_id"))
                        .table(Alias::new(table))
                        .col(Col::PmsId)
                        .unique()
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (table, _) in mirror_tables().into_iter().rev() {
            manager
                .drop_table(Table::drop().table(Alias::new(table)).to_owned())
                .await?;
        }
        Ok(())
    }
}

fn mirror_table(table: &str, columns: Vec<ColumnDef>) -> TableCreateStatement {
    let mut create = Table::create();
    create
        .table(Alias::new(table))
        .if_not_exists()
        .col(
            ColumnDef::new(Col::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(Col::PmsId).string().not_null());
    for column in columns {
        create.col(column);
    }
    create
        .col(
            ColumnDef::new(Col::LastSyncedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .to_owned()
}

fn mirror_tables() -> Vec<(&'static str, Vec<ColumnDef>)> {
    vec![
        (
            "pms_appointment_types",
            vec![
                string(Col::Name),
                int(Col::DurationMinutes),
                string(Col::Colour),
                flag(Col::IsActive),
                timestamp(Col::ModifiedAt),
            ],
        ),
        (
            "pms_appointment_statuses",
            vec![
                string(Col::Name),
                flag(Col::IsActive),
                timestamp(Col::ModifiedAt),
            ],
        ),
        (
            "pms_resources",
            vec![
                string(Col::Name),
                string(Col::ResourceType),
                string(Col::OwnershipId),
                flag(Col::IsActive),
                timestamp(Col::ModifiedAt),
            ],
        ),
        (
            "pms_products",
            vec![
                string(Col::Code),
                string(Col::Name),
                string(Col::ProductGroup),
                decimal(Col::Price),
                flag(Col::IsActive),
                timestamp(Col::ModifiedAt),
            ],
        ),
        (
            "pms_contacts",
            vec![
                string(Col::Code),
                string(Col::FirstName),
                string(Col::LastName),
                string(Col::BusinessName),
                flag(Col::IsBusiness),
                string(Col::Email),
                string(Col::Phone),
                flag(Col::IsActive),
                timestamp(Col::CreatedAt),
                timestamp(Col::ModifiedAt),
            ],
        ),
        (
            "pms_appointments",
            vec![
                timestamp(Col::StartAt),
                timestamp(Col::EndAt),
                string(Col::TypeId),
                string(Col::StatusId),
                string(Col::PatientId),
                string(Col::ContactId),
                json_array(Col::ResourceIds),
                long_text(Col::Description),
                flag(Col::IsActive),
                timestamp(Col::ModifiedAt),
            ],
        ),
        (
            "pms_patients",
            vec![
                string(Col::Name),
                string(Col::ContactId),
                string(Col::Species),
                string(Col::Breed),
                string(Col::Sex),
                timestamp(Col::DateOfBirth),
                flag(Col::IsDeceased),
                string(Col::Microchip),
                decimal(Col::WeightKg),
                flag(Col::IsActive),
                timestamp(Col::ModifiedAt),
            ],
        ),
        (
            "pms_consults",
            vec![
                string(Col::ConsultNumber),
                string(Col::PatientId),
                string(Col::ContactId),
                string(Col::PractitionerId),
                timestamp(Col::StartedAt),
                long_text(Col::Reason),
                flag(Col::IsFinalised),
                timestamp(Col::ModifiedAt),
            ],
        ),
        (
            "pms_invoices",
            vec![
                string(Col::InvoiceNumber),
                string(Col::ContactId),
                string(Col::ConsultId),
                timestamp(Col::InvoiceDate),
                decimal(Col::Total),
                decimal(Col::AmountDue),
                string(Col::Status),
                flag(Col::IsActive),
                timestamp(Col::ModifiedAt),
            ],
        ),
        (
            "pms_invoice_lines",
            vec![
                string(Col::InvoiceId),
                string(Col::ProductId),
                string(Col::ConsultId),
                long_text(Col::Description),
                decimal(Col::Quantity),
                decimal(Col::UnitPrice),
                decimal(Col::LineTotal),
                timestamp(Col::ModifiedAt),
            ],
        ),
    ]
}

fn string(col: Col) -> ColumnDef {
    ColumnDef::new(col).string().null().to_owned()
}

fn long_text(col: Col) -> ColumnDef {
    ColumnDef::new(col).text().null().to_owned()
}

fn int(col: Col) -> ColumnDef {
    ColumnDef::new(col).big_integer().null().to_owned()
}

fn decimal(col: Col) -> ColumnDef {
    ColumnDef::new(col).double().null().to_owned()
}

fn flag(col: Col) -> ColumnDef {
    ColumnDef::new(col)
        .boolean()
        .not_null()
        .default(false)
        .to_owned()
}

fn timestamp(col: Col) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .null()
        .to_owned()
}

fn json_array(col: Col) -> ColumnDef {
    ColumnDef::new(col)
        .json_binary()
        .not_null()
        .default(Expr::cust("'[]'"))
        .to_owned()
}

#[derive(DeriveIden, Clone, Copy)]
enum Col {
    Id,
    PmsId,
    LastSyncedAt,
    Name,
    Code,
    Colour,
    DurationMinutes,
    ResourceType,
    OwnershipId,
    ProductGroup,
    Price,
    FirstName,
    LastName,
    BusinessName,
    IsBusiness,
    Email,
    Phone,
    CreatedAt,
    ModifiedAt,
    IsActive,
    StartAt,
    EndAt,
    TypeId,
    StatusId,
    PatientId,
    ContactId,
    ResourceIds,
    Description,
    Species,
    Breed,
    Sex,
    DateOfBirth,
    IsDeceased,
    Microchip,
    WeightKg,
    ConsultNumber,
    PractitionerId,
    StartedAt,
    Reason,
    IsFinalised,
    InvoiceNumber,
    ConsultId,
    InvoiceDate,
    Total,
    AmountDue,
    Status,
    InvoiceId,
    ProductId,
    Quantity,
    UnitPrice,
    LineTotal,
}
