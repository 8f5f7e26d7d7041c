use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000001_create_users::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Driver::Table)
                    .if_not_exists()
                    .col(uuid(Driver::Id).primary_key())
                    .col(uuid(Driver::OwnerUserId).not_null())
                    .col(string_len(Driver::LicenseNumber, 64).not_null().unique_key())
                    .col(string_len(Driver::Plate, 32).not_null().unique_key())
                    .col(string_len(Driver::CarModel, 100).not_null())
                    .col(string_len(Driver::VehicleClass, 16).not_null())
                    .col(integer(Driver::Capacity).not_null())
                    .col(string_len(Driver::OperationalStatus, 16).not_null())
                    .col(
                        timestamp_with_time_zone(Driver::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_driver_owner_user")
                            .from(Driver::Table, Driver::OwnerUserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Driver::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Driver {
    Table,
    Id,
    OwnerUserId,
    LicenseNumber,
    Plate,
    CarModel,
    VehicleClass,
    Capacity,
    OperationalStatus,
    CreatedAt,
}
