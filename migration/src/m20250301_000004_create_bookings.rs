use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000001_create_users::User;
use super::m20250301_000002_create_drivers::Driver;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Booking::Table)
                    .if_not_exists()
                    .col(uuid(Booking::Id).primary_key())
                    .col(uuid(Booking::RiderId).not_null())
                    .col(uuid(Booking::DriverId).not_null())
                    .col(integer(Booking::PassengerCount).not_null())
                    .col(timestamp_with_time_zone(Booking::PickupAt).not_null())
                    .col(timestamp_with_time_zone(Booking::DropoffAt).not_null())
                    .col(string_len(Booking::PickupLocation, 255).not_null())
                    .col(string_len(Booking::DropoffLocation, 255).not_null())
                    .col(decimal_len(Booking::DistanceKm, 10, 2).not_null())
                    .col(decimal_len(Booking::TotalCost, 12, 2).not_null())
                    .col(decimal_len(Booking::DurationHours, 8, 2).not_null())
                    .col(string_len(Booking::Status, 16).not_null())
                    .col(string_len(Booking::PaymentStatus, 16).not_null())
                    .col(text_null(Booking::Notes))
                    .col(
                        timestamp_with_time_zone(Booking::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Booking::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_rider")
                            .from(Booking::Table, Booking::RiderId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_driver")
                            .from(Booking::Table, Booking::DriverId)
                            .to(Driver::Table, Driver::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Availability scans filter on driver + status
        manager
            .create_index(
                Index::create()
                    .name("idx_booking_driver_status")
                    .table(Booking::Table)
                    .col(Booking::DriverId)
                    .col(Booking::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Booking::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Booking {
    Table,
    Id,
    RiderId,
    DriverId,
    PassengerCount,
    PickupAt,
    DropoffAt,
    PickupLocation,
    DropoffLocation,
    DistanceKm,
    TotalCost,
    DurationHours,
    Status,
    PaymentStatus,
    Notes,
    CreatedAt,
    UpdatedAt,
}
