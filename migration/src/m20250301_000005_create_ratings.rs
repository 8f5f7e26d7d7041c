use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000001_create_users::User;
use super::m20250301_000002_create_drivers::Driver;
use super::m20250301_000004_create_bookings::Booking;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Rating::Table)
                    .if_not_exists()
                    .col(uuid(Rating::Id).primary_key())
                    .col(uuid(Rating::BookingId).not_null().unique_key())
                    .col(uuid(Rating::RiderId).not_null())
                    .col(uuid(Rating::DriverId).not_null())
                    .col(small_integer(Rating::Score).not_null())
                    .col(text_null(Rating::Review))
                    .col(
                        timestamp_with_time_zone(Rating::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    // Deleting a booking removes the rating explicitly in the same
                    // transaction; the FK only guards against orphans.
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rating_booking")
                            .from(Rating::Table, Rating::BookingId)
                            .to(Booking::Table, Booking::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rating_rider")
                            .from(Rating::Table, Rating::RiderId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rating_driver")
                            .from(Rating::Table, Rating::DriverId)
                            .to(Driver::Table, Driver::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Rating::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Rating {
    Table,
    Id,
    BookingId,
    RiderId,
    DriverId,
    Score,
    Review,
    CreatedAt,
}
