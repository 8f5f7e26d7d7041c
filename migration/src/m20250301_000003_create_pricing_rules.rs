use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One active rule per vehicle class: the class is the key
        manager
            .create_table(
                Table::create()
                    .table(PricingRule::Table)
                    .if_not_exists()
                    .col(string_len(PricingRule::VehicleClass, 16).primary_key())
                    .col(decimal_len(PricingRule::BaseFare, 12, 2).not_null())
                    .col(decimal_len(PricingRule::PricePerKm, 12, 2).not_null())
                    .col(decimal_len(PricingRule::PricePerMinute, 12, 2).not_null())
                    .col(decimal_len(PricingRule::PeakMultiplier, 6, 2).not_null())
                    .col(decimal_len(PricingRule::MinimumFare, 12, 2).not_null())
                    .col(
                        timestamp_with_time_zone(PricingRule::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PricingRule::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum PricingRule {
    Table,
    VehicleClass,
    BaseFare,
    PricePerKm,
    PricePerMinute,
    PeakMultiplier,
    MinimumFare,
    UpdatedAt,
}
