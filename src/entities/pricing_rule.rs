use std::fmt;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Vehicle category keying into the pricing catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    #[sea_orm(string_value = "sedan")]
    Sedan,
    #[sea_orm(string_value = "suv")]
    Suv,
    #[sea_orm(string_value = "van")]
    Van,
    #[sea_orm(string_value = "minibus")]
    Minibus,
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sedan => write!(f, "sedan"),
            Self::Suv => write!(f, "suv"),
            Self::Van => write!(f, "van"),
            Self::Minibus => write!(f, "minibus"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pricing_rule")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub vehicle_class: VehicleClass,
    pub base_fare: Decimal,
    pub price_per_km: Decimal,
    pub price_per_minute: Decimal,
    pub peak_multiplier: Decimal,
    pub minimum_fare: Decimal,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
