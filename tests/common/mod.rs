#![allow(dead_code)]

use chrono::{DateTime, Days, Utc};
use migration::{Migrator, MigratorTrait};
use rust_decimal::Decimal;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use uuid::Uuid;

use ride_booking_backend::entities::driver;
use ride_booking_backend::entities::pricing_rule::VehicleClass;
use ride_booking_backend::entities::user::{self, UserRole};
use ride_booking_backend::services::bookings::NewBooking;
use ride_booking_backend::services::drivers::{self, NewDriver};
use ride_booking_backend::services::pricing;
use ride_booking_backend::services::users::{self, NewUser};

/// Fresh in-memory database with the schema and default pricing rules.
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    // One connection, otherwise every pooled connection gets its own empty database
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await.expect("connect sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    pricing::seed_default_rules(&db).await.expect("seed pricing");
    db
}

pub async fn user(db: &DatabaseConnection, name: &str, role: UserRole) -> user::Model {
    users::provision(
        db,
        NewUser {
            email: format!("{}.{}@example.com", name.to_lowercase().replace(' ', "."), Uuid::new_v4().simple()),
            name: name.to_string(),
            role,
        },
    )
    .await
    .expect("provision user")
}

pub async fn rider(db: &DatabaseConnection, name: &str) -> user::Model {
    user(db, name, UserRole::Rider).await
}

pub async fn driver(
    db: &DatabaseConnection,
    name: &str,
    vehicle_class: VehicleClass,
    capacity: i32,
) -> driver::Model {
    let owner = user(db, name, UserRole::Driver).await;
    let tag = Uuid::new_v4().simple().to_string();

    drivers::create(
        db,
        NewDriver {
            owner_user_id: owner.id,
            license_number: format!("LIC-{}", &tag[..12]),
            plate: format!("P-{}", &tag[..8]),
            car_model: "Toyota".to_string(),
            vehicle_class,
            capacity,
        },
    )
    .await
    .expect("create driver")
}

/// A time two days out, so pickups are always in the future.
pub fn future_at(hour: u32, minute: u32) -> DateTime<Utc> {
    (Utc::now().date_naive() + Days::new(2))
        .and_hms_opt(hour, minute, 0)
        .expect("valid time")
        .and_utc()
}

pub fn request(
    rider: &user::Model,
    driver: &driver::Model,
    pickup_at: DateTime<Utc>,
    dropoff_at: DateTime<Utc>,
) -> NewBooking {
    NewBooking {
        rider_id: rider.id,
        driver_id: driver.id,
        passenger_count: 2,
        pickup_at,
        dropoff_at,
        pickup_location: "Central Station".to_string(),
        dropoff_location: "Airport".to_string(),
        distance_km: Some(Decimal::from(5)),
        notes: None,
    }
}

/// Normalise money read back from SQLite, which stores decimals as REAL.
pub fn money(amount: Decimal) -> Decimal {
    amount.round_dp(2)
}

pub fn cents(c: i64) -> Decimal {
    Decimal::new(c, 2)
}
