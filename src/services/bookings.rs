//! Booking store: creation, lookups, lifecycle writes and administrative edits.
//!
//! Anything that can make a booking occupy a driver's schedule (create,
//! reschedule, override into an active status) runs in one transaction that
//! locks the driver row, checks availability, and writes.

use std::collections::HashMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus, PaymentStatus};
use crate::entities::driver::{self, OperationalStatus};
use crate::entities::pricing_rule::VehicleClass;
use crate::entities::user::{self, UserRole};
use crate::entities::rating;
use crate::error::{AppError, AppResult};
use crate::services::availability;
use crate::services::lifecycle::{self, Outcome, Transition};
use crate::services::pricing::{self, round_money, PeakWindowConfig, TripMetrics};

#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub rider_id: Uuid,
    pub driver_id: Uuid,
    pub passenger_count: i32,
    pub pickup_at: DateTime<Utc>,
    pub dropoff_at: DateTime<Utc>,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub distance_km: Option<Decimal>,
    pub notes: Option<String>,
}

impl NewBooking {
    /// Check the request and bring the distance to the stored precision, so the
    /// fare is computed from the same figure that is persisted.
    fn validate(mut self, now: DateTime<Utc>) -> AppResult<Self> {
        validate_schedule(self.pickup_at, self.dropoff_at, now)?;

        if self.passenger_count <= 0 {
            return Err(AppError::Validation(
                "Must book for at least 1 passenger".to_string(),
            ));
        }
        if self.pickup_location.trim().is_empty() || self.dropoff_location.trim().is_empty() {
            return Err(AppError::Validation(
                "Pickup and dropoff locations are required".to_string(),
            ));
        }
        self.distance_km = pricing::normalize_distance(self.distance_km)?;
        Ok(self)
    }
}

/// Longest trip a single booking may cover.
pub const MAX_TRIP_HOURS: i64 = 24 * 7;

/// A window must be non-empty and no longer than [`MAX_TRIP_HOURS`].
pub fn validate_window(pickup_at: DateTime<Utc>, dropoff_at: DateTime<Utc>) -> AppResult<()> {
    if dropoff_at <= pickup_at {
        return Err(AppError::Validation(
            "Dropoff time must be after pickup time".to_string(),
        ));
    }
    if dropoff_at - pickup_at > chrono::Duration::hours(MAX_TRIP_HOURS) {
        return Err(AppError::Validation(format!(
            "A trip may last at most {MAX_TRIP_HOURS} hours"
        )));
    }
    Ok(())
}

fn validate_schedule(
    pickup_at: DateTime<Utc>,
    dropoff_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AppResult<()> {
    validate_window(pickup_at, dropoff_at)?;
    if pickup_at < now {
        return Err(AppError::Validation(
            "Cannot book a pickup in the past".to_string(),
        ));
    }
    Ok(())
}

fn duration_hours(pickup_at: DateTime<Utc>, dropoff_at: DateTime<Utc>) -> Decimal {
    let seconds = (dropoff_at - pickup_at).num_seconds().max(0);
    round_money(Decimal::from(seconds) / Decimal::from(3600))
}

// ============ Create ============

/// Reserve a driver for a window and price it with the rule currently in force.
pub async fn create(
    db: &DatabaseConnection,
    peak: &PeakWindowConfig,
    req: NewBooking,
) -> AppResult<booking::Model> {
    let now = Utc::now();
    let req = req.validate(now)?;

    let txn = db.begin().await?;

    let rider = user::Entity::find_by_id(req.rider_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Rider not found".to_string()))?;
    if rider.role != UserRole::Rider {
        return Err(AppError::Validation("User is not a rider".to_string()));
    }

    let driver = availability::lock_driver(&txn, req.driver_id).await?;

    if driver.operational_status != OperationalStatus::Available {
        return Err(AppError::Validation(
            "Driver is not available for bookings".to_string(),
        ));
    }
    if req.passenger_count > driver.capacity {
        return Err(AppError::Validation(format!(
            "Vehicle seats at most {} passengers",
            driver.capacity
        )));
    }

    availability::ensure_available(&txn, driver.id, req.pickup_at, req.dropoff_at, None).await?;

    let trip = TripMetrics::from_schedule(req.pickup_at, req.dropoff_at, req.distance_km);
    let fare = pricing::quote(&txn, driver.vehicle_class, &trip, peak).await?;

    let new_booking = booking::ActiveModel {
        id: Set(Uuid::new_v4()),
        rider_id: Set(rider.id),
        driver_id: Set(driver.id),
        passenger_count: Set(req.passenger_count),
        pickup_at: Set(req.pickup_at),
        dropoff_at: Set(req.dropoff_at),
        pickup_location: Set(req.pickup_location.trim().to_string()),
        dropoff_location: Set(req.dropoff_location.trim().to_string()),
        distance_km: Set(trip.distance_km),
        total_cost: Set(fare.total),
        duration_hours: Set(duration_hours(req.pickup_at, req.dropoff_at)),
        status: Set(BookingStatus::Pending),
        payment_status: Set(PaymentStatus::Unpaid),
        notes: Set(req.notes.filter(|n| !n.trim().is_empty())),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let booking = new_booking.insert(&txn).await?;
    txn.commit().await?;

    tracing::info!(
        booking_id = %booking.id,
        driver_id = %booking.driver_id,
        rider_id = %booking.rider_id,
        total_cost = %booking.total_cost,
        peak = fare.peak,
        "Booking created"
    );

    Ok(booking)
}

// ============ Reads ============

pub async fn get<C: ConnectionTrait>(db: &C, booking_id: Uuid) -> AppResult<booking::Model> {
    booking::Entity::find_by_id(booking_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}

pub async fn list_by_driver<C: ConnectionTrait>(
    db: &C,
    driver_id: Uuid,
) -> AppResult<Vec<booking::Model>> {
    Ok(booking::Entity::find()
        .filter(booking::Column::DriverId.eq(driver_id))
        .order_by_desc(booking::Column::PickupAt)
        .all(db)
        .await?)
}

pub async fn list_by_rider<C: ConnectionTrait>(
    db: &C,
    rider_id: Uuid,
) -> AppResult<Vec<booking::Model>> {
    Ok(booking::Entity::find()
        .filter(booking::Column::RiderId.eq(rider_id))
        .order_by_desc(booking::Column::PickupAt)
        .all(db)
        .await?)
}

/// Reporting filters. Dates are inclusive and match on the pickup day (UTC).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub driver_id: Option<Uuid>,
    pub rider_id: Option<Uuid>,
    pub driver_name: Option<String>,
    pub rider_name: Option<String>,
}

/// A booking with the display names reporting views need.
#[derive(Debug, Clone, Serialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: booking::Model,
    pub rider_name: String,
    pub driver_name: String,
    pub vehicle_class: Option<VehicleClass>,
    pub plate: String,
}

pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::default()).and_utc()
}

fn name_matches(name: &str, pattern: &Option<String>) -> bool {
    match pattern.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => name.to_lowercase().contains(&p.to_lowercase()),
        _ => true,
    }
}

/// Filtered booking list, newest pickup first.
pub async fn list<C: ConnectionTrait>(db: &C, filter: &BookingFilter) -> AppResult<Vec<BookingView>> {
    let mut query = booking::Entity::find();

    if let Some(status) = filter.status {
        query = query.filter(booking::Column::Status.eq(status));
    }
    if let Some(driver_id) = filter.driver_id {
        query = query.filter(booking::Column::DriverId.eq(driver_id));
    }
    if let Some(rider_id) = filter.rider_id {
        query = query.filter(booking::Column::RiderId.eq(rider_id));
    }
    if let Some(from) = filter.from {
        query = query.filter(booking::Column::PickupAt.gte(day_start(from)));
    }
    if let Some(to) = filter.to {
        let end = to
            .checked_add_days(Days::new(1))
            .ok_or_else(|| AppError::Validation("Date range end is out of range".to_string()))?;
        query = query.filter(booking::Column::PickupAt.lt(day_start(end)));
    }

    let bookings = query
        .order_by_desc(booking::Column::PickupAt)
        .all(db)
        .await?;

    let views = with_names(db, bookings).await?;

    Ok(views
        .into_iter()
        .filter(|v| name_matches(&v.driver_name, &filter.driver_name))
        .filter(|v| name_matches(&v.rider_name, &filter.rider_name))
        .collect())
}

/// Attach rider and driver display names.
pub async fn with_names<C: ConnectionTrait>(
    db: &C,
    bookings: Vec<booking::Model>,
) -> AppResult<Vec<BookingView>> {
    let driver_ids: Vec<Uuid> = bookings.iter().map(|b| b.driver_id).collect();
    let drivers: HashMap<Uuid, driver::Model> = driver::Entity::find()
        .filter(driver::Column::Id.is_in(driver_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|d| (d.id, d))
        .collect();

    let mut user_ids: Vec<Uuid> = bookings.iter().map(|b| b.rider_id).collect();
    user_ids.extend(drivers.values().map(|d| d.owner_user_id));
    let users: HashMap<Uuid, user::Model> = user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    Ok(bookings
        .into_iter()
        .map(|b| {
            let driver = drivers.get(&b.driver_id);
            let driver_name = driver
                .and_then(|d| users.get(&d.owner_user_id))
                .map(|u| u.name.clone())
                .unwrap_or_default();
            BookingView {
                rider_name: users.get(&b.rider_id).map(|u| u.name.clone()).unwrap_or_default(),
                driver_name,
                vehicle_class: driver.map(|d| d.vehicle_class),
                plate: driver.map(|d| d.plate.clone()).unwrap_or_default(),
                booking: b,
            }
        })
        .collect())
}

// ============ Lifecycle ============

/// Apply a lifecycle transition as a single conditional update.
///
/// The row only changes if its current status is an allowed source. When
/// nothing changed, the current status decides between `NotFound`, an
/// idempotent no-op, and `InvalidTransition`.
pub async fn transition<C: ConnectionTrait>(
    db: &C,
    booking_id: Uuid,
    transition: Transition,
) -> AppResult<booking::Model> {
    let target = transition.target();

    let result = booking::Entity::update_many()
        .col_expr(booking::Column::Status, Expr::value(target.to_value()))
        .col_expr(booking::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(booking::Column::Id.eq(booking_id))
        .filter(booking::Column::Status.is_in(transition.sources().iter().copied()))
        .exec(db)
        .await?;

    let current = get(db, booking_id).await?;

    if result.rows_affected == 0 {
        match transition.resolve(current.status)? {
            Outcome::Unchanged => {
                tracing::debug!(%booking_id, status = %current.status, "Transition already applied");
            }
            // The status moved between our update and read
            Outcome::Apply => {
                return Err(AppError::Conflict(
                    "Booking was modified concurrently, retry".to_string(),
                ));
            }
        }
    } else {
        tracing::info!(%booking_id, status = %target, "Booking status changed");
    }

    Ok(current)
}

pub async fn confirm<C: ConnectionTrait>(db: &C, booking_id: Uuid) -> AppResult<booking::Model> {
    transition(db, booking_id, Transition::Confirm).await
}

pub async fn complete<C: ConnectionTrait>(db: &C, booking_id: Uuid) -> AppResult<booking::Model> {
    transition(db, booking_id, Transition::Complete).await
}

pub async fn cancel<C: ConnectionTrait>(db: &C, booking_id: Uuid) -> AppResult<booking::Model> {
    transition(db, booking_id, Transition::Cancel).await
}

/// Permanently remove a booking and its rating.
pub async fn delete(db: &DatabaseConnection, booking_id: Uuid) -> AppResult<()> {
    let txn = db.begin().await?;

    booking::Entity::find_by_id(booking_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    let ratings = rating::Entity::delete_many()
        .filter(rating::Column::BookingId.eq(booking_id))
        .exec(&txn)
        .await?;

    let result = booking::Entity::delete_by_id(booking_id).exec(&txn).await?;

    // Lost a race with another delete of the same booking
    if result.rows_affected == 0 {
        txn.rollback().await?;
        return Err(AppError::NotFound("Booking not found".to_string()));
    }

    txn.commit().await?;

    tracing::info!(
        %booking_id,
        ratings_removed = ratings.rows_affected,
        "Booking deleted"
    );
    Ok(())
}

// ============ Administrative edits ============

/// Move an active booking to a new window and price it with the rule now in force.
pub async fn reschedule(
    db: &DatabaseConnection,
    peak: &PeakWindowConfig,
    booking_id: Uuid,
    pickup_at: DateTime<Utc>,
    dropoff_at: DateTime<Utc>,
) -> AppResult<booking::Model> {
    let now = Utc::now();
    validate_schedule(pickup_at, dropoff_at, now)?;

    let txn = db.begin().await?;

    let existing = get(&txn, booking_id).await?;
    if lifecycle::is_terminal(existing.status) {
        return Err(AppError::Validation(format!(
            "Cannot reschedule a {} booking",
            existing.status
        )));
    }

    let driver = availability::lock_driver(&txn, existing.driver_id).await?;
    availability::ensure_available(&txn, driver.id, pickup_at, dropoff_at, Some(booking_id)).await?;

    let trip = TripMetrics::from_schedule(pickup_at, dropoff_at, Some(existing.distance_km));
    let fare = pricing::quote(&txn, driver.vehicle_class, &trip, peak).await?;

    let result = booking::Entity::update_many()
        .col_expr(booking::Column::PickupAt, Expr::value(pickup_at))
        .col_expr(booking::Column::DropoffAt, Expr::value(dropoff_at))
        .col_expr(
            booking::Column::DurationHours,
            Expr::value(duration_hours(pickup_at, dropoff_at)),
        )
        .col_expr(booking::Column::TotalCost, Expr::value(fare.total))
        .col_expr(booking::Column::UpdatedAt, Expr::value(now))
        .filter(booking::Column::Id.eq(booking_id))
        .filter(booking::Column::Status.is_in(BookingStatus::ACTIVE))
        .exec(&txn)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::Conflict(
            "Booking was modified concurrently, retry".to_string(),
        ));
    }

    let updated = get(&txn, booking_id).await?;
    txn.commit().await?;

    tracing::info!(
        %booking_id,
        previous_cost = %existing.total_cost,
        total_cost = %updated.total_cost,
        "Booking rescheduled"
    );
    Ok(updated)
}

/// Administrative status override, outside the normal lifecycle.
///
/// Allows any move, including out of terminal states. Re-activating a booking
/// still has to fit the driver's schedule.
pub async fn override_status(
    db: &DatabaseConnection,
    booking_id: Uuid,
    status: BookingStatus,
) -> AppResult<booking::Model> {
    let txn = db.begin().await?;

    let existing = get(&txn, booking_id).await?;
    if existing.status == status {
        return Ok(existing);
    }

    if status.is_active() && !existing.status.is_active() {
        availability::lock_driver(&txn, existing.driver_id).await?;
        availability::ensure_available(
            &txn,
            existing.driver_id,
            existing.pickup_at,
            existing.dropoff_at,
            Some(booking_id),
        )
        .await?;
    }

    let previous = existing.status;
    let mut active: booking::ActiveModel = existing.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    tracing::warn!(%booking_id, from = %previous, to = %status, "Booking status overridden by admin");
    Ok(updated)
}

pub async fn set_payment_status<C: ConnectionTrait>(
    db: &C,
    booking_id: Uuid,
    payment_status: PaymentStatus,
) -> AppResult<booking::Model> {
    let existing = get(db, booking_id).await?;

    let mut active: booking::ActiveModel = existing.into();
    active.payment_status = Set(payment_status);
    active.updated_at = Set(Utc::now());

    Ok(active.update(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn request(pickup_at: DateTime<Utc>, dropoff_at: DateTime<Utc>) -> NewBooking {
        NewBooking {
            rider_id: Uuid::new_v4(),
            driver_id: Uuid::new_v4(),
            passenger_count: 2,
            pickup_at,
            dropoff_at,
            pickup_location: "Central Station".into(),
            dropoff_location: "Airport".into(),
            distance_km: None,
            notes: None,
        }
    }

    #[test]
    fn dropoff_must_follow_pickup() {
        let now = Utc::now();
        let pickup = now + Duration::hours(2);
        assert!(matches!(
            request(pickup, pickup).validate(now),
            Err(AppError::Validation(_))
        ));
        assert!(request(pickup, pickup - Duration::minutes(1)).validate(now).is_err());
        assert!(request(pickup, pickup + Duration::minutes(1)).validate(now).is_ok());
    }

    #[test]
    fn past_pickups_are_rejected() {
        let now = Utc::now();
        let req = request(now - Duration::hours(1), now + Duration::hours(1));
        assert!(matches!(req.validate(now), Err(AppError::Validation(_))));
    }

    #[test]
    fn passenger_count_must_be_positive() {
        let now = Utc::now();
        let mut req = request(now + Duration::hours(1), now + Duration::hours(2));
        req.passenger_count = 0;
        assert!(req.validate(now).is_err());
    }

    #[test]
    fn blank_locations_are_rejected() {
        let now = Utc::now();
        let mut req = request(now + Duration::hours(1), now + Duration::hours(2));
        req.dropoff_location = "   ".into();
        assert!(req.validate(now).is_err());
    }

    #[test]
    fn distance_is_rounded_before_pricing() {
        let now = Utc::now();
        let mut req = request(now + Duration::hours(1), now + Duration::hours(2));
        req.distance_km = Some("5.125".parse().unwrap());
        let req = req.validate(now).unwrap();
        assert_eq!(req.distance_km, Some("5.13".parse().unwrap()));
    }

    #[test]
    fn oversized_distance_is_rejected() {
        let now = Utc::now();
        let mut req = request(now + Duration::hours(1), now + Duration::hours(2));
        req.distance_km = Some(Decimal::MAX);
        assert!(matches!(req.validate(now), Err(AppError::Validation(_))));
    }

    #[test]
    fn trips_longer_than_a_week_are_rejected() {
        let now = Utc::now();
        let pickup = now + Duration::hours(1);
        let week = request(pickup, pickup + Duration::hours(MAX_TRIP_HOURS));
        assert!(week.validate(now).is_ok());
        let longer = request(pickup, pickup + Duration::hours(MAX_TRIP_HOURS) + Duration::minutes(1));
        assert!(matches!(longer.validate(now), Err(AppError::Validation(_))));
    }

    #[test]
    fn duration_hours_rounds_to_cents() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(duration_hours(start, start + Duration::minutes(90)), Decimal::new(150, 2));
        assert_eq!(duration_hours(start, start + Duration::minutes(20)), Decimal::new(33, 2));
    }

    #[test]
    fn name_filter_is_case_insensitive_substring() {
        assert!(name_matches("Ada Lovelace", &Some("love".into())));
        assert!(name_matches("Ada Lovelace", &None));
        assert!(name_matches("Ada Lovelace", &Some("  ".into())));
        assert!(!name_matches("Ada Lovelace", &Some("grace".into())));
    }
}
