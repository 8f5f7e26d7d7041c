//! Driver schedule conflicts.
//!
//! Two reservations `[a, b)` and `[c, d)` conflict iff `a < d && c < b`. Only
//! pending and confirmed bookings occupy a driver's schedule.

use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Select};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::driver;
use crate::error::{AppError, AppResult};

pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// First active booking in `bookings` that overlaps `[pickup_at, dropoff_at)`.
pub fn find_conflict<'a>(
    bookings: &'a [booking::Model],
    pickup_at: DateTime<Utc>,
    dropoff_at: DateTime<Utc>,
    exclude_booking_id: Option<Uuid>,
) -> Option<&'a booking::Model> {
    bookings.iter().find(|b| {
        b.status.is_active()
            && Some(b.id) != exclude_booking_id
            && overlaps(b.pickup_at, b.dropoff_at, pickup_at, dropoff_at)
    })
}

async fn active_bookings<C: ConnectionTrait>(
    db: &C,
    driver_id: Uuid,
) -> AppResult<Vec<booking::Model>> {
    Ok(booking::Entity::find()
        .filter(booking::Column::DriverId.eq(driver_id))
        .filter(booking::Column::Status.is_in(BookingStatus::ACTIVE))
        .all(db)
        .await?)
}

/// Whether the driver is free for `[pickup_at, dropoff_at)`.
///
/// A bare read: on its own it only answers "right now". Writers go through
/// [`lock_driver`] + [`ensure_available`] inside their transaction instead.
pub async fn is_available<C: ConnectionTrait>(
    db: &C,
    driver_id: Uuid,
    pickup_at: DateTime<Utc>,
    dropoff_at: DateTime<Utc>,
    exclude_booking_id: Option<Uuid>,
) -> AppResult<bool> {
    let bookings = active_bookings(db, driver_id).await?;
    Ok(find_conflict(&bookings, pickup_at, dropoff_at, exclude_booking_id).is_none())
}

/// Take an exclusive row lock on the driver for the rest of the transaction.
///
/// Every writer that can make a booking active locks the driver first, so
/// check-then-write sequences for the same driver are serialized.
pub async fn lock_driver<C: ConnectionTrait>(txn: &C, driver_id: Uuid) -> AppResult<driver::Model> {
    driver_lock_query(driver_id)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Driver not found".to_string()))
}

/// `SELECT … FOR UPDATE` on the driver row. SQLite has no row locks and drops the clause.
fn driver_lock_query(driver_id: Uuid) -> Select<driver::Entity> {
    driver::Entity::find_by_id(driver_id).lock_exclusive()
}

/// Fail with `Conflict` when the window overlaps an active booking of the driver.
pub async fn ensure_available<C: ConnectionTrait>(
    txn: &C,
    driver_id: Uuid,
    pickup_at: DateTime<Utc>,
    dropoff_at: DateTime<Utc>,
    exclude_booking_id: Option<Uuid>,
) -> AppResult<()> {
    let bookings = active_bookings(txn, driver_id).await?;

    if let Some(existing) = find_conflict(&bookings, pickup_at, dropoff_at, exclude_booking_id) {
        tracing::warn!(
            %driver_id,
            conflicting_booking = %existing.id,
            requested_pickup = %pickup_at,
            requested_dropoff = %dropoff_at,
            "Driver already booked for requested window"
        );
        return Err(AppError::Conflict(format!(
            "Driver is already booked from {} to {}",
            existing.pickup_at, existing.dropoff_at
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use sea_orm::{DbBackend, QueryTrait};

    use crate::entities::booking::PaymentStatus;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap()
    }

    fn booking(from: DateTime<Utc>, to: DateTime<Utc>, status: BookingStatus) -> booking::Model {
        booking::Model {
            id: Uuid::new_v4(),
            rider_id: Uuid::new_v4(),
            driver_id: Uuid::new_v4(),
            passenger_count: 1,
            pickup_at: from,
            dropoff_at: to,
            pickup_location: "A".into(),
            dropoff_location: "B".into(),
            distance_km: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            duration_hours: Decimal::ONE,
            status,
            payment_status: PaymentStatus::Unpaid,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn contained_window_overlaps() {
        assert!(overlaps(at(10, 0), at(11, 0), at(10, 30), at(10, 45)));
    }

    #[test]
    fn back_to_back_windows_do_not_overlap() {
        assert!(!overlaps(at(10, 0), at(11, 0), at(11, 0), at(12, 0)));
        assert!(!overlaps(at(11, 0), at(12, 0), at(10, 0), at(11, 0)));
    }

    #[test]
    fn partial_overlap_either_side() {
        assert!(overlaps(at(10, 0), at(11, 0), at(9, 30), at(10, 1)));
        assert!(overlaps(at(10, 0), at(11, 0), at(10, 59), at(12, 0)));
    }

    #[test]
    fn overlap_is_symmetric() {
        let windows = [
            (at(8, 0), at(9, 0)),
            (at(8, 30), at(10, 0)),
            (at(9, 0), at(9, 15)),
            (at(7, 0), at(12, 0)),
        ];
        for (a, b) in windows {
            for (c, d) in windows {
                assert_eq!(overlaps(a, b, c, d), overlaps(c, d, a, b));
            }
        }
    }

    #[test]
    fn confirmed_booking_blocks_overlapping_request() {
        let existing = vec![booking(at(10, 0), at(11, 0), BookingStatus::Confirmed)];
        assert!(find_conflict(&existing, at(10, 30), at(10, 45), None).is_some());
        assert!(find_conflict(&existing, at(11, 0), at(12, 0), None).is_none());
    }

    #[test]
    fn finished_bookings_never_block() {
        let existing = vec![
            booking(at(10, 0), at(11, 0), BookingStatus::Cancelled),
            booking(at(10, 0), at(11, 0), BookingStatus::Completed),
        ];
        assert!(find_conflict(&existing, at(10, 0), at(11, 0), None).is_none());
    }

    #[test]
    fn excluded_booking_is_ignored() {
        let existing = vec![booking(at(10, 0), at(11, 0), BookingStatus::Pending)];
        let own_id = existing[0].id;
        assert!(find_conflict(&existing, at(10, 15), at(11, 15), Some(own_id)).is_none());
        assert!(find_conflict(&existing, at(10, 15), at(11, 15), Some(Uuid::new_v4())).is_some());
    }

    #[test]
    fn driver_lock_takes_a_row_lock_on_postgres() {
        let driver_id = Uuid::new_v4();
        let sql = driver_lock_query(driver_id).build(DbBackend::Postgres).to_string();
        assert!(sql.contains("FOR UPDATE"), "{sql}");
        assert!(sql.contains(&driver_id.to_string()), "{sql}");
    }
}
