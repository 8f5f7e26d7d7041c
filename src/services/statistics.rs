//! Read-only reporting over committed bookings.
//!
//! Money totals only ever include completed bookings. Empty inputs produce
//! zeroed results, never missing ones.

use std::collections::{BTreeMap, HashMap};

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::pricing_rule::VehicleClass;
use crate::entities::{driver, rating, user};
use crate::error::{AppError, AppResult};
use crate::services::bookings::{self, BookingFilter};
use crate::services::drivers;
use crate::services::ratings::RatingSummary;

const MAX_SERIES_DAYS: u64 = 366;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BookingStatistics {
    pub total: u64,
    pub pending: u64,
    pub confirmed: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub revenue: Decimal,
}

impl BookingStatistics {
    pub fn from_bookings<'a>(bookings: impl IntoIterator<Item = &'a booking::Model>) -> Self {
        bookings.into_iter().fold(Self::default(), |mut stats, b| {
            stats.total += 1;
            match b.status {
                BookingStatus::Pending => stats.pending += 1,
                BookingStatus::Confirmed => stats.confirmed += 1,
                BookingStatus::Completed => {
                    stats.completed += 1;
                    stats.revenue += b.total_cost;
                }
                BookingStatus::Cancelled => stats.cancelled += 1,
            }
            stats
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverStatistics {
    pub driver_id: Uuid,
    pub driver_name: String,
    pub plate: String,
    pub vehicle_class: VehicleClass,
    pub bookings: u64,
    pub completed: u64,
    pub earnings: Decimal,
    pub average_rating: Decimal,
    pub rating_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiderStatistics {
    pub rider_id: Uuid,
    pub bookings: u64,
    pub completed: u64,
    pub spend: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub bookings: u64,
    pub completed: u64,
    pub revenue: Decimal,
}

/// Per-status counts and revenue for the bookings matching `filter`.
pub async fn booking_statistics<C: ConnectionTrait>(
    db: &C,
    filter: &BookingFilter,
) -> AppResult<BookingStatistics> {
    let views = bookings::list(db, filter).await?;
    Ok(BookingStatistics::from_bookings(views.iter().map(|v| &v.booking)))
}

fn driver_totals(
    driver: &driver::Model,
    driver_name: String,
    bookings: &[&booking::Model],
    ratings: RatingSummary,
) -> DriverStatistics {
    let stats = BookingStatistics::from_bookings(bookings.iter().copied());
    DriverStatistics {
        driver_id: driver.id,
        driver_name,
        plate: driver.plate.clone(),
        vehicle_class: driver.vehicle_class,
        bookings: stats.total,
        completed: stats.completed,
        earnings: stats.revenue,
        average_rating: ratings.average,
        rating_count: ratings.count,
    }
}

pub async fn driver_statistics<C: ConnectionTrait>(
    db: &C,
    driver_id: Uuid,
) -> AppResult<DriverStatistics> {
    let driver = drivers::get(db, driver_id).await?;
    let owner = user::Entity::find_by_id(driver.owner_user_id).one(db).await?;

    let bookings = bookings::list_by_driver(db, driver_id).await?;
    let refs: Vec<&booking::Model> = bookings.iter().collect();
    let ratings = crate::services::ratings::summary_for_driver(db, driver_id).await?;

    Ok(driver_totals(
        &driver,
        owner.map(|u| u.name).unwrap_or_default(),
        &refs,
        ratings,
    ))
}

/// Totals for every driver, highest earnings first.
pub async fn driver_leaderboard<C: ConnectionTrait>(db: &C) -> AppResult<Vec<DriverStatistics>> {
    let drivers = driver::Entity::find().all(db).await?;
    let bookings = booking::Entity::find().all(db).await?;
    let ratings = rating::Entity::find().all(db).await?;
    let users: HashMap<Uuid, String> = user::Entity::find()
        .filter(user::Column::Id.is_in(drivers.iter().map(|d| d.owner_user_id)))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();

    let mut by_driver: HashMap<Uuid, Vec<&booking::Model>> = HashMap::new();
    for b in &bookings {
        by_driver.entry(b.driver_id).or_default().push(b);
    }

    let mut leaderboard: Vec<DriverStatistics> = drivers
        .iter()
        .map(|d| {
            let scores = ratings.iter().filter(|r| r.driver_id == d.id).map(|r| r.score);
            driver_totals(
                d,
                users.get(&d.owner_user_id).cloned().unwrap_or_default(),
                by_driver.get(&d.id).map(Vec::as_slice).unwrap_or_default(),
                RatingSummary::from_scores(scores),
            )
        })
        .collect();

    leaderboard.sort_by(|a, b| {
        b.earnings
            .cmp(&a.earnings)
            .then_with(|| b.completed.cmp(&a.completed))
            .then_with(|| a.plate.cmp(&b.plate))
    });

    Ok(leaderboard)
}

pub async fn rider_statistics<C: ConnectionTrait>(
    db: &C,
    rider_id: Uuid,
) -> AppResult<RiderStatistics> {
    let bookings = bookings::list_by_rider(db, rider_id).await?;
    let stats = BookingStatistics::from_bookings(&bookings);

    Ok(RiderStatistics {
        rider_id,
        bookings: stats.total,
        completed: stats.completed,
        spend: stats.revenue,
    })
}

/// Zero-filled daily buckets keyed by pickup date, `from` and `to` inclusive.
pub fn bucket_by_day(
    bookings: &[booking::Model],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<DailyPoint> {
    let mut days: BTreeMap<NaiveDate, DailyPoint> = from
        .iter_days()
        .take_while(|d| *d <= to)
        .map(|date| {
            (
                date,
                DailyPoint {
                    date,
                    bookings: 0,
                    completed: 0,
                    revenue: Decimal::ZERO,
                },
            )
        })
        .collect();

    for b in bookings {
        if let Some(point) = days.get_mut(&b.pickup_at.date_naive()) {
            point.bookings += 1;
            if b.status == BookingStatus::Completed {
                point.completed += 1;
                point.revenue += b.total_cost;
            }
        }
    }

    days.into_values().collect()
}

pub async fn daily_series<C: ConnectionTrait>(
    db: &C,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<Vec<DailyPoint>> {
    if to < from {
        return Err(AppError::Validation(
            "Range end must not be before its start".to_string(),
        ));
    }
    let limit = from
        .checked_add_days(Days::new(MAX_SERIES_DAYS))
        .ok_or_else(|| AppError::Validation("Date range is out of range".to_string()))?;
    if to >= limit {
        return Err(AppError::Validation(format!(
            "Date range is limited to {MAX_SERIES_DAYS} days"
        )));
    }

    let end = to
        .checked_add_days(Days::new(1))
        .ok_or_else(|| AppError::Validation("Date range is out of range".to_string()))?;
    let bookings = booking::Entity::find()
        .filter(booking::Column::PickupAt.gte(bookings::day_start(from)))
        .filter(booking::Column::PickupAt.lt(bookings::day_start(end)))
        .all(db)
        .await?;

    Ok(bucket_by_day(&bookings, from, to))
}
