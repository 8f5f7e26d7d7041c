use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::BookingStatus;
use crate::entities::rating;
use crate::error::{AppError, AppResult};
use crate::services::bookings;
use crate::services::pricing::round_money;

#[derive(Debug, Clone, Deserialize)]
pub struct NewRating {
    pub score: i16,
    pub review: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RatingSummary {
    pub average: Decimal,
    pub count: u64,
}

impl RatingSummary {
    /// Mean score rounded to cents; zero when there are no ratings.
    pub fn from_scores(scores: impl IntoIterator<Item = i16>) -> Self {
        let (sum, count) = scores
            .into_iter()
            .fold((0i64, 0u64), |(sum, count), s| (sum + i64::from(s), count + 1));

        if count == 0 {
            return Self::default();
        }

        Self {
            average: round_money(Decimal::from(sum) / Decimal::from(count)),
            count,
        }
    }
}

/// Rate a completed trip. Only the rider who booked it may rate, once.
pub async fn submit<C: ConnectionTrait>(
    db: &C,
    rider_id: Uuid,
    booking_id: Uuid,
    req: NewRating,
) -> AppResult<rating::Model> {
    if !(1..=5).contains(&req.score) {
        return Err(AppError::Validation(
            "Score must be between 1 and 5".to_string(),
        ));
    }

    let booking = bookings::get(db, booking_id).await?;

    if booking.rider_id != rider_id {
        return Err(AppError::Forbidden(
            "You can only rate your own bookings".to_string(),
        ));
    }
    if booking.status != BookingStatus::Completed {
        return Err(AppError::Validation(
            "Only completed bookings can be rated".to_string(),
        ));
    }

    let rating = rating::ActiveModel {
        id: Set(Uuid::new_v4()),
        booking_id: Set(booking.id),
        rider_id: Set(rider_id),
        driver_id: Set(booking.driver_id),
        score: Set(req.score),
        review: Set(req.review.filter(|r| !r.trim().is_empty())),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .map_err(|err| match AppError::from(err) {
        AppError::Conflict(_) => AppError::Conflict("Booking has already been rated".to_string()),
        other => other,
    })?;

    tracing::info!(%booking_id, driver_id = %rating.driver_id, score = rating.score, "Rating submitted");
    Ok(rating)
}

pub async fn for_booking<C: ConnectionTrait>(
    db: &C,
    booking_id: Uuid,
) -> AppResult<Option<rating::Model>> {
    Ok(rating::Entity::find()
        .filter(rating::Column::BookingId.eq(booking_id))
        .one(db)
        .await?)
}

pub async fn summary_for_driver<C: ConnectionTrait>(
    db: &C,
    driver_id: Uuid,
) -> AppResult<RatingSummary> {
    let ratings = rating::Entity::find()
        .filter(rating::Column::DriverId.eq(driver_id))
        .all(db)
        .await?;

    Ok(RatingSummary::from_scores(ratings.iter().map(|r| r.score)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_ratings_is_zero() {
        let summary = RatingSummary::from_scores(std::iter::empty::<i16>());
        assert_eq!(summary.average, Decimal::ZERO);
        assert_eq!(summary.count, 0);
    }

    #[test]
    fn average_rounds_to_two_places() {
        let summary = RatingSummary::from_scores([5, 4, 4]);
        assert_eq!(summary.average, Decimal::new(433, 2));
        assert_eq!(summary.count, 3);
    }
}
