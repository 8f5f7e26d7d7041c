//! Pricing catalog, peak window policy and the fare formula.
//!
//! There is exactly one fare formula: base fare plus distance and time charges,
//! scaled by the peak multiplier when the pickup falls in a peak window, floored
//! at the minimum fare. Callers that do not know the distance yet price it as 0 km.

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ConnectionTrait, EntityTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};

use crate::entities::pricing_rule::{self, VehicleClass};
use crate::error::{AppError, AppResult};

// ============ Peak windows ============

/// Half-open time-of-day interval `[start, end)`.
///
/// `start == end` is empty; `start > end` wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl PeakWindow {
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start == self.end {
            false
        } else if self.start < self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakWindowConfig {
    pub morning: Option<PeakWindow>,
    pub evening: Option<PeakWindow>,
    /// Offset used to read the local time-of-day of a timestamp
    pub utc_offset: FixedOffset,
}

impl PeakWindowConfig {
    /// True when the time-of-day of `at` falls inside either window. The date is ignored.
    pub fn is_peak(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.utc_offset).time();
        [self.morning, self.evening]
            .iter()
            .flatten()
            .any(|window| window.contains(local))
    }
}

impl Default for PeakWindowConfig {
    fn default() -> Self {
        let hm = |h: u32| NaiveTime::from_hms_opt(h, 0, 0).unwrap_or_default();
        Self {
            morning: Some(PeakWindow { start: hm(7), end: hm(9) }),
            evening: Some(PeakWindow { start: hm(17), end: hm(19) }),
            utc_offset: Utc.fix(),
        }
    }
}

// ============ Fare calculation ============

/// Trip metrics the fare is computed from. Distance is an opaque caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripMetrics {
    pub distance_km: Decimal,
    pub duration_minutes: Decimal,
    pub pickup_at: DateTime<Utc>,
}

impl TripMetrics {
    /// Derive the duration from the scheduled window; unknown distance counts as 0 km.
    pub fn from_schedule(
        pickup_at: DateTime<Utc>,
        dropoff_at: DateTime<Utc>,
        distance_km: Option<Decimal>,
    ) -> Self {
        let seconds = (dropoff_at - pickup_at).num_seconds().max(0);
        Self {
            distance_km: distance_km.unwrap_or(Decimal::ZERO),
            duration_minutes: Decimal::from(seconds) / Decimal::from(60),
            pickup_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FareQuote {
    pub vehicle_class: VehicleClass,
    pub distance_km: Decimal,
    pub duration_minutes: Decimal,
    pub peak: bool,
    pub multiplier: Decimal,
    pub minimum_applied: bool,
    pub total: Decimal,
}

/// Round half-up to cents. Applied once, to the final amount.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Largest distance a booking records, `decimal(10,2)`.
pub fn max_distance_km() -> Decimal {
    Decimal::new(9_999_999_999, 2)
}

/// Largest money amount a rule or booking stores, `decimal(12,2)`.
pub fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

fn max_multiplier() -> Decimal {
    Decimal::new(999_999, 2)
}

/// Bring a caller-supplied distance to the stored precision (half-up, 2 dp).
pub fn normalize_distance(distance_km: Option<Decimal>) -> AppResult<Option<Decimal>> {
    let Some(distance) = distance_km else {
        return Ok(None);
    };
    if distance < Decimal::ZERO {
        return Err(AppError::Validation("Distance must not be negative".to_string()));
    }
    let distance = round_money(distance);
    if distance > max_distance_km() {
        return Err(AppError::Validation(format!(
            "Distance must not exceed {} km",
            max_distance_km()
        )));
    }
    Ok(Some(distance))
}

fn fare_too_large() -> AppError {
    AppError::Validation("Fare exceeds the largest amount a booking can hold".to_string())
}

/// Apply the fare formula to a rule snapshot.
pub fn compute_fare(
    rule: &pricing_rule::Model,
    trip: &TripMetrics,
    peak_config: &PeakWindowConfig,
) -> AppResult<FareQuote> {
    let distance_charge = trip
        .distance_km
        .checked_mul(rule.price_per_km)
        .ok_or_else(fare_too_large)?;
    let time_charge = trip
        .duration_minutes
        .checked_mul(rule.price_per_minute)
        .ok_or_else(fare_too_large)?;
    let raw = rule
        .base_fare
        .checked_add(distance_charge)
        .and_then(|sum| sum.checked_add(time_charge))
        .ok_or_else(fare_too_large)?;

    let peak = peak_config.is_peak(trip.pickup_at);
    let multiplier = if peak { rule.peak_multiplier } else { Decimal::ONE };
    let scaled = raw.checked_mul(multiplier).ok_or_else(fare_too_large)?;
    let minimum_applied = scaled < rule.minimum_fare;

    let total = round_money(scaled.max(rule.minimum_fare));
    if total > max_amount() {
        return Err(fare_too_large());
    }

    Ok(FareQuote {
        vehicle_class: rule.vehicle_class,
        distance_km: trip.distance_km,
        duration_minutes: round_money(trip.duration_minutes),
        peak,
        multiplier,
        minimum_applied,
        total,
    })
}

// ============ Catalog ============

/// Fetch the rule for a class. A missing rule is an error, never a free ride.
pub async fn lookup_rule<C: ConnectionTrait>(
    db: &C,
    vehicle_class: VehicleClass,
) -> AppResult<pricing_rule::Model> {
    pricing_rule::Entity::find_by_id(vehicle_class)
        .one(db)
        .await?
        .ok_or(AppError::RuleNotFound(vehicle_class))
}

/// Look up the class rule and price the trip against it.
pub async fn quote<C: ConnectionTrait>(
    db: &C,
    vehicle_class: VehicleClass,
    trip: &TripMetrics,
    peak_config: &PeakWindowConfig,
) -> AppResult<FareQuote> {
    let rule = lookup_rule(db, vehicle_class).await?;
    compute_fare(&rule, trip, peak_config)
}

pub async fn list_rules<C: ConnectionTrait>(db: &C) -> AppResult<Vec<pricing_rule::Model>> {
    Ok(pricing_rule::Entity::find()
        .order_by_asc(pricing_rule::Column::VehicleClass)
        .all(db)
        .await?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingRuleInput {
    pub base_fare: Decimal,
    pub price_per_km: Decimal,
    pub price_per_minute: Decimal,
    pub peak_multiplier: Decimal,
    pub minimum_fare: Decimal,
}

impl PricingRuleInput {
    fn validate(&self) -> AppResult<()> {
        let fields = [
            ("base_fare", self.base_fare),
            ("price_per_km", self.price_per_km),
            ("price_per_minute", self.price_per_minute),
            ("peak_multiplier", self.peak_multiplier),
            ("minimum_fare", self.minimum_fare),
        ];
        for (name, value) in fields {
            if value < Decimal::ZERO {
                return Err(AppError::Validation(format!("{name} must not be negative")));
            }
            if value > max_amount() {
                return Err(AppError::Validation(format!(
                    "{name} must not exceed {}",
                    max_amount()
                )));
            }
        }
        if self.peak_multiplier > max_multiplier() {
            return Err(AppError::Validation(format!(
                "peak_multiplier must not exceed {}",
                max_multiplier()
            )));
        }
        Ok(())
    }
}

/// Insert or replace the rule for a vehicle class. Existing bookings keep their price.
pub async fn upsert_rule<C: ConnectionTrait>(
    db: &C,
    vehicle_class: VehicleClass,
    input: PricingRuleInput,
) -> AppResult<pricing_rule::Model> {
    input.validate()?;

    let rule = pricing_rule::ActiveModel {
        vehicle_class: Set(vehicle_class),
        base_fare: Set(input.base_fare),
        price_per_km: Set(input.price_per_km),
        price_per_minute: Set(input.price_per_minute),
        peak_multiplier: Set(input.peak_multiplier),
        minimum_fare: Set(input.minimum_fare),
        updated_at: Set(Utc::now()),
    };

    pricing_rule::Entity::insert(rule)
        .on_conflict(
            OnConflict::column(pricing_rule::Column::VehicleClass)
                .update_columns([
                    pricing_rule::Column::BaseFare,
                    pricing_rule::Column::PricePerKm,
                    pricing_rule::Column::PricePerMinute,
                    pricing_rule::Column::PeakMultiplier,
                    pricing_rule::Column::MinimumFare,
                    pricing_rule::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    tracing::info!(%vehicle_class, "Pricing rule upserted");
    lookup_rule(db, vehicle_class).await
}

/// Seed a starter rule for every class that has none. Existing rules are left alone.
pub async fn seed_default_rules<C: ConnectionTrait>(db: &C) -> AppResult<()> {
    let cents = |c: i64| Decimal::new(c, 2);
    let defaults = [
        (VehicleClass::Sedan, 500, 150, 25, 125, 800),
        (VehicleClass::Suv, 700, 200, 30, 120, 1000),
        (VehicleClass::Van, 900, 250, 35, 120, 1400),
        (VehicleClass::Minibus, 1200, 300, 40, 115, 2000),
    ];

    for (class, base, per_km, per_min, peak, minimum) in defaults {
        let rule = pricing_rule::ActiveModel {
            vehicle_class: Set(class),
            base_fare: Set(cents(base)),
            price_per_km: Set(cents(per_km)),
            price_per_minute: Set(cents(per_min)),
            peak_multiplier: Set(cents(peak)),
            minimum_fare: Set(cents(minimum)),
            updated_at: Set(Utc::now()),
        };
        let inserted = pricing_rule::Entity::insert(rule)
            .on_conflict(
                OnConflict::column(pricing_rule::Column::VehicleClass)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
        if inserted > 0 {
            tracing::info!(vehicle_class = %class, "Seeded default pricing rule");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn money(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn suv_rule() -> pricing_rule::Model {
        pricing_rule::Model {
            vehicle_class: VehicleClass::Suv,
            base_fare: money("7.00"),
            price_per_km: money("2.00"),
            price_per_minute: money("0.30"),
            peak_multiplier: money("1.20"),
            minimum_fare: money("10.00"),
            updated_at: Utc::now(),
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, h, m, 0).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn trip(km: &str, minutes: &str, pickup_at: DateTime<Utc>) -> TripMetrics {
        TripMetrics {
            distance_km: money(km),
            duration_minutes: money(minutes),
            pickup_at,
        }
    }

    #[test]
    fn off_peak_suv_trip() {
        let quote = compute_fare(&suv_rule(), &trip("5", "20", at(11, 0)), &PeakWindowConfig::default()).unwrap();
        assert!(!quote.peak);
        assert_eq!(quote.total, money("23.00"));
    }

    #[test]
    fn peak_suv_trip_applies_multiplier() {
        let quote = compute_fare(&suv_rule(), &trip("5", "20", at(8, 15)), &PeakWindowConfig::default()).unwrap();
        assert!(quote.peak);
        assert_eq!(quote.multiplier, money("1.20"));
        assert_eq!(quote.total, money("27.60"));
    }

    #[test]
    fn minimum_fare_is_a_floor_after_multiplier() {
        let quote = compute_fare(&suv_rule(), &trip("0", "1", at(8, 0)), &PeakWindowConfig::default()).unwrap();
        // (7.00 + 0.30) * 1.20 = 8.76 < 10.00
        assert!(quote.minimum_applied);
        assert_eq!(quote.total, money("10.00"));
    }

    #[test]
    fn cost_never_below_minimum() {
        let rule = suv_rule();
        for km in ["0", "0.5", "3", "12.75"] {
            for minutes in ["0", "1", "7.5", "90"] {
                let q = compute_fare(&rule, &trip(km, minutes, at(18, 30)), &PeakWindowConfig::default()).unwrap();
                assert!(q.total >= rule.minimum_fare);
            }
        }
    }

    #[test]
    fn rounds_half_up_only_at_the_end() {
        let mut rule = suv_rule();
        rule.minimum_fare = Decimal::ZERO;
        rule.base_fare = Decimal::ZERO;
        rule.price_per_km = money("0.333");
        rule.price_per_minute = Decimal::ZERO;
        // 3 * 0.333 = 0.999 -> 1.00; rounding each term first would give 0.99
        let q = compute_fare(&rule, &trip("3", "0", at(12, 0)), &PeakWindowConfig::default()).unwrap();
        assert_eq!(q.total, money("1.00"));

        rule.price_per_km = money("0.125");
        let q = compute_fare(&rule, &trip("1", "0", at(12, 0)), &PeakWindowConfig::default()).unwrap();
        assert_eq!(q.total, money("0.13"));
    }

    #[test]
    fn identical_inputs_give_identical_fares() {
        let rule = suv_rule();
        let t = trip("8.4", "33", at(17, 59));
        let first = compute_fare(&rule, &t, &PeakWindowConfig::default()).unwrap();
        let second = compute_fare(&rule, &t, &PeakWindowConfig::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn duration_is_derived_from_schedule() {
        let t = TripMetrics::from_schedule(at(10, 0), at(10, 20), None);
        assert_eq!(t.distance_km, Decimal::ZERO);
        assert_eq!(t.duration_minutes, money("20"));
    }

    #[test]
    fn peak_windows_are_half_open() {
        let config = PeakWindowConfig::default();
        assert!(config.is_peak(at(7, 0)));
        assert!(config.is_peak(at(8, 59)));
        assert!(!config.is_peak(at(9, 0)));
        assert!(!config.is_peak(at(6, 59)));
        assert!(config.is_peak(at(17, 0)));
        assert!(!config.is_peak(at(19, 0)));
    }

    #[test]
    fn peak_ignores_the_date() {
        let config = PeakWindowConfig::default();
        let other_day = Utc.with_ymd_and_hms(2031, 12, 1, 8, 0, 0).unwrap();
        assert!(config.is_peak(other_day));
    }

    #[test]
    fn empty_window_never_matches() {
        let config = PeakWindowConfig {
            morning: Some(PeakWindow { start: hm(8, 0), end: hm(8, 0) }),
            evening: None,
            ..PeakWindowConfig::default()
        };
        assert!(!config.is_peak(at(8, 0)));
    }

    #[test]
    fn overlapping_windows_compose_with_or() {
        let config = PeakWindowConfig {
            morning: Some(PeakWindow { start: hm(7, 0), end: hm(10, 0) }),
            evening: Some(PeakWindow { start: hm(9, 0), end: hm(12, 0) }),
            ..PeakWindowConfig::default()
        };
        assert!(config.is_peak(at(9, 30)));
        assert!(config.is_peak(at(11, 0)));
        assert!(!config.is_peak(at(12, 0)));
    }

    #[test]
    fn window_can_wrap_midnight() {
        let window = PeakWindow { start: hm(22, 0), end: hm(2, 0) };
        assert!(window.contains(hm(23, 30)));
        assert!(window.contains(hm(1, 0)));
        assert!(!window.contains(hm(2, 0)));
        assert!(!window.contains(hm(12, 0)));
    }

    #[test]
    fn offset_shifts_local_time_of_day() {
        let config = PeakWindowConfig {
            utc_offset: FixedOffset::east_opt(3 * 3600).unwrap(),
            ..PeakWindowConfig::default()
        };
        // 05:00 UTC is 08:00 at +03:00
        assert!(config.is_peak(at(5, 0)));
        assert!(!config.is_peak(at(8, 0)));
    }

    #[test]
    fn huge_distance_is_rejected_instead_of_overflowing() {
        let t = TripMetrics::from_schedule(at(10, 0), at(10, 20), Some(Decimal::MAX));
        let result = compute_fare(&suv_rule(), &t, &PeakWindowConfig::default());
        assert!(matches!(result, Err(AppError::Validation(_))));

        // Fits in a Decimal but not in a booking's total
        let t = trip("9999999999", "20", at(11, 0));
        let result = compute_fare(&suv_rule(), &t, &PeakWindowConfig::default());
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn distance_is_bounded_and_rounded_to_cents() {
        assert_eq!(normalize_distance(None).unwrap(), None);
        assert_eq!(normalize_distance(Some(money("5.125"))).unwrap(), Some(money("5.13")));
        assert_eq!(
            normalize_distance(Some(max_distance_km())).unwrap(),
            Some(max_distance_km())
        );
        assert!(matches!(
            normalize_distance(Some(money("-0.01"))),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            normalize_distance(Some(Decimal::MAX)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            normalize_distance(Some(money("99999999.995"))),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn oversized_prices_are_rejected() {
        let input = PricingRuleInput {
            base_fare: Decimal::ONE,
            price_per_km: Decimal::MAX,
            price_per_minute: Decimal::ONE,
            peak_multiplier: Decimal::ONE,
            minimum_fare: Decimal::ZERO,
        };
        assert!(matches!(input.validate(), Err(AppError::Validation(_))));

        let input = PricingRuleInput {
            price_per_km: Decimal::ONE,
            peak_multiplier: money("10000"),
            ..input
        };
        assert!(matches!(input.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn negative_prices_are_rejected() {
        let input = PricingRuleInput {
            base_fare: money("-1.00"),
            price_per_km: Decimal::ONE,
            price_per_minute: Decimal::ONE,
            peak_multiplier: Decimal::ONE,
            minimum_fare: Decimal::ZERO,
        };
        assert!(matches!(input.validate(), Err(AppError::Validation(_))));
    }
}
