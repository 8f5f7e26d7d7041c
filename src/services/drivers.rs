use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::booking;
use crate::entities::driver::{self, OperationalStatus};
use crate::entities::pricing_rule::VehicleClass;
use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NewDriver {
    pub owner_user_id: Uuid,
    pub license_number: String,
    pub plate: String,
    pub car_model: String,
    pub vehicle_class: VehicleClass,
    pub capacity: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDriver {
    pub license_number: Option<String>,
    pub plate: Option<String>,
    pub car_model: Option<String>,
    pub vehicle_class: Option<VehicleClass>,
    pub capacity: Option<i32>,
}

fn required_text(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn validate_capacity(capacity: i32) -> AppResult<()> {
    if capacity <= 0 {
        return Err(AppError::Validation(
            "Capacity must be at least 1".to_string(),
        ));
    }
    Ok(())
}

pub async fn get<C: ConnectionTrait>(db: &C, driver_id: Uuid) -> AppResult<driver::Model> {
    driver::Entity::find_by_id(driver_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Driver not found".to_string()))
}

pub async fn list<C: ConnectionTrait>(
    db: &C,
    status: Option<OperationalStatus>,
) -> AppResult<Vec<driver::Model>> {
    let mut query = driver::Entity::find();
    if let Some(status) = status {
        query = query.filter(driver::Column::OperationalStatus.eq(status));
    }
    Ok(query.order_by_asc(driver::Column::Plate).all(db).await?)
}

/// Vehicles operated by a driver account.
pub async fn owned_by<C: ConnectionTrait>(db: &C, user_id: Uuid) -> AppResult<Vec<driver::Model>> {
    Ok(driver::Entity::find()
        .filter(driver::Column::OwnerUserId.eq(user_id))
        .order_by_asc(driver::Column::Plate)
        .all(db)
        .await?)
}

/// Fetch a driver and check that `user_id` operates it.
pub async fn get_owned<C: ConnectionTrait>(
    db: &C,
    driver_id: Uuid,
    user_id: Uuid,
) -> AppResult<driver::Model> {
    let driver = get(db, driver_id).await?;
    if driver.owner_user_id != user_id {
        return Err(AppError::Forbidden(
            "You do not operate this vehicle".to_string(),
        ));
    }
    Ok(driver)
}

pub async fn create<C: ConnectionTrait>(db: &C, req: NewDriver) -> AppResult<driver::Model> {
    validate_capacity(req.capacity)?;

    let owner = user::Entity::find_by_id(req.owner_user_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Owner user not found".to_string()))?;
    if owner.role != UserRole::Driver {
        return Err(AppError::Validation(
            "Owner must have the driver role".to_string(),
        ));
    }

    let driver = driver::ActiveModel {
        id: Set(Uuid::new_v4()),
        owner_user_id: Set(owner.id),
        license_number: Set(required_text("License number", &req.license_number)?),
        plate: Set(required_text("Plate", &req.plate)?.to_uppercase()),
        car_model: Set(required_text("Car model", &req.car_model)?),
        vehicle_class: Set(req.vehicle_class),
        capacity: Set(req.capacity),
        operational_status: Set(OperationalStatus::Available),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;

    tracing::info!(driver_id = %driver.id, plate = %driver.plate, "Driver registered");
    Ok(driver)
}

pub async fn update<C: ConnectionTrait>(
    db: &C,
    driver_id: Uuid,
    req: UpdateDriver,
) -> AppResult<driver::Model> {
    let driver = get(db, driver_id).await?;
    let mut active: driver::ActiveModel = driver.into();

    if let Some(license) = req.license_number {
        active.license_number = Set(required_text("License number", &license)?);
    }
    if let Some(plate) = req.plate {
        active.plate = Set(required_text("Plate", &plate)?.to_uppercase());
    }
    if let Some(model) = req.car_model {
        active.car_model = Set(required_text("Car model", &model)?);
    }
    if let Some(class) = req.vehicle_class {
        active.vehicle_class = Set(class);
    }
    if let Some(capacity) = req.capacity {
        validate_capacity(capacity)?;
        active.capacity = Set(capacity);
    }

    Ok(active.update(db).await?)
}

/// Existing bookings are untouched; only new bookings require `Available`.
pub async fn set_operational_status<C: ConnectionTrait>(
    db: &C,
    driver_id: Uuid,
    status: OperationalStatus,
) -> AppResult<driver::Model> {
    let driver = get(db, driver_id).await?;
    let mut active: driver::ActiveModel = driver.into();
    active.operational_status = Set(status);
    let driver = active.update(db).await?;

    tracing::info!(%driver_id, status = ?status, "Driver operational status changed");
    Ok(driver)
}

pub async fn delete<C: ConnectionTrait>(db: &C, driver_id: Uuid) -> AppResult<()> {
    let bookings = booking::Entity::find()
        .filter(booking::Column::DriverId.eq(driver_id))
        .count(db)
        .await?;
    if bookings > 0 {
        return Err(AppError::Conflict(format!(
            "Driver has {bookings} bookings; mark it not available instead"
        )));
    }

    let result = driver::Entity::delete_by_id(driver_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Driver not found".to_string()));
    }

    tracing::info!(%driver_id, "Driver deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_rejected() {
        assert!(matches!(required_text("Plate", "  "), Err(AppError::Validation(_))));
        assert_eq!(required_text("Plate", " ab-123 ").unwrap(), "ab-123");
    }

    #[test]
    fn capacity_must_be_positive() {
        assert!(validate_capacity(0).is_err());
        assert!(validate_capacity(-3).is_err());
        assert!(validate_capacity(4).is_ok());
    }
}
