use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::driver;
use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::services::drivers;
use crate::services::statistics::{self, DriverStatistics, RiderStatistics};

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

/// Role-specific view of an account.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum UserProfile {
    Rider {
        user: user::Model,
        statistics: RiderStatistics,
    },
    Driver {
        user: user::Model,
        vehicles: Vec<driver::Model>,
        statistics: Vec<DriverStatistics>,
    },
    Admin {
        user: user::Model,
    },
}

/// Register an account created by the identity provider.
pub async fn provision<C: ConnectionTrait>(db: &C, req: NewUser) -> AppResult<user::Model> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }

    let user = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        name: Set(name.to_string()),
        role: Set(req.role),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .map_err(|err| match AppError::from(err) {
        AppError::Conflict(_) => AppError::Conflict("Email already registered".to_string()),
        other => other,
    })?;

    tracing::info!(user_id = %user.id, role = ?user.role, "User provisioned");
    Ok(user)
}

pub async fn get<C: ConnectionTrait>(db: &C, user_id: Uuid) -> AppResult<user::Model> {
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub async fn list<C: ConnectionTrait>(db: &C, role: Option<UserRole>) -> AppResult<Vec<user::Model>> {
    let mut query = user::Entity::find();
    if let Some(role) = role {
        query = query.filter(user::Column::Role.eq(role));
    }
    Ok(query.order_by_asc(user::Column::Name).all(db).await?)
}

pub async fn profile<C: ConnectionTrait>(db: &C, user_id: Uuid) -> AppResult<UserProfile> {
    let user = get(db, user_id).await?;

    Ok(match user.role {
        UserRole::Rider => UserProfile::Rider {
            statistics: statistics::rider_statistics(db, user.id).await?,
            user,
        },
        UserRole::Driver => {
            let vehicles = drivers::owned_by(db, user.id).await?;
            let mut stats = Vec::with_capacity(vehicles.len());
            for v in &vehicles {
                stats.push(statistics::driver_statistics(db, v.id).await?);
            }
            UserProfile::Driver {
                user,
                vehicles,
                statistics: stats,
            }
        }
        UserRole::Admin => UserProfile::Admin { user },
    })
}
