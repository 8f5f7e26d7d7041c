use std::net::SocketAddr;

use axum::middleware;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use ride_booking_backend::{
    config::Config,
    db,
    entities::user::{self, UserRole},
    middleware::rate_limit::{create_global_governor, log_request},
    routes,
    services::pricing,
    AppError, AppResult, AppState,
};

const ADMIN_EMAIL: &str = "admin@ridebooking.local";

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ride_booking_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Starting server at {}", config.server_addr());

    let db = db::connect(&config).await?;
    tracing::info!("Connected to database");

    migration::Migrator::up(&db, None).await?;
    tracing::info!("Migrations complete");

    seed_admin(&db).await?;
    pricing::seed_default_rules(&db).await?;

    let state = AppState {
        db,
        config: config.clone(),
    };

    let app = routes::create_router(state)
        .layer(middleware::from_fn(log_request))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(create_global_governor());

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|e| AppError::Internal(format!("Invalid server address: {e}")))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| AppError::Internal(format!("Server error: {e}")))
}

/// Ensure an administrator account exists. Credentials live with the identity provider.
async fn seed_admin(db: &DatabaseConnection) -> AppResult<()> {
    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(ADMIN_EMAIL))
        .one(db)
        .await?;

    if existing.is_none() {
        let admin = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(ADMIN_EMAIL.to_string()),
            name: Set("Admin".to_string()),
            role: Set(UserRole::Admin),
            created_at: Set(Utc::now()),
        };

        let admin = admin.insert(db).await?;
        tracing::info!(user_id = %admin.id, "Admin account created: {}", ADMIN_EMAIL);
    }

    Ok(())
}
