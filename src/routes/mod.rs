use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers::{admin, driver, public, rider};
use crate::middleware::auth::{auth_middleware, require_admin, require_driver, require_rider};
use crate::middleware::rate_limit::create_public_governor;
use crate::middleware::role_rate_limit::{create_role_governor, RateLimitedRole};
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let driver_governor = create_role_governor(RateLimitedRole::Driver);
    let rider_governor = create_role_governor(RateLimitedRole::Rider);
    let public_governor = create_public_governor();

    // Unauthenticated catalog and quotes, limited per IP
    let public_routes = Router::new()
        .route("/pricing", get(public::list_pricing))
        .route("/fares/quote", get(public::quote_fare))
        .route("/drivers", get(public::list_available_drivers))
        .route("/drivers/{id}/availability", get(public::driver_availability))
        .layer(public_governor);

    // Admin routes are only behind the global limiter
    let admin_routes = Router::new()
        // Bookings
        .route("/bookings", get(admin::list_bookings))
        .route(
            "/bookings/{id}",
            get(admin::get_booking).delete(admin::delete_booking),
        )
        .route("/bookings/{id}/transition", post(admin::transition_booking))
        .route("/bookings/{id}/schedule", put(admin::reschedule_booking))
        .route("/bookings/{id}/status", put(admin::override_booking_status))
        .route("/bookings/{id}/payment", put(admin::set_payment_status))
        // Statistics
        .route("/statistics", get(admin::booking_statistics))
        .route("/statistics/daily", get(admin::daily_statistics))
        .route("/statistics/drivers", get(admin::driver_leaderboard))
        .route("/statistics/drivers/{id}", get(admin::driver_statistics))
        .route("/statistics/riders/{id}", get(admin::rider_statistics))
        // Pricing
        .route("/pricing", get(admin::list_pricing))
        .route("/pricing/{class}", put(admin::upsert_pricing))
        // Drivers
        .route("/drivers", get(admin::list_drivers).post(admin::create_driver))
        .route(
            "/drivers/{id}",
            get(admin::get_driver)
                .put(admin::update_driver)
                .delete(admin::delete_driver),
        )
        .route("/drivers/{id}/status", put(admin::set_driver_status))
        // Users
        .route("/users", get(admin::list_users).post(admin::provision_user))
        .route("/users/{id}/profile", get(admin::user_profile))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let driver_routes = Router::new()
        .route("/vehicles", get(driver::my_vehicles))
        .route("/vehicles/{id}/status", put(driver::set_vehicle_status))
        .route("/bookings", get(driver::my_bookings))
        .route("/bookings/{id}/confirm", post(driver::confirm_booking))
        .route("/bookings/{id}/complete", post(driver::complete_booking))
        .route("/bookings/{id}/cancel", post(driver::cancel_booking))
        .route("/statistics", get(driver::my_statistics))
        .layer(driver_governor)
        .layer(middleware::from_fn(require_driver))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let rider_routes = Router::new()
        .route("/", post(rider::create_booking).get(rider::my_bookings))
        .route("/statistics", get(rider::my_statistics))
        .route("/{id}", get(rider::get_booking))
        .route("/{id}/cancel", post(rider::cancel_booking))
        .route("/{id}/rating", post(rider::rate_booking).get(rider::get_rating))
        .layer(rider_governor)
        .layer(middleware::from_fn(require_rider))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api", public_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/driver", driver_routes)
        .nest("/api/bookings", rider_routes)
        .with_state(state)
}
