use axum::http::Request;
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder,
    key_extractor::KeyExtractor,
    GovernorError, GovernorLayer,
};
use uuid::Uuid;

use crate::middleware::rate_limit::rate_limit_error_handler;
use crate::utils::jwt::Claims;

/// Keys the limiter on the authenticated user id set by `auth_middleware`
#[derive(Debug, Clone, Copy)]
pub struct UserIdExtractor;

impl KeyExtractor for UserIdExtractor {
    type Key = Uuid;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let claims = req
            .extensions()
            .get::<Claims>()
            .ok_or(GovernorError::UnableToExtractKey)?;

        Ok(claims.sub)
    }
}

pub type RoleGovernorLayer = GovernorLayer<
    UserIdExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

/// Roles that get a per-user quota. Admin routes are only covered by the global limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitedRole {
    Rider,
    Driver,
}

impl RateLimitedRole {
    /// (milliseconds per replenished token, burst)
    fn quota(self) -> (u64, u32) {
        match self {
            // Drivers poll their schedule and walk bookings through the lifecycle
            RateLimitedRole::Driver => (120 * 2, 500),
            RateLimitedRole::Rider => (600 * 2, 100),
        }
    }
}

pub fn create_role_governor(role: RateLimitedRole) -> RoleGovernorLayer {
    let (per_ms, burst) = role.quota();

    let config = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(burst)
            .key_extractor(UserIdExtractor)
            .finish()
            .expect("non-zero role governor quota"),
    );

    GovernorLayer::new(config).error_handler(rate_limit_error_handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user::UserRole;

    #[test]
    fn drivers_get_the_larger_quota() {
        let (driver_ms, driver_burst) = RateLimitedRole::Driver.quota();
        let (rider_ms, rider_burst) = RateLimitedRole::Rider.quota();
        assert!(driver_ms < rider_ms);
        assert!(driver_burst > rider_burst);
    }

    #[test]
    fn key_is_the_token_subject() {
        let sub = Uuid::new_v4();
        let mut req = Request::new(());
        req.extensions_mut().insert(Claims {
            sub,
            email: "rider@example.com".into(),
            role: UserRole::Rider,
            exp: 0,
            iat: 0,
        });
        assert_eq!(UserIdExtractor.extract(&req).unwrap(), sub);
    }

    #[test]
    fn missing_claims_cannot_be_keyed() {
        let req = Request::new(());
        assert!(matches!(
            UserIdExtractor.extract(&req),
            Err(GovernorError::UnableToExtractKey)
        ));
    }
}
