//! Bearer tokens carrying the caller's identity.
//!
//! Tokens are minted by the external identity provider with the shared
//! secret; this service only verifies them. `create_token` exists for that
//! provider's tooling and for tests.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn for_user(user: &user::Model, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }
}

pub fn create_token(claims: &Claims, secret: &str) -> AppResult<String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rider() -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            email: "rider@example.com".into(),
            name: "Rider".into(),
            role: UserRole::Rider,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn verifies_token_signed_with_same_secret() {
        let user = rider();
        let token = create_token(&Claims::for_user(&user, Duration::hours(1)), "secret").unwrap();

        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, UserRole::Rider);
    }

    #[test]
    fn rejects_foreign_secret() {
        let token = create_token(&Claims::for_user(&rider(), Duration::hours(1)), "secret").unwrap();
        assert!(matches!(
            verify_token(&token, "other"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let token = create_token(&Claims::for_user(&rider(), Duration::hours(-2)), "secret").unwrap();
        assert!(verify_token(&token, "secret").is_err());
    }
}
