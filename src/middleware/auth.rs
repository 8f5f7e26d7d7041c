use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeaderRejection,
    TypedHeader,
};

use crate::entities::user::UserRole;
use crate::error::{AppError, AppResult};
use crate::utils::jwt::{verify_token, Claims};
use crate::AppState;

/// Decode the bearer token and attach its `Claims` to the request
pub async fn auth_middleware(
    State(state): State<AppState>,
    auth: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let TypedHeader(auth) =
        auth.map_err(|_| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = verify_token(auth.token(), &state.config.jwt_secret)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

fn ensure_role(request: &Request, role: UserRole) -> AppResult<()> {
    let claims = request
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| AppError::Unauthorized("No authentication found".to_string()))?;

    if claims.role != role {
        return Err(AppError::Forbidden(format!("{role} access required")));
    }
    Ok(())
}

pub async fn require_admin(request: Request, next: Next) -> AppResult<Response> {
    ensure_role(&request, UserRole::Admin)?;
    Ok(next.run(request).await)
}

pub async fn require_driver(request: Request, next: Next) -> AppResult<Response> {
    ensure_role(&request, UserRole::Driver)?;
    Ok(next.run(request).await)
}

pub async fn require_rider(request: Request, next: Next) -> AppResult<Response> {
    ensure_role(&request, UserRole::Rider)?;
    Ok(next.run(request).await)
}
