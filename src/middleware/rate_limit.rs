use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::PeerIpKeyExtractor, GovernorError,
    GovernorLayer,
};

/// IP-keyed governor layer
pub type IpGovernorLayer = GovernorLayer<
    PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    Body,
>;

/// Render governor rejections in the same JSON shape as `AppError`.
pub fn rate_limit_error_handler(err: GovernorError) -> Response {
    match err {
        GovernorError::TooManyRequests { wait_time, headers } => {
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": format!("Too many requests, retry in {wait_time}s"),
                    "retry_after_secs": wait_time,
                })),
            )
                .into_response();
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
        GovernorError::UnableToExtractKey => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unable to identify caller for rate limiting" })),
        )
            .into_response(),
        other => {
            tracing::error!(error = ?other, "Rate limiter failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "rate limiter failure" })),
            )
                .into_response()
        }
    }
}

/// Outermost per-IP limiter, applied before authentication.
/// 1000 requests per minute, one token every 60ms.
pub fn create_global_governor() -> IpGovernorLayer {
    let config = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(60)
            .burst_size(1000)
            .finish()
            .expect("non-zero global governor quota"),
    );

    GovernorLayer::new(config).error_handler(rate_limit_error_handler)
}

/// Per-IP limiter for unauthenticated routes, at the rider quota.
pub fn create_public_governor() -> IpGovernorLayer {
    let config = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(600 * 2)
            .burst_size(100)
            .finish()
            .expect("non-zero public governor quota"),
    );

    GovernorLayer::new(config).error_handler(rate_limit_error_handler)
}

/// Request logging that calls out throttled and failed responses
pub async fn log_request(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    tracing::debug!(client_ip = %addr.ip(), %method, %uri, "Incoming request");

    let response = next.run(request).await;
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!(
            client_ip = %addr.ip(),
            %method,
            %uri,
            %status,
            "Rate limited"
        );
    } else if status.is_client_error() || status.is_server_error() {
        tracing::warn!(client_ip = %addr.ip(), %method, %uri, %status, "Request failed");
    } else {
        tracing::debug!(client_ip = %addr.ip(), %method, %uri, %status, "Request completed");
    }

    response
}
