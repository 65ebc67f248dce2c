use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, MatchedPath, State};
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::application::api_keys::ApiAuthError;

use super::error::ApiError;
use super::state::ApiState;

const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Guards mutating requests with the administrative API key.
///
/// Safe methods pass through untouched.
pub async fn api_auth(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method().is_safe() {
        return next.run(request).await;
    }

    let token =
        extract_token(request.headers().get(axum::http::header::AUTHORIZATION)).or_else(|| {
            request
                .headers()
                .get("x-api-key")
                .and_then(|v| v.to_str().ok().map(|s| s.to_string()))
        });

    match state.api_key.authenticate(token.as_deref()) {
        Ok(()) => next.run(request).await,
        Err(err @ (ApiAuthError::Missing | ApiAuthError::Invalid)) => {
            debug!(
                target = "storefront::api::auth",
                method = %request.method(),
                path = %request.uri().path(),
                reason = %err,
                "rejected unauthenticated request"
            );
            ApiError::unauthorized().into_response()
        }
    }
}

pub async fn api_rate_limit(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let decision = state.rate_limiter.check(&client, &route);
    if !decision.allowed {
        return ApiError::rate_limited(state.rate_limiter.retry_after_secs());
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(
        RATE_LIMIT_REMAINING_HEADER,
        HeaderValue::from(decision.remaining),
    );
    response
}

fn extract_token(header: Option<&HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let bearer = raw.strip_prefix("Bearer ")?;
    Some(bearer.to_string())
}
