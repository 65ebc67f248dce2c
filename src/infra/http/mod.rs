pub mod api;
mod middleware;

pub use api::rate_limit::ApiRateLimiter;
pub use api::{ApiState, build_api_router};
pub use middleware::{REQUEST_ID_HEADER, RequestContext};

use axum::{Router, http::HeaderName, middleware as axum_middleware};
use tower_http::cors::{Any, CorsLayer};

use api::handlers::CACHE_STATUS_HEADER;

/// Full application router: catalog API plus cross-cutting layers.
pub fn build_router(state: ApiState) -> Router {
    build_api_router(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::security_headers))
        .layer(cors_layer())
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            HeaderName::from_static(CACHE_STATUS_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}
