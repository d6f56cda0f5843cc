pub mod api;
mod middleware;

pub use api::ApiState;
pub use middleware::{REQUEST_ID_HEADER, RequestContext};

use axum::{Router, middleware as axum_middleware};

/// Full HTTP surface with request tracing applied.
pub fn build_router(state: ApiState) -> Router {
    api::build_api_router(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
