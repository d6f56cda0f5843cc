pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router,
    routing::{get, post},
};

pub fn build_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/{contract}/{operation}", post(handlers::invoke))
        .route("/api/v1/events", get(handlers::drain_events))
        .route("/health", get(handlers::health))
        .with_state(state)
}
