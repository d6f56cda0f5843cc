use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;

use super::error::ApiError;
use super::models::{EventsQuery, EventsResponse, HealthResponse, InvokeRequest, InvokeResponse};
use super::state::ApiState;

/// -------- Invocation --------
pub async fn invoke(
    State(state): State<ApiState>,
    Path((contract, operation)): Path<(String, String)>,
    payload: Option<Json<InvokeRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.unwrap_or_default();
    let gateway = state.gateway.clone();

    // Commits may fsync the journal.
    let invocation = tokio::task::spawn_blocking(move || {
        gateway.invoke(&contract, &operation, &request.args)
    })
    .await
    .map_err(|err| ApiError::internal(format!("invocation task failed: {err}")))??;

    Ok(Json(InvokeResponse {
        tx_id: invocation.tx_id,
        result: invocation.result,
        committed: invocation.committed,
    }))
}

/// -------- Events --------
pub async fn drain_events(
    State(state): State<ApiState>,
    Query(query): Query<EventsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query
        .limit
        .unwrap_or(state.max_event_batch)
        .clamp(1, state.max_event_batch);
    let queue = state.gateway.events();
    let events = queue.drain(limit);
    Ok(Json(EventsResponse {
        events,
        remaining: queue.len(),
    }))
}

/// -------- Health --------
pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        height: state.gateway.ledger().height(),
        pending_events: state.gateway.events().len(),
    })
}
