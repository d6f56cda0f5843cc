use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::infra::ledger::CommittedEvent;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct InvokeRequest {
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct InvokeResponse {
    pub tx_id: String,
    pub result: Value,
    pub committed: bool,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<CommittedEvent>,
    pub remaining: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub height: u64,
    pub pending_events: usize,
}
