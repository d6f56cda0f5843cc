use crate::infra::gateway::Gateway;

#[derive(Clone)]
pub struct ApiState {
    pub gateway: Gateway,
    /// Upper bound on events returned by one drain request.
    pub max_event_batch: usize,
}

impl ApiState {
    pub fn new(gateway: Gateway, max_event_batch: usize) -> Self {
        Self {
            gateway,
            max_event_batch: max_event_batch.max(1),
        }
    }
}
