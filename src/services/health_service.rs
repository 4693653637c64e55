use crate::{dto::health::HealthResponse, state::SharedState};

/// Assemble the health snapshot served by the health endpoint.
pub fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        live_rooms: state.rooms().len(),
        live_sessions: state.sessions().len(),
    }
}
