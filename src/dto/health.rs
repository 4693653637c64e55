use serde::Serialize;

/// Response payload for the health endpoint.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub live_rooms: usize,
    pub live_sessions: usize,
}
