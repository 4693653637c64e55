/// Typed broadcast helpers over the room groups.
pub mod events;
/// Health check service.
pub mod health_service;
/// Member state transitions and match lifecycle orchestration.
pub mod match_service;
/// Playlist queue orchestration: enqueue rules and current-item upkeep.
pub mod playlist_service;
/// Join / leave / host-transfer / settings coordination.
pub mod room_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
