use serde::{Deserialize, Serialize};

use crate::state::room::{BeatmapId, GameMod, RoomId, RoomSettings, RulesetId, UserId, UserState};

/// Requests accepted from room WebSocket clients.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Must be the first frame on a connection; carries the identity the
    /// fronting authenticator established for it.
    Identify { user_id: UserId },
    JoinRoom { room_id: RoomId },
    LeaveRoom,
    TransferHost { user_id: UserId },
    ChangeState { state: UserState },
    StartMatch,
    ChangeSettings { settings: RoomSettings },
    AddPlaylistItem { item: PlaylistItemRequest },
    #[serde(other)]
    Unknown,
}

/// Client-supplied playlist entry; id and owner are assigned server-side.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaylistItemRequest {
    pub beatmap_id: BeatmapId,
    pub beatmap_checksum: String,
    pub ruleset_id: RulesetId,
    #[serde(default)]
    pub required_mods: Vec<GameMod>,
    #[serde(default)]
    pub allowed_mods: Vec<GameMod>,
}
