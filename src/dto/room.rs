use serde::{Deserialize, Serialize};

use crate::state::room::{
    BeatmapId, GameMod, PlaylistItem, PlaylistItemId, RoomId, RoomSettings, RoomState, RoomUser,
    RulesetId, ServerRoom, UserId, UserState,
};

/// Wire view of a room member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub user_id: UserId,
    pub state: UserState,
}

impl From<&RoomUser> for UserSnapshot {
    fn from(user: &RoomUser) -> Self {
        Self {
            user_id: user.user_id,
            state: user.state,
        }
    }
}

/// Wire view of a playlist entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItemSnapshot {
    pub id: PlaylistItemId,
    pub owner_id: UserId,
    pub beatmap_id: BeatmapId,
    pub beatmap_checksum: String,
    pub ruleset_id: RulesetId,
    pub required_mods: Vec<GameMod>,
    pub allowed_mods: Vec<GameMod>,
    pub expired: bool,
}

impl From<&PlaylistItem> for PlaylistItemSnapshot {
    fn from(item: &PlaylistItem) -> Self {
        Self {
            id: item.id,
            owner_id: item.owner_id,
            beatmap_id: item.beatmap_id,
            beatmap_checksum: item.beatmap_checksum.clone(),
            ruleset_id: item.ruleset_id,
            required_mods: item.required_mods.clone(),
            allowed_mods: item.allowed_mods.clone(),
            expired: item.expired,
        }
    }
}

/// Full room snapshot returned to a client on join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub state: RoomState,
    pub host_user_id: Option<UserId>,
    pub settings: RoomSettings,
    pub users: Vec<UserSnapshot>,
    pub playlist: Vec<PlaylistItemSnapshot>,
}

impl From<&ServerRoom> for RoomSnapshot {
    fn from(room: &ServerRoom) -> Self {
        Self {
            room_id: room.room_id,
            state: room.state,
            host_user_id: room.host_user_id,
            settings: room.settings.clone(),
            users: room.users.iter().map(Into::into).collect(),
            playlist: room.queue.items().iter().map(Into::into).collect(),
        }
    }
}
