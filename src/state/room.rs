use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    dao::models::{PlaylistItemRow, RoomRow},
    state::queue::PlaylistQueue,
};

pub type RoomId = i64;
pub type UserId = i32;
pub type PlaylistItemId = i64;
pub type BeatmapId = i32;
pub type RulesetId = i16;

/// Opaque per-connection token handed out by the transport layer.
pub type ConnectionId = Uuid;

/// Highest ruleset id shipped with the game client.
pub const MAX_RULESET_ID: RulesetId = 3;

/// Lifecycle state of a room as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Open,
    WaitingForLoad,
    Playing,
}

/// Lifecycle state of an individual room member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserState {
    Idle,
    Ready,
    WaitingForLoad,
    Loaded,
    Playing,
    FinishedPlay,
    Results,
}

impl UserState {
    /// Whether a user in this state belongs to the room's gameplay group.
    pub fn is_gameplay(self) -> bool {
        matches!(
            self,
            UserState::Ready | UserState::WaitingForLoad | UserState::Loaded | UserState::Playing
        )
    }
}

/// Rule set governing current-item selection and who may enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    HostOnly,
    AllPlayersRoundRobin,
    AllPlayers,
}

/// A gameplay modifier selected for (or allowed on) a playlist item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameMod {
    pub acronym: String,
}

impl GameMod {
    pub fn new(acronym: &str) -> Self {
        Self {
            acronym: acronym.to_owned(),
        }
    }

    /// Whether this mod may be applied under the given ruleset.
    pub fn is_legal_for(&self, ruleset_id: RulesetId) -> bool {
        match self.acronym.as_str() {
            // Difficulty and speed adjustments apply everywhere.
            "EZ" | "NF" | "HT" | "HR" | "SD" | "PF" | "DT" | "NC" | "HD" | "FL" => true,
            "RX" => ruleset_id <= 2,
            "AP" | "SO" => ruleset_id == 0,
            "MR" | "FI" => ruleset_id == 3,
            "4K" | "5K" | "6K" | "7K" | "8K" | "9K" => ruleset_id == 3,
            _ => false,
        }
    }
}

/// Order-insensitive equality over two mod lists.
pub fn mods_equivalent(a: &[GameMod], b: &[GameMod]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<_> = a.to_vec();
    let mut b: Vec<_> = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

/// Check a required/allowed mod selection against a ruleset.
///
/// Rejects out-of-range rulesets, mods the ruleset does not know, duplicate
/// acronyms within a set, and overlap between the two sets.
pub fn validate_mod_selection(
    ruleset_id: RulesetId,
    required: &[GameMod],
    allowed: &[GameMod],
) -> Result<(), String> {
    if !(0..=MAX_RULESET_ID).contains(&ruleset_id) {
        return Err(format!("ruleset {ruleset_id} is out of range"));
    }

    for set in [required, allowed] {
        for (index, game_mod) in set.iter().enumerate() {
            if !game_mod.is_legal_for(ruleset_id) {
                return Err(format!(
                    "mod {} is not valid for ruleset {ruleset_id}",
                    game_mod.acronym
                ));
            }
            if set[..index].contains(game_mod) {
                return Err(format!("mod {} appears more than once", game_mod.acronym));
            }
        }
    }

    if let Some(overlap) = required.iter().find(|m| allowed.contains(m)) {
        return Err(format!(
            "mod {} cannot be both required and allowed",
            overlap.acronym
        ));
    }

    Ok(())
}

/// Mutable settings record of a room.
///
/// Equality is by value over all scalar fields plus mod-set equivalence, so a
/// settings change that merely reorders mods is treated as a no-op.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    pub name: String,
    pub beatmap_id: BeatmapId,
    pub beatmap_checksum: String,
    pub ruleset_id: RulesetId,
    pub required_mods: Vec<GameMod>,
    pub allowed_mods: Vec<GameMod>,
    pub queue_mode: QueueMode,
    pub playlist_item_id: PlaylistItemId,
}

impl PartialEq for RoomSettings {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.beatmap_id == other.beatmap_id
            && self.beatmap_checksum == other.beatmap_checksum
            && self.ruleset_id == other.ruleset_id
            && self.queue_mode == other.queue_mode
            && self.playlist_item_id == other.playlist_item_id
            && mods_equivalent(&self.required_mods, &other.required_mods)
            && mods_equivalent(&self.allowed_mods, &other.allowed_mods)
    }
}

/// An entry in a room's playlist. Never deleted in memory while the room is
/// live; finished rounds flip `expired` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub id: PlaylistItemId,
    pub owner_id: UserId,
    pub beatmap_id: BeatmapId,
    pub beatmap_checksum: String,
    pub ruleset_id: RulesetId,
    pub required_mods: Vec<GameMod>,
    pub allowed_mods: Vec<GameMod>,
    pub expired: bool,
}

/// A member of a room.
///
/// The connection id is carried here (not only on the session) so that
/// server-initiated promotions can adjust gameplay-group membership without
/// acquiring the member's session, which would invert the lock order.
#[derive(Debug, Clone)]
pub struct RoomUser {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
    pub state: UserState,
}

impl RoomUser {
    pub fn new(user_id: UserId, connection_id: ConnectionId) -> Self {
        Self {
            user_id,
            connection_id,
            state: UserState::Idle,
        }
    }
}

/// In-memory authoritative representation of a multiplayer room.
///
/// All mutation happens under the room's entity-store handle.
#[derive(Debug)]
pub struct ServerRoom {
    pub room_id: RoomId,
    pub settings: RoomSettings,
    pub users: Vec<RoomUser>,
    pub host_user_id: Option<UserId>,
    pub state: RoomState,
    pub queue: PlaylistQueue,
}

impl ServerRoom {
    /// Hydrate a room from its persisted row and playlist, selecting the
    /// initial current item.
    pub fn from_row(row: RoomRow, items: Vec<PlaylistItemRow>) -> Self {
        let queue_mode = row.queue_mode;
        let mut queue = PlaylistQueue::new(items.into_iter().map(Into::into).collect());
        queue.update_current(queue_mode);

        let settings = match queue.current_item() {
            Some(item) => RoomSettings {
                name: row.name,
                beatmap_id: item.beatmap_id,
                beatmap_checksum: item.beatmap_checksum.clone(),
                ruleset_id: item.ruleset_id,
                required_mods: item.required_mods.clone(),
                allowed_mods: item.allowed_mods.clone(),
                queue_mode,
                playlist_item_id: item.id,
            },
            None => RoomSettings {
                name: row.name,
                beatmap_id: 0,
                beatmap_checksum: String::new(),
                ruleset_id: 0,
                required_mods: Vec::new(),
                allowed_mods: Vec::new(),
                queue_mode,
                playlist_item_id: 0,
            },
        };

        Self {
            room_id: row.id,
            settings,
            users: Vec::new(),
            host_user_id: None,
            state: RoomState::Open,
            queue,
        }
    }

    pub fn user(&self, user_id: UserId) -> Option<&RoomUser> {
        self.users.iter().find(|u| u.user_id == user_id)
    }

    pub fn user_mut(&mut self, user_id: UserId) -> Option<&mut RoomUser> {
        self.users.iter_mut().find(|u| u.user_id == user_id)
    }

    pub fn is_host(&self, user_id: UserId) -> bool {
        self.host_user_id == Some(user_id)
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        self.users.iter().map(|u| u.user_id).collect()
    }

    pub fn any_user_in(&self, state: UserState) -> bool {
        self.users.iter().any(|u| u.state == state)
    }

    pub fn count_in(&self, state: UserState) -> usize {
        self.users.iter().filter(|u| u.state == state).count()
    }
}
