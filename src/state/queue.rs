use indexmap::IndexMap;

use crate::state::room::{PlaylistItem, PlaylistItemId, QueueMode, UserId};

/// Maximum number of non-expired items a single user may own in the queue
/// when the mode lets everybody enqueue.
pub const PER_USER_LIMIT: usize = 3;

/// Ordered playlist of a room together with the current-item cursor.
///
/// This is the pure half of the queue engine: selection rules and counters.
/// Persistence and broadcasting around these mutations live in the playlist
/// service.
#[derive(Debug, Default)]
pub struct PlaylistQueue {
    items: Vec<PlaylistItem>,
    current_index: Option<usize>,
}

impl PlaylistQueue {
    /// Build a queue from items in database order.
    pub fn new(items: Vec<PlaylistItem>) -> Self {
        Self {
            items,
            current_index: None,
        }
    }

    pub fn items(&self) -> &[PlaylistItem] {
        &self.items
    }

    pub fn current_item(&self) -> Option<&PlaylistItem> {
        self.current_index.and_then(|i| self.items.get(i))
    }

    pub fn current_item_mut(&mut self) -> Option<&mut PlaylistItem> {
        self.current_index.and_then(|i| self.items.get_mut(i))
    }

    pub fn push(&mut self, item: PlaylistItem) {
        self.items.push(item);
    }

    /// Number of non-expired items owned by `user_id`.
    pub fn unexpired_count_for(&self, user_id: UserId) -> usize {
        self.items
            .iter()
            .filter(|i| i.owner_id == user_id && !i.expired)
            .count()
    }

    pub fn all_expired(&self) -> bool {
        self.items.iter().all(|i| i.expired)
    }

    /// Re-evaluate the current-item cursor for the given queue mode and
    /// return the id it now points at.
    pub fn update_current(&mut self, mode: QueueMode) -> Option<PlaylistItemId> {
        self.current_index = self.select_index(mode);
        self.current_item().map(|i| i.id)
    }

    fn select_index(&self, mode: QueueMode) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }

        let fallback = self.items.len() - 1;
        let picked = match mode {
            QueueMode::HostOnly | QueueMode::AllPlayers => {
                self.items.iter().position(|i| !i.expired)
            }
            QueueMode::AllPlayersRoundRobin => self.round_robin_index(),
        };

        Some(picked.unwrap_or(fallback))
    }

    /// Fair selection across owners: owners who have played the least come
    /// first, each represented by their earliest non-expired item.
    fn round_robin_index(&self) -> Option<usize> {
        #[derive(Default)]
        struct OwnerGroup {
            expired_count: usize,
            first_unexpired: Option<usize>,
        }

        // IndexMap preserves first-appearance order of owners, which is the
        // tie-break between owners with equal play counts.
        let mut groups: IndexMap<UserId, OwnerGroup> = IndexMap::new();
        for (index, item) in self.items.iter().enumerate() {
            let group = groups.entry(item.owner_id).or_default();
            if item.expired {
                group.expired_count += 1;
            } else if group.first_unexpired.is_none() {
                group.first_unexpired = Some(index);
            }
        }

        let mut ordered: Vec<OwnerGroup> = groups.into_values().collect();
        ordered.sort_by_key(|g| g.expired_count);

        ordered.into_iter().find_map(|g| g.first_unexpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: PlaylistItemId, owner_id: UserId, expired: bool) -> PlaylistItem {
        PlaylistItem {
            id,
            owner_id,
            beatmap_id: id as i32,
            beatmap_checksum: format!("checksum-{id}"),
            ruleset_id: 0,
            required_mods: Vec::new(),
            allowed_mods: Vec::new(),
            expired,
        }
    }

    fn queue(items: Vec<PlaylistItem>) -> PlaylistQueue {
        PlaylistQueue::new(items)
    }

    #[test]
    fn empty_queue_has_no_current_item() {
        let mut q = queue(Vec::new());
        assert_eq!(q.update_current(QueueMode::HostOnly), None);
        assert!(q.current_item().is_none());
    }

    #[test]
    fn host_only_picks_first_unexpired() {
        let mut q = queue(vec![item(1, 1, true), item(2, 1, false), item(3, 1, false)]);
        assert_eq!(q.update_current(QueueMode::HostOnly), Some(2));
    }

    #[test]
    fn all_players_picks_first_unexpired_in_insertion_order() {
        let mut q = queue(vec![item(1, 2, true), item(2, 3, false), item(3, 2, false)]);
        assert_eq!(q.update_current(QueueMode::AllPlayers), Some(2));
    }

    #[test]
    fn falls_back_to_last_item_when_all_expired() {
        let mut q = queue(vec![item(1, 1, true), item(2, 1, true)]);
        assert_eq!(q.update_current(QueueMode::HostOnly), Some(2));
        assert_eq!(q.update_current(QueueMode::AllPlayersRoundRobin), Some(2));
    }

    #[test]
    fn round_robin_prefers_owner_who_played_least() {
        // Owner 1 has played twice, owner 2 once; owner 2's item goes first
        // even though owner 1 enqueued earlier.
        let mut q = queue(vec![
            item(1, 1, true),
            item(2, 1, true),
            item(3, 2, true),
            item(4, 1, false),
            item(5, 2, false),
        ]);
        assert_eq!(q.update_current(QueueMode::AllPlayersRoundRobin), Some(5));
    }

    #[test]
    fn round_robin_breaks_ties_by_first_appearance() {
        // Equal play counts: the owner appearing first in the playlist wins.
        let mut q = queue(vec![item(1, 7, false), item(2, 5, false)]);
        assert_eq!(q.update_current(QueueMode::AllPlayersRoundRobin), Some(1));
    }

    #[test]
    fn round_robin_takes_earliest_unexpired_within_group() {
        let mut q = queue(vec![item(1, 1, true), item(2, 1, false), item(3, 1, false)]);
        assert_eq!(q.update_current(QueueMode::AllPlayersRoundRobin), Some(2));
    }

    #[test]
    fn round_robin_skips_owners_with_nothing_left() {
        // Owner 2 played least but has no unexpired item; owner 1 still has
        // one queued.
        let mut q = queue(vec![item(1, 1, true), item(2, 2, true), item(3, 1, false)]);
        assert_eq!(q.update_current(QueueMode::AllPlayersRoundRobin), Some(3));
    }

    #[test]
    fn unexpired_count_ignores_expired_items() {
        let q = queue(vec![item(1, 1, true), item(2, 1, false), item(3, 2, false)]);
        assert_eq!(q.unexpired_count_for(1), 1);
        assert_eq!(q.unexpired_count_for(2), 1);
        assert_eq!(q.unexpired_count_for(9), 0);
    }
}
