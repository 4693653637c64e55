use std::{hash::Hash, sync::Arc};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::ServiceError;

/// Registry of live entities keyed by id, handing out exclusive-use handles.
///
/// Each entry carries its own async mutex; the map itself is only touched
/// during handle acquisition and removal, so there is no global lock on the
/// hot path. All operations on a given entity are totally ordered by its
/// entry mutex.
pub struct EntityStore<K, V> {
    entries: Arc<DashMap<K, EntryCell<V>>>,
}

type EntryCell<V> = Arc<Mutex<Slot<V>>>;

#[derive(Debug)]
struct Slot<V> {
    item: Option<V>,
    destroyed: bool,
}

impl<V> Slot<V> {
    fn vacant() -> Self {
        Self {
            item: None,
            destroyed: false,
        }
    }
}

impl<K, V> Default for EntityStore<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }
}

impl<K, V> EntityStore<K, V>
where
    K: Eq + Hash + Copy,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusive use of the entry for `key`, blocking until any other
    /// holder releases it.
    ///
    /// With `allow_create`, a missing entry is created empty and the caller
    /// is expected to populate it via [`EntityHandle::set`]; an entry left
    /// unpopulated is removed again when the handle drops. Without
    /// `allow_create`, a missing entry yields a handle whose item is `None`.
    pub async fn get_for_use(&self, key: K, allow_create: bool) -> EntityHandle<K, V> {
        loop {
            let cell = if allow_create {
                self.entries
                    .entry(key)
                    .or_insert_with(|| Arc::new(Mutex::new(Slot::vacant())))
                    .value()
                    .clone()
            } else {
                match self.entries.get(&key) {
                    Some(entry) => entry.value().clone(),
                    None => {
                        return EntityHandle {
                            key,
                            entries: self.entries.clone(),
                            cell: None,
                            guard: None,
                        };
                    }
                }
            };

            let guard = cell.clone().lock_owned().await;
            if guard.destroyed {
                // The entry was torn down while we were queued on its mutex;
                // it is no longer the one in the map.
                continue;
            }

            return EntityHandle {
                key,
                entries: self.entries.clone(),
                cell: Some(cell),
                guard: Some(guard),
            };
        }
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Test fixtures only; live handles keep their slots
    /// but the entries are forgotten.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Scoped exclusive-use token for one entity.
///
/// The entry mutex stays held for the lifetime of the handle and is released
/// on every exit path when the handle drops. Handles must not outlive a
/// single logical operation.
pub struct EntityHandle<K, V>
where
    K: Eq + Hash,
{
    key: K,
    entries: Arc<DashMap<K, EntryCell<V>>>,
    cell: Option<EntryCell<V>>,
    guard: Option<OwnedMutexGuard<Slot<V>>>,
}

impl<K, V> EntityHandle<K, V>
where
    K: Eq + Hash,
{
    pub fn item(&self) -> Option<&V> {
        self.guard.as_ref().and_then(|g| g.item.as_ref())
    }

    pub fn item_mut(&mut self) -> Option<&mut V> {
        self.guard.as_mut().and_then(|g| g.item.as_mut())
    }

    /// Populate the entry. Fails on a handle that has no backing entry to
    /// write to.
    pub fn set(&mut self, value: V) -> Result<(), ServiceError> {
        match self.guard.as_mut() {
            Some(guard) => {
                guard.item = Some(value);
                Ok(())
            }
            None => Err(ServiceError::InvalidOperation(
                "attempted to populate an entity that was never registered".into(),
            )),
        }
    }

    /// Tear the entry down: clears the slot and removes it from the store so
    /// subsequent acquisitions see it absent.
    pub fn destroy(mut self) {
        if let Some(guard) = self.guard.as_mut() {
            guard.item = None;
            guard.destroyed = true;
        }
        // Removal happens in drop, before the mutex is released.
    }
}

impl<K, V> Drop for EntityHandle<K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        let Some(mut guard) = self.guard.take() else {
            return;
        };

        // A never-populated entry must not linger as an empty slot.
        if guard.item.is_none() {
            guard.destroyed = true;
        }

        if guard.destroyed {
            if let Some(cell) = self.cell.as_ref() {
                // Remove before releasing the mutex so queued waiters observe
                // the destroyed flag and retry against a fresh entry.
                self.entries
                    .remove_if(&self.key, |_, value| Arc::ptr_eq(value, cell));
            }
        }
    }
}
