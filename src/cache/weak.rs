//! Keyed table of weakly-owned entities.

use std::hash::Hash;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use moka::sync::Cache;

use super::CacheConfig;

/// Concurrent map from key to a weak handle on a shared entity.
///
/// This table is:
/// - Thread-safe without a global lock (sharded map)
/// - Weak: a slot never keeps its entity alive by itself
/// - Self-purging: a slot whose entity is gone is dropped when touched
///
/// With retention configured, recently accessed entities are additionally
/// pinned by a Moka cache until they sit idle past the configured time.
pub struct WeakTable<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    name: Arc<str>,
    slots: DashMap<K, Weak<T>>,
    retained: Option<Cache<K, Arc<T>>>,
}

impl<K, T> WeakTable<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub fn new(name: impl Into<Arc<str>>, config: &CacheConfig) -> Self {
        let retained = match config.retain_idle {
            Some(idle) if config.retains() => Some(
                Cache::builder()
                    .max_capacity(config.retain_capacity)
                    .time_to_idle(idle)
                    .build(),
            ),
            _ => None,
        };

        Self {
            name: name.into(),
            slots: DashMap::with_capacity(config.initial_capacity),
            retained,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Live entity for `key`, purging the slot if its entity is gone.
    pub fn get(&self, key: &K) -> Option<Arc<T>> {
        let slot = self.slots.get(key).map(|weak| weak.upgrade());
        match slot {
            Some(Some(entity)) => {
                self.retain(key, &entity);
                Some(entity)
            }
            Some(None) => {
                self.slots.remove_if(key, |_, weak| weak.strong_count() == 0);
                None
            }
            None => None,
        }
    }

    /// Put `entity` in the slot, replacing whatever was there.
    pub fn insert(&self, key: K, entity: &Arc<T>) {
        self.retain(&key, entity);
        self.slots.insert(key, Arc::downgrade(entity));
    }

    /// Insert `candidate` unless a live entity already occupies the slot.
    ///
    /// Returns the entity now in the slot and whether it is `candidate`.
    pub fn get_or_insert(&self, key: K, candidate: Arc<T>) -> (Arc<T>, bool) {
        let (entity, inserted) = match self.slots.entry(key.clone()) {
            Entry::Occupied(mut occupied) => match occupied.get().upgrade() {
                Some(existing) => (existing, false),
                None => {
                    occupied.insert(Arc::downgrade(&candidate));
                    (candidate, true)
                }
            },
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::downgrade(&candidate));
                (candidate, true)
            }
        };
        self.retain(&key, &entity);
        (entity, inserted)
    }

    /// Erase the slot, returning its entity if it was still alive.
    pub fn remove(&self, key: &K) -> Option<Arc<T>> {
        if let Some(retained) = &self.retained {
            retained.invalidate(key);
        }
        self.slots
            .remove(key)
            .and_then(|(_, weak)| weak.upgrade())
    }

    /// Drop every slot whose entity is gone. Returns how many were dropped.
    pub fn purge_dead(&self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, weak| weak.strong_count() > 0);
        before.saturating_sub(self.slots.len())
    }

    /// Number of slots, dead ones included until purged.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn retain(&self, key: &K, entity: &Arc<T>) {
        if let Some(retained) = &self.retained
            && retained.get(key).is_none()
        {
            retained.insert(key.clone(), Arc::clone(entity));
        }
    }
}

impl<K, T> std::fmt::Debug for WeakTable<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakTable")
            .field("name", &self.name)
            .field("slot_count", &self.slots.len())
            .field("retains", &self.retained.is_some())
            .finish()
    }
}
