//! Keyed single-flight memo with an optional expiry window.
//!
//! The first caller for a key runs the computation; concurrent callers for the
//! same key block on that one computation and share its result. Callers for
//! other keys never wait on each other. A failed computation is not stored,
//! so the next caller for that key tries again.
//!
//! Expired slots are dropped whenever a new key is added, and an optional
//! `max_entries` bound evicts the oldest completed value when full.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct SingleFlight<K, V> {
    slots: DashMap<K, Arc<Slot<V>>>,
    ttl: Option<Duration>,
    max_entries: Option<usize>,
}

struct Slot<V> {
    cell: OnceCell<(Instant, V)>,
}

impl<V> Slot<V> {
    fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        match (ttl, self.cell.get()) {
            (Some(ttl), Some((completed_at, _))) => completed_at.elapsed() >= ttl,
            _ => false,
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Entries live for the lifetime of the cache.
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            ttl: None,
            max_entries: None,
        }
    }

    /// Entries expire `ttl` after their computation completed.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            ttl: Some(ttl),
            max_entries: None,
        }
    }

    /// Caps the number of slots. In-flight computations are never evicted,
    /// so the cap can be exceeded while they run.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub fn get_or_try_init<E, F>(&self, key: &K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let slot = self.slot(key);
        match slot.cell.get_or_try_init(|| init().map(|v| (Instant::now(), v))) {
            Ok((_, value)) => Ok(value.clone()),
            Err(e) => {
                self.slots
                    .remove_if(key, |_, current| Arc::ptr_eq(current, &slot) && current.cell.get().is_none());
                Err(e)
            }
        }
    }

    /// Completed, unexpired value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        let slot = self.slots.get(key)?;
        if slot.is_expired(self.ttl) {
            return None;
        }
        slot.cell.get().map(|(_, v)| v.clone())
    }

    /// Removes and returns the completed, unexpired value for `key`. A slot
    /// still being computed is left in place.
    pub fn take(&self, key: &K) -> Option<V> {
        let (_, slot) = self.slots.remove_if(key, |_, slot| slot.cell.get().is_some())?;
        if slot.is_expired(self.ttl) {
            return None;
        }
        slot.cell.get().map(|(_, v)| v.clone())
    }

    pub fn invalidate(&self, key: &K) {
        self.slots.remove(key);
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, key: &K) -> Arc<Slot<V>> {
        if !self.slots.contains_key(key) {
            self.evict();
        }
        match self.slots.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_expired(self.ttl) {
                    let fresh = Arc::new(Slot::new());
                    entry.insert(fresh.clone());
                    fresh
                } else {
                    entry.get().clone()
                }
            }
            Entry::Vacant(entry) => entry.insert(Arc::new(Slot::new())).value().clone(),
        }
    }

    /// Makes room for one more slot.
    fn evict(&self) {
        if self.ttl.is_some() {
            self.slots.retain(|_, slot| !slot.is_expired(self.ttl));
        }
        let Some(max_entries) = self.max_entries else {
            return;
        };
        while self.slots.len() >= max_entries {
            let oldest = self
                .slots
                .iter()
                .filter_map(|entry| {
                    let (completed_at, _) = entry.value().cell.get()?;
                    Some((*completed_at, entry.key().clone()))
                })
                .min_by_key(|(completed_at, _)| *completed_at)
                .map(|(_, key)| key);
            match oldest {
                Some(key) => {
                    self.slots.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
