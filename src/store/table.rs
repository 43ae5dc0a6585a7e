use crate::catalog::CatalogRecord;
use crate::store::item_state::{ItemKey, ItemState};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

const LOG_TARGET: &str = "r_medialist::store";

struct StoreEntry {
    key: ItemKey,
    record: CatalogRecord,
    state: ItemState,
}

#[derive(Default)]
struct Listing {
    entries: Vec<StoreEntry>,
    positions: HashMap<ItemKey, usize>,
}

impl Listing {
    fn entry(&self, key: &ItemKey) -> Option<(usize, &StoreEntry)> {
        let position = *self.positions.get(key)?;
        self.entries.get(position).map(|entry| (position, entry))
    }

    fn snapshot(&self, position: usize, entry: &StoreEntry) -> ItemSnapshot {
        ItemSnapshot {
            key: entry.key,
            position,
            record: entry.record.clone(),
            state: entry.state,
        }
    }
}

/// A consistent copy of one item as seen by a renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSnapshot {
    pub key: ItemKey,
    pub position: usize,
    pub record: CatalogRecord,
    pub state: ItemState,
}

/// Table of item states, keyed by [`ItemKey`] and kept in catalog order.
///
/// Readers share the lock, so any number of them proceed in parallel; a
/// write holds it only for the duration of a single item's mutator. Every
/// read, including [`snapshot_all`](Self::snapshot_all), therefore sees a
/// cut between two whole updates and never a partial one. Only the
/// coordinator writes.
#[derive(Default)]
pub struct ItemStateStore {
    listing: RwLock<Listing>,
}

impl ItemStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Listing> {
        self.listing.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Listing> {
        self.listing.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Discards every item and rebuilds the table from `records`, each with a
    /// fresh key and default state. Returns the keys in catalog order.
    pub(crate) fn replace(&self, records: Vec<CatalogRecord>) -> Vec<ItemKey> {
        let mut listing = Listing::default();
        for (position, record) in records.into_iter().enumerate() {
            let key = ItemKey::new();
            listing.positions.insert(key, position);
            listing.entries.push(StoreEntry {
                key,
                record,
                state: ItemState::default(),
            });
        }
        let keys = listing.entries.iter().map(|e| e.key).collect::<Vec<_>>();
        debug!(target: LOG_TARGET, "Rebuilt item table with {} items", keys.len());
        *self.write() = listing;
        keys
    }

    /// Atomic read-modify-write of one item. Returns the state after the
    /// update, or `None` when the key is not in the current listing.
    pub(crate) fn set<F>(&self, key: &ItemKey, mutator: F) -> Option<ItemState>
    where
        F: FnOnce(&mut ItemState),
    {
        let mut listing = self.write();
        let position = *listing.positions.get(key)?;
        let entry = listing.entries.get_mut(position)?;
        mutator(&mut entry.state);
        Some(entry.state)
    }

    pub fn get(&self, key: &ItemKey) -> Option<ItemState> {
        self.read().entry(key).map(|(_, entry)| entry.state)
    }

    pub fn get_at(&self, position: usize) -> Option<ItemState> {
        self.read().entries.get(position).map(|entry| entry.state)
    }

    pub fn key_at(&self, position: usize) -> Option<ItemKey> {
        self.read().entries.get(position).map(|entry| entry.key)
    }

    pub fn position_of(&self, key: &ItemKey) -> Option<usize> {
        self.read().positions.get(key).copied()
    }

    pub fn record(&self, key: &ItemKey) -> Option<CatalogRecord> {
        self.read().entry(key).map(|(_, entry)| entry.record.clone())
    }

    pub fn contains(&self, key: &ItemKey) -> bool {
        self.read().positions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<ItemKey> {
        self.read().entries.iter().map(|e| e.key).collect()
    }

    /// Keys of every item currently marked as playing.
    pub fn playing(&self) -> Vec<ItemKey> {
        self.read()
            .entries
            .iter()
            .filter(|e| e.state.is_playing)
            .map(|e| e.key)
            .collect()
    }

    pub fn snapshot(&self, key: &ItemKey) -> Option<ItemSnapshot> {
        let listing = self.read();
        let (position, entry) = listing.entry(key)?;
        Some(listing.snapshot(position, entry))
    }

    pub fn snapshot_all(&self) -> Vec<ItemSnapshot> {
        let listing = self.read();
        listing
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| listing.snapshot(position, entry))
            .collect()
    }
}
