//! The user's watchlist: an ordered, deduplicated set of catalog identifiers.
//!
//! The in-memory sequence is the source of truth for the session. Every
//! mutation is written through to the backing [`KeyValueStore`] before the
//! call returns; a failed write is logged and the session keeps going on
//! the in-memory state.

use std::collections::HashSet;

use crate::models::AnimeId;
use crate::storage::KeyValueStore;

/// Storage key holding the JSON-encoded identifier array.
pub const WATCHLIST_KEY: &str = "watchlist";

pub struct WatchlistStore {
    ids: Vec<AnimeId>,
    index: HashSet<AnimeId>,
    backend: Box<dyn KeyValueStore>,
}

impl WatchlistStore {
    /// Load the persisted watchlist.
    ///
    /// Absent, unreadable, or malformed content yields an empty watchlist.
    pub fn load(backend: Box<dyn KeyValueStore>) -> Self {
        let ids = match backend.get(WATCHLIST_KEY) {
            Ok(Some(raw)) => decode(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Stored watchlist is malformed, starting empty");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read watchlist, starting empty");
                Vec::new()
            }
        };

        let mut store = Self {
            ids: Vec::with_capacity(ids.len()),
            index: HashSet::with_capacity(ids.len()),
            backend,
        };
        for id in ids {
            if store.index.insert(id) {
                store.ids.push(id);
            }
        }
        tracing::debug!(entries = store.ids.len(), "Watchlist loaded");
        store
    }

    pub fn contains(&self, id: AnimeId) -> bool {
        self.index.contains(&id)
    }

    /// Flip membership of `id` and persist. Returns `true` if `id` is now present.
    pub fn toggle(&mut self, id: AnimeId) -> bool {
        let present = if self.contains(id) {
            self.detach(id);
            false
        } else {
            self.attach(id);
            true
        };
        self.persist();
        present
    }

    /// Append `id` if absent. Returns `true` if membership changed.
    pub fn add(&mut self, id: AnimeId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.toggle(id)
    }

    /// Remove `id` if present. Returns `true` if membership changed.
    pub fn remove(&mut self, id: AnimeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        !self.toggle(id)
    }

    /// Snapshot of the identifiers in insertion order.
    pub fn list(&self) -> Vec<AnimeId> {
        self.ids.clone()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn attach(&mut self, id: AnimeId) {
        self.index.insert(id);
        self.ids.push(id);
    }

    fn detach(&mut self, id: AnimeId) {
        self.index.remove(&id);
        self.ids.retain(|&existing| existing != id);
    }

    fn persist(&mut self) {
        let encoded = match serde_json::to_string(&self.ids) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode watchlist");
                return;
            }
        };
        if let Err(e) = self.backend.set(WATCHLIST_KEY, &encoded) {
            tracing::warn!(
                error = %e,
                entries = self.ids.len(),
                "Failed to persist watchlist, keeping in-memory state for this session"
            );
        }
    }
}

/// Decode a stored watchlist. Anything but a JSON array of non-negative integers is an error.
fn decode(raw: &str) -> Result<Vec<AnimeId>, serde_json::Error> {
    serde_json::from_str::<Vec<AnimeId>>(raw)
}
