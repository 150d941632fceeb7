//! Item identity: Google item ID ↔ user `item_key`
//!
//! Three flows build the map. Create-reply correlation walks the CreateItem
//! replies in lockstep with the keys recorded at plan time. Positional
//! correlation pairs the i-th remote item with the i-th planned key and is
//! used only when replies cannot be correlated. Refresh correlation reads the
//! pairs already recorded in state.

use log::debug;
use std::collections::{HashMap, HashSet};

use super::model::FormModel;
use crate::api::models::forms::{Item, Response};

/// Keys of the CreateItem requests of one batch, in request order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateIndex {
    entries: Vec<(usize, String)>,
}

impl CreateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the request at `request_index` creates `item_key`
    pub fn record(&mut self, request_index: usize, item_key: impl Into<String>) {
        self.entries.push((request_index, item_key.into()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, key)| key.as_str())
    }

    /// The key created by the request at `request_index`
    pub fn key_at(&self, request_index: usize) -> Option<&str> {
        self.entries
            .iter()
            .find(|(index, _)| *index == request_index)
            .map(|(_, key)| key.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMap {
    by_id: HashMap<String, String>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, google_item_id: impl Into<String>, item_key: impl Into<String>) {
        self.by_id.insert(google_item_id.into(), item_key.into());
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn key_for(&self, google_item_id: &str) -> Option<&str> {
        self.by_id.get(google_item_id).map(String::as_str)
    }

    /// Keys for every remote item, in order. Unknown items get `item_N` for
    /// their position, suffixed `_1`, `_2`, ... when a mapped key or an
    /// earlier synthesized one already uses the name.
    pub fn assign_keys(&self, items: &[Item]) -> Vec<String> {
        let mut taken: HashSet<String> = self.by_id.values().cloned().collect();
        items
            .iter()
            .enumerate()
            .map(|(position, item)| {
                if let Some(key) = item.item_id.as_deref().and_then(|id| self.key_for(id)) {
                    return key.to_string();
                }
                let base = synthesized_key(position);
                let mut key = base.clone();
                let mut suffix = 0;
                while taken.contains(&key) {
                    suffix += 1;
                    key = format!("{}_{}", base, suffix);
                }
                taken.insert(key.clone());
                key
            })
            .collect()
    }

    /// Inverse view: `item_key` → Google item ID
    pub fn ids_by_key(&self) -> HashMap<String, String> {
        self.by_id
            .iter()
            .map(|(id, key)| (key.clone(), id.clone()))
            .collect()
    }

    /// Correlate CreateItem replies with the keys recorded at plan time.
    ///
    /// Replies for other request kinds carry no `createItem` and are passed
    /// over. Returns `None` when the number of CreateItem replies differs
    /// from the number of recorded creates or a reply lacks an item ID.
    pub fn from_create_replies(index: &CreateIndex, replies: &[Response]) -> Option<Self> {
        let created: Vec<&str> = replies
            .iter()
            .filter_map(|reply| reply.create_item.as_ref())
            .map(|created| created.item_id.as_str())
            .collect();

        if created.len() != index.len() || created.iter().any(|id| id.is_empty()) {
            debug!(
                "Cannot correlate {} createItem replies with {} planned items",
                created.len(),
                index.len()
            );
            return None;
        }

        let mut map = Self::new();
        for (id, key) in created.into_iter().zip(index.keys()) {
            map.insert(id, key);
        }
        Some(map)
    }

    /// Pair the i-th remote item with the i-th key. Assumes the server kept
    /// creation order; a reordering would misassign keys.
    pub fn positional<'a>(items: &[Item], keys: impl IntoIterator<Item = &'a str>) -> Self {
        let mut map = Self::new();
        for (item, key) in items.iter().zip(keys) {
            if let Some(id) = &item.item_id {
                map.insert(id.clone(), key);
            }
        }
        map
    }

    /// The pairs recorded in a prior state
    pub fn from_state(state: &FormModel) -> Self {
        let mut map = Self::new();
        for item in &state.items {
            if let Some(id) = &item.google_item_id {
                map.insert(id.clone(), item.item_key.clone());
            }
        }
        map
    }
}

pub fn synthesized_key(position: usize) -> String {
    format!("item_{}", position)
}
