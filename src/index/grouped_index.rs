//! # Grouped Index
//!
//! Secondary index mapping a group key to the cached items that belong to it.
//! The index is derived purely from the store's mutation events: it rebuilds on
//! every full replace and patches itself on every single-key update or delete.
//!
//! Two maps are kept under one lock so they are never observed out of step:
//!
//! - `buckets`: group key → (key → item)
//! - `key_to_group`: key → group key, for O(1) removal on update/delete
//!
//! A key is in `key_to_group` exactly when it is in one bucket, and empty
//! buckets are pruned immediately.

use crate::store::{CacheObserver, ObserverResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use tracing::{debug, info};

struct IndexState<K, V, G> {
    buckets: HashMap<G, HashMap<K, V>>,
    key_to_group: HashMap<K, G>,
}

impl<K, V, G> IndexState<K, V, G>
where
    K: Eq + Hash + Clone,
    G: Eq + Hash + Clone,
{
    fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            key_to_group: HashMap::new(),
        }
    }

    fn remove_key(&mut self, key: &K) {
        let Some(group) = self.key_to_group.remove(key) else {
            return;
        };

        if let Some(bucket) = self.buckets.get_mut(&group) {
            bucket.remove(key);
            if bucket.is_empty() {
                self.buckets.remove(&group);
            }
        }
    }

    fn insert(&mut self, key: K, item: V, group: G) {
        self.buckets
            .entry(group.clone())
            .or_default()
            .insert(key.clone(), item);
        self.key_to_group.insert(key, group);
    }
}

/// Group-key → items index kept in sync with a [`CacheStore`](crate::store::CacheStore)
pub struct GroupedIndex<K, V, G> {
    name: String,
    group_by: Box<dyn Fn(&V) -> G + Send + Sync>,
    state: Mutex<IndexState<K, V, G>>,
}

impl<K, V, G> GroupedIndex<K, V, G>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
    G: Eq + Hash + Clone + Debug + Send + Sync,
{
    /// Create an empty index.
    ///
    /// `group_by` must be deterministic, side-effect free and cheap: it runs on
    /// every item during a rebuild and on every single-key update.
    pub fn new<F>(name: impl Into<String>, group_by: F) -> Self
    where
        F: Fn(&V) -> G + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            group_by: Box::new(group_by),
            state: Mutex::new(IndexState::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Items currently in `group`, copied out of the index. Empty when the
    /// group does not exist.
    pub fn get_by_group_key(&self, group: &G) -> Vec<V> {
        let state = self.state.lock();
        state
            .buckets
            .get(group)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_group(&self, group: &G) -> bool {
        self.state.lock().buckets.contains_key(group)
    }

    pub fn group_count(&self) -> usize {
        self.state.lock().buckets.len()
    }

    pub fn group_keys(&self) -> Vec<G> {
        self.state.lock().buckets.keys().cloned().collect()
    }

    /// Group the key is currently indexed under
    pub fn group_of(&self, key: &K) -> Option<G> {
        self.state.lock().key_to_group.get(key).cloned()
    }

    /// Number of keys indexed
    pub fn len(&self) -> usize {
        self.state.lock().key_to_group.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear and re-insert every item
    pub fn rebuild(&self, items: &[(K, V)]) {
        // grouping runs before the lock so a panicking selector leaves the index untouched
        let grouped: Vec<(K, V, G)> = items
            .iter()
            .map(|(key, item)| (key.clone(), item.clone(), (self.group_by)(item)))
            .collect();

        let mut state = self.state.lock();
        *state = IndexState::new();
        for (key, item, group) in grouped {
            // a repeated key must not stay behind in its earlier bucket
            state.remove_key(&key);
            state.insert(key, item, group);
        }

        info!(
            index = %self.name,
            item_count = state.key_to_group.len(),
            group_count = state.buckets.len(),
            "Rebuilt grouped index"
        );
    }

    /// Move `key` into the bucket matching `item`
    pub fn upsert(&self, key: &K, item: &V) {
        let group = (self.group_by)(item);

        let mut state = self.state.lock();
        state.remove_key(key);
        debug!(index = %self.name, group = ?group, "Indexing updated item");
        state.insert(key.clone(), item.clone(), group);
    }

    /// Drop `key` from the index; unknown keys are ignored
    pub fn remove(&self, key: &K) {
        self.state.lock().remove_key(key);
    }
}

impl<K, V, G> CacheObserver<K, V> for GroupedIndex<K, V, G>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
    G: Eq + Hash + Clone + Debug + Send + Sync,
{
    fn on_refreshed(&self, items: &[(K, V)]) -> ObserverResult {
        self.rebuild(items);
        Ok(())
    }

    fn on_item_updated(&self, key: &K, item: &V) -> ObserverResult {
        self.upsert(key, item);
        Ok(())
    }

    fn on_item_deleted(&self, key: &K) -> ObserverResult {
        self.remove(key);
        Ok(())
    }

    fn observer_name(&self) -> &str {
        &self.name
    }
}

impl<K, V, G> std::fmt::Debug for GroupedIndex<K, V, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupedIndex")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        category: &'static str,
        price: u32,
    }

    fn item(category: &'static str, price: u32) -> Item {
        Item { category, price }
    }

    fn index() -> GroupedIndex<u32, Item, &'static str> {
        GroupedIndex::new("by_category", |item: &Item| item.category)
    }

    #[test]
    fn test_rebuild_groups_items() {
        let index = index();
        index.rebuild(&[(1, item("X", 10)), (2, item("Y", 20)), (3, item("X", 30))]);

        assert_eq!(index.group_count(), 2);
        assert_eq!(index.len(), 3);
        assert_eq!(index.get_by_group_key(&"X").len(), 2);
        assert_eq!(index.get_by_group_key(&"Y"), vec![item("Y", 20)]);
        assert!(index.get_by_group_key(&"Z").is_empty());
        assert_eq!(index.group_of(&3), Some("X"));
    }

    #[test]
    fn test_upsert_moves_between_groups_and_prunes() {
        let index = index();
        index.rebuild(&[(1, item("X", 10)), (2, item("Y", 20))]);

        index.upsert(&1, &item("Y", 11));

        assert!(!index.has_group(&"X"));
        assert!(index.get_by_group_key(&"X").is_empty());
        assert_eq!(index.get_by_group_key(&"Y").len(), 2);
        assert_eq!(index.group_count(), 1);
        assert_eq!(index.group_of(&1), Some("Y"));
    }

    #[test]
    fn test_upsert_in_same_group_replaces_item() {
        let index = index();
        index.rebuild(&[(1, item("X", 10))]);
        index.upsert(&1, &item("X", 99));

        assert_eq!(index.get_by_group_key(&"X"), vec![item("X", 99)]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove_prunes_and_ignores_unknown() {
        let index = index();
        index.rebuild(&[(1, item("X", 10)), (2, item("Y", 20))]);

        index.remove(&1);
        index.remove(&1);
        index.remove(&404);

        assert!(!index.has_group(&"X"));
        assert_eq!(index.group_count(), 1);
        assert_eq!(index.group_of(&1), None);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_rebuild_with_empty_set_clears_everything() {
        let index = index();
        index.rebuild(&[(1, item("X", 10))]);
        index.rebuild(&[]);

        assert_eq!(index.group_count(), 0);
        assert!(index.is_empty());
        assert!(index.group_keys().is_empty());
    }

    #[test]
    fn test_rebuild_with_repeated_key_keeps_last_group() {
        let index = index();
        index.rebuild(&[(1, item("X", 10)), (1, item("Y", 11))]);

        assert!(!index.has_group(&"X"));
        assert_eq!(index.get_by_group_key(&"Y"), vec![item("Y", 11)]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_returned_items_are_copies() {
        let index = index();
        index.rebuild(&[(1, item("X", 10))]);

        let mut items = index.get_by_group_key(&"X");
        items.clear();

        assert_eq!(index.get_by_group_key(&"X").len(), 1);
    }
}
