//! Secondary index from parent id to child ids.

use std::collections::{BTreeSet, HashMap};

/// Non-unique index over `parent_id`.
///
/// Top-level records (no parent) are not indexed. Child ids come back in
/// ascending id order so lookups are deterministic.
#[derive(Debug, Default, Clone)]
pub struct ParentIndex {
    children: HashMap<String, BTreeSet<String>>,
}

impl ParentIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `child` has `parent` as its parent.
    pub fn insert(&mut self, parent: &str, child: &str) {
        self.children
            .entry(parent.to_string())
            .or_default()
            .insert(child.to_string());
    }

    /// Drop the `parent -> child` link. Empty buckets are removed.
    pub fn remove(&mut self, parent: &str, child: &str) {
        if let Some(set) = self.children.get_mut(parent) {
            set.remove(child);
            if set.is_empty() {
                self.children.remove(parent);
            }
        }
    }

    /// Ids of all records whose parent is `parent`.
    pub fn children_of(&self, parent: &str) -> Vec<String> {
        self.children
            .get(parent)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns `true` if no links are indexed.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}
