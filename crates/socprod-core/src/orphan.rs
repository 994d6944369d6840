//! Bounded queue of blocks waiting for an ancestor.

use socprod_types::Hash;
use std::collections::{HashMap, HashSet, VecDeque};

struct Entry<T> {
    parent: Hash,
    item: T,
}

/// Blocks keyed by hash and indexed by the parent they wait for. When full,
/// the oldest entry is dropped to make room.
pub struct OrphanPool<T> {
    capacity: usize,
    entries: HashMap<Hash, Entry<T>>,
    order: VecDeque<Hash>,
    by_parent: HashMap<Hash, Vec<Hash>>,
}

impl<T> OrphanPool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
            by_parent: HashMap::new(),
        }
    }

    /// Queue `item` until `parent` becomes known. Returns the hash and
    /// parent of an entry evicted to make room, if any.
    pub fn insert(&mut self, hash: Hash, parent: Hash, item: T) -> Option<(Hash, Hash)> {
        if self.entries.contains_key(&hash) {
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        self.entries.insert(hash, Entry { parent, item });
        self.order.push_back(hash);
        self.by_parent.entry(parent).or_default().push(hash);
        evicted
    }

    /// Remove and return every entry waiting on `parent`, oldest first.
    pub fn take_children(&mut self, parent: &Hash) -> Vec<(Hash, T)> {
        let hashes = self.by_parent.remove(parent).unwrap_or_default();
        let mut children = Vec::with_capacity(hashes.len());
        for hash in hashes {
            if let Some(entry) = self.entries.remove(&hash) {
                self.order.retain(|h| h != &hash);
                children.push((hash, entry.item));
            }
        }
        children
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn get(&self, hash: &Hash) -> Option<&T> {
        self.entries.get(hash).map(|entry| &entry.item)
    }

    /// Parents that are waited on and are not themselves queued here.
    pub fn missing_parents(&self) -> Vec<Hash> {
        let mut seen = HashSet::new();
        self.order
            .iter()
            .filter_map(|hash| self.entries.get(hash))
            .map(|entry| entry.parent)
            .filter(|parent| !self.entries.contains_key(parent) && seen.insert(*parent))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&mut self) -> Option<(Hash, Hash)> {
        while let Some(oldest) = self.order.pop_front() {
            if let Some(entry) = self.entries.remove(&oldest) {
                if let Some(siblings) = self.by_parent.get_mut(&entry.parent) {
                    siblings.retain(|h| h != &oldest);
                    if siblings.is_empty() {
                        self.by_parent.remove(&entry.parent);
                    }
                }
                return Some((oldest, entry.parent));
            }
        }
        None
    }
}
