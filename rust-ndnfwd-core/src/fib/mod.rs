//! Forwarding Information Base.
//!
//! Entries live in an arena of slots so their ids stay stable while other
//! entries come and go. Two views sit over the arena: a prefix hash map for
//! exact and longest-prefix lookups, and an insertion-order list for
//! enumeration by index.

mod entry;

pub use entry::{FaceMetric, FaceStatus, FibEntry};

use log::{debug, trace};
use rust_ndnfwd_common::{FaceId, Name};
use std::collections::HashMap;
use std::time::Duration;

/// Stable handle of a FIB entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(usize);

#[derive(Debug, Default)]
pub struct Fib {
    slots: Vec<Option<FibEntry>>,
    free: Vec<usize>,
    by_prefix: HashMap<Name, EntryId>,
    order: Vec<EntryId>,
}

impl Fib {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route for `prefix` through `face`, creating the entry if needed.
    /// Adding an existing (prefix, face) pair only updates its cost.
    pub fn add(&mut self, prefix: Name, face: FaceId, cost: i32) -> EntryId {
        let id = match self.by_prefix.get(&prefix) {
            Some(&id) => id,
            None => self.insert(FibEntry::new(prefix.clone())),
        };
        if let Some(entry) = self.slot_mut(id) {
            entry.add_or_update_route(face, cost);
        }
        debug!("[FIB] Added route {} via {} (cost {})", prefix, face, cost);
        id
    }

    fn insert(&mut self, entry: FibEntry) -> EntryId {
        let prefix = entry.prefix().clone();
        let id = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                EntryId(slot)
            }
            None => {
                self.slots.push(Some(entry));
                EntryId(self.slots.len() - 1)
            }
        };
        self.by_prefix.insert(prefix, id);
        self.order.push(id);
        id
    }

    /// Removes the route through `face`. An entry left without faces is deleted.
    /// Returns false if there was no such route.
    pub fn remove(&mut self, prefix: &Name, face: FaceId) -> bool {
        let Some(&id) = self.by_prefix.get(prefix) else {
            return false;
        };
        let (removed, now_empty) = match self.slot_mut(id) {
            Some(entry) => (entry.remove_face(face), entry.is_empty()),
            None => return false,
        };
        if now_empty {
            self.delete(id);
        }
        if removed {
            debug!("[FIB] Removed route {} via {}", prefix, face);
        }
        removed
    }

    /// Deletes the whole entry for `prefix`.
    pub fn remove_prefix(&mut self, prefix: &Name) -> Option<FibEntry> {
        let id = *self.by_prefix.get(prefix)?;
        self.delete(id)
    }

    /// Removes `face` from every entry, deleting entries it was the only face of.
    pub fn remove_from_all(&mut self, face: FaceId) {
        let mut emptied = Vec::new();
        for &id in &self.order {
            if let Some(Some(entry)) = self.slots.get_mut(id.0) {
                if entry.remove_face(face) && entry.is_empty() {
                    emptied.push(id);
                }
            }
        }
        for id in emptied {
            self.delete(id);
        }
        debug!("[FIB] Removed {} from all entries", face);
    }

    fn delete(&mut self, id: EntryId) -> Option<FibEntry> {
        let entry = self.slots.get_mut(id.0)?.take()?;
        self.by_prefix.remove(entry.prefix());
        self.order.retain(|&other| other != id);
        self.free.push(id.0);
        trace!("[FIB] Deleted entry {}", entry.prefix());
        Some(entry)
    }

    /// Entry with the longest prefix of `name`, trying `name.prefix(k)` for
    /// k = len down to 0.
    pub fn longest_prefix_match(&self, name: &Name) -> Option<&FibEntry> {
        let id = self.lpm_id(name)?;
        self.entry(id)
    }

    pub fn lpm_id(&self, name: &Name) -> Option<EntryId> {
        (0..=name.len())
            .rev()
            .find_map(|k| self.by_prefix.get(&name.prefix(k)).copied())
    }

    pub fn find_exact(&self, prefix: &Name) -> Option<&FibEntry> {
        let id = *self.by_prefix.get(prefix)?;
        self.entry(id)
    }

    pub fn find_exact_mut(&mut self, prefix: &Name) -> Option<&mut FibEntry> {
        let id = *self.by_prefix.get(prefix)?;
        self.slot_mut(id)
    }

    pub fn entry(&self, id: EntryId) -> Option<&FibEntry> {
        self.slots.get(id.0)?.as_ref()
    }

    fn slot_mut(&mut self, id: EntryId) -> Option<&mut FibEntry> {
        self.slots.get_mut(id.0)?.as_mut()
    }

    /// The `index`-th entry in insertion order.
    pub fn get(&self, index: usize) -> Option<&FibEntry> {
        self.entry(*self.order.get(index)?)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &FibEntry> {
        self.order.iter().filter_map(|&id| self.entry(id))
    }

    pub fn update_status(&mut self, prefix: &Name, face: FaceId, status: FaceStatus) -> bool {
        self.find_exact_mut(prefix)
            .map_or(false, |entry| entry.update_status(face, status))
    }

    pub fn update_rtt(&mut self, prefix: &Name, face: FaceId, sample: Duration) -> bool {
        self.find_exact_mut(prefix)
            .map_or(false, |entry| entry.update_rtt(face, sample))
    }

    /// Invalidates every entry.
    pub fn invalidate(&mut self) {
        for entry in self.slots.iter_mut().flatten() {
            entry.invalidate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn test_longest_prefix_match() {
        let mut fib = Fib::new();
        fib.add(n("/a"), FaceId(1), 1);
        fib.add(n("/a/b"), FaceId(2), 1);

        assert_eq!(fib.longest_prefix_match(&n("/a/b/c")).unwrap().prefix(), &n("/a/b"));
        assert_eq!(fib.longest_prefix_match(&n("/a/x")).unwrap().prefix(), &n("/a"));
        assert_eq!(fib.longest_prefix_match(&n("/a")).unwrap().prefix(), &n("/a"));
        assert!(fib.longest_prefix_match(&n("/b")).is_none());

        fib.add(Name::new(), FaceId(3), 1);
        assert_eq!(fib.longest_prefix_match(&n("/b")).unwrap().prefix(), &Name::new());
    }

    #[test]
    fn test_double_add_keeps_face_count() {
        let mut fib = Fib::new();
        let first = fib.add(n("/a"), FaceId(1), 10);
        let second = fib.add(n("/a"), FaceId(1), 3);
        assert_eq!(first, second);
        assert_eq!(fib.len(), 1);
        let entry = fib.find_exact(&n("/a")).unwrap();
        assert_eq!(entry.face_count(), 1);
        assert_eq!(entry.metric(FaceId(1)).unwrap().cost(), 3);
    }

    #[test]
    fn test_remove_from_all() {
        let mut fib = Fib::new();
        fib.add(n("/a"), FaceId(1), 1);
        fib.add(n("/a"), FaceId(2), 1);
        fib.add(n("/b"), FaceId(1), 1);
        fib.add(n("/c"), FaceId(2), 1);

        fib.remove_from_all(FaceId(1));

        assert_eq!(fib.len(), 2);
        assert!(fib.find_exact(&n("/b")).is_none());
        assert!(fib.iter().all(|e| e.metric(FaceId(1)).is_none()));
        assert_eq!(fib.find_exact(&n("/a")).unwrap().face_count(), 1);
    }

    #[test]
    fn test_remove_route() {
        let mut fib = Fib::new();
        fib.add(n("/a"), FaceId(1), 1);
        fib.add(n("/a"), FaceId(2), 1);
        assert!(fib.remove(&n("/a"), FaceId(1)));
        assert!(!fib.remove(&n("/a"), FaceId(1)));
        assert!(!fib.remove(&n("/zzz"), FaceId(1)));
        assert!(fib.remove(&n("/a"), FaceId(2)));
        assert!(fib.is_empty());
        assert!(fib.longest_prefix_match(&n("/a")).is_none());
    }

    #[test]
    fn test_index_enumeration_and_slot_reuse() {
        let mut fib = Fib::new();
        fib.add(n("/a"), FaceId(1), 1);
        fib.add(n("/b"), FaceId(1), 1);
        fib.add(n("/c"), FaceId(1), 1);
        fib.remove_prefix(&n("/a")).unwrap();
        fib.add(n("/d"), FaceId(1), 1);

        let prefixes: Vec<String> = (0..fib.len())
            .map(|i| fib.get(i).unwrap().prefix().to_string())
            .collect();
        assert_eq!(prefixes, vec!["/b", "/c", "/d"]);
        assert!(fib.get(3).is_none());
    }

    #[test]
    fn test_status_and_rtt_updates() {
        let mut fib = Fib::new();
        fib.add(n("/a"), FaceId(1), 1);
        assert!(fib.update_status(&n("/a"), FaceId(1), FaceStatus::Yellow));
        assert!(fib.update_rtt(&n("/a"), FaceId(1), Duration::from_millis(8)));
        assert!(!fib.update_status(&n("/b"), FaceId(1), FaceStatus::Red));

        let metric = fib.find_exact(&n("/a")).unwrap().metric(FaceId(1)).unwrap().clone();
        assert_eq!(metric.status(), FaceStatus::Yellow);
        assert_eq!(metric.srtt(), Some(Duration::from_millis(8)));

        fib.invalidate();
        assert_eq!(
            fib.find_exact(&n("/a")).unwrap().find_best_candidate(0).unwrap().status(),
            FaceStatus::Red
        );
    }
}
