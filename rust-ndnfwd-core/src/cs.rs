//! Content Store.
//!
//! A bounded cache of Data. An Interest is answered from the store when a
//! cached name extends the Interest name and the Interest selectors accept
//! it. When the store is full the least recently used entry goes. Data with
//! a freshness period stops matching once that period has run out.

use log::trace;
use rust_ndnfwd_common::{ContentObject, Interest, Name};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone)]
struct CsEntry {
    data: ContentObject,

    /// Set when the Data carries a freshness period.
    stale_at: Option<Duration>,

    /// Recency stamp used for eviction.
    last_used: u64,
}

impl CsEntry {
    fn is_fresh(&self, now: Duration) -> bool {
        self.stale_at.map_or(true, |at| now < at)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    max_entries: usize,

    /// Ordered by name, so every extension of a name follows it directly.
    entries: BTreeMap<Name, CsEntry>,

    clock: u64,
}

impl ContentStore {
    /// A store holding at most `max_entries` Data. 0 disables caching.
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            entries: BTreeMap::new(),
            clock: 0,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Changes the capacity, evicting right away if the store is over it.
    pub fn set_max_entries(&mut self, max_entries: usize) {
        self.max_entries = max_entries;
        while self.entries.len() > max_entries {
            self.evict();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_entries > 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.entries.contains_key(name)
    }

    /// Caches `data`, replacing any entry of the same name. Returns false
    /// when caching is disabled.
    pub fn insert(&mut self, data: ContentObject, now: Duration) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let name = data.name().clone();
        if !self.entries.contains_key(&name) && self.entries.len() >= self.max_entries {
            self.evict();
        }

        let freshness = data.header.freshness();
        let stale_at = (!freshness.is_zero()).then(|| now + freshness);
        self.clock += 1;
        trace!("[CS] Caching {}", name);
        self.entries.insert(
            name,
            CsEntry {
                data,
                stale_at,
                last_used: self.clock,
            },
        );
        true
    }

    /// Finds fresh Data answering `interest`. With the child selector set
    /// the rightmost match wins, otherwise the leftmost.
    pub fn lookup(&mut self, interest: &Interest, now: Duration) -> Option<ContentObject> {
        let prefix = &interest.name;
        let mut candidates = self
            .entries
            .range(prefix.clone()..)
            .take_while(|(name, _)| prefix.is_prefix_of(name))
            .filter(|(name, entry)| entry.is_fresh(now) && selectors_accept(interest, name))
            .map(|(name, _)| name);
        let chosen = if interest.child_selector {
            candidates.last()
        } else {
            candidates.next()
        }?
        .clone();

        self.clock += 1;
        let entry = self.entries.get_mut(&chosen)?;
        entry.last_used = self.clock;
        Some(entry.data.clone())
    }

    pub fn remove(&mut self, name: &Name) -> Option<ContentObject> {
        self.entries.remove(name).map(|entry| entry.data)
    }

    fn evict(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(name, _)| name.clone());
        if let Some(name) = victim {
            trace!("[CS] Evicting {}", name);
            self.entries.remove(&name);
        }
    }
}

/// Suffix-count and exclude checks of `interest` against a cached `name`
/// that the Interest name is a prefix of.
fn selectors_accept(interest: &Interest, name: &Name) -> bool {
    let suffix = name.len().saturating_sub(interest.name.len()) as u64;
    if interest
        .min_suffix_components
        .is_some_and(|min| suffix < u64::from(min))
    {
        return false;
    }
    if interest
        .max_suffix_components
        .is_some_and(|max| suffix > u64::from(max))
    {
        return false;
    }
    match (&interest.exclude, name.get(interest.name.len())) {
        (Some(exclude), Some(next)) => !exclude.components().any(|c| c == next),
        _ => true,
    }
}
