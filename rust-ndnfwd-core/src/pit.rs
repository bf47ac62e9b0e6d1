//! Pending Interest Table.
//!
//! One entry per outstanding Interest name, remembering which faces asked
//! for it (so Data can flow back), which faces it was sent to (for RTT
//! samples and retries) and which nonces were seen (for loop detection).

use crate::error::Error;
use crate::scheduler::TimerId;
use log::trace;
use rust_ndnfwd_common::{FaceId, Interest, Name};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// A downstream face waiting for the Data, with the nonce it used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InRecord {
    pub face: FaceId,
    pub nonce: u32,
}

/// An upstream face the Interest was sent on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutRecord {
    pub face: FaceId,

    /// Time of the latest transmission on this face.
    pub sent_at: Duration,

    /// Transmissions after the first.
    pub retries: u32,

    /// The face answered with a Nack.
    pub nacked: bool,
}

#[derive(Debug, Clone)]
pub struct PitEntry {
    name: Name,

    /// Header of the Interest that created the entry.
    interest: Interest,

    /// Prefix of the FIB entry the Interest was routed through.
    fib_prefix: Name,

    incoming: Vec<InRecord>,
    outgoing: Vec<OutRecord>,
    nonces: HashSet<u32>,
    expires_at: Duration,

    /// Pending expiry timer.
    timer: Option<TimerId>,
}

impl PitEntry {
    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn interest(&self) -> &Interest {
        &self.interest
    }

    pub fn fib_prefix(&self) -> &Name {
        &self.fib_prefix
    }

    pub fn incoming(&self) -> &[InRecord] {
        &self.incoming
    }

    pub fn incoming_faces(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.incoming.iter().map(|r| r.face)
    }

    pub fn outgoing(&self) -> &[OutRecord] {
        &self.outgoing
    }

    /// Records `face` as waiting. Returns false if the face was already
    /// recorded, in which case only its nonce is refreshed.
    pub fn add_incoming(&mut self, face: FaceId, nonce: u32) -> bool {
        match self.incoming.iter_mut().find(|r| r.face == face) {
            Some(record) => {
                record.nonce = nonce;
                false
            }
            None => {
                self.incoming.push(InRecord { face, nonce });
                true
            }
        }
    }

    pub fn has_nonce(&self, nonce: u32) -> bool {
        self.nonces.contains(&nonce)
    }

    /// Returns false if the nonce was already seen.
    pub fn add_nonce(&mut self, nonce: u32) -> bool {
        self.nonces.insert(nonce)
    }

    /// Sets the nonce carried by later upstream transmissions. Upstream
    /// faces remember the previous one and would Nack a resend as a loop.
    pub fn set_upstream_nonce(&mut self, nonce: u32) {
        self.interest.nonce = nonce;
    }

    pub fn out_record(&self, face: FaceId) -> Option<&OutRecord> {
        self.outgoing.iter().find(|r| r.face == face)
    }

    pub fn record_outgoing(&mut self, face: FaceId, now: Duration) {
        match self.outgoing.iter_mut().find(|r| r.face == face) {
            Some(record) => {
                record.sent_at = now;
                record.retries += 1;
                record.nacked = false;
            }
            None => self.outgoing.push(OutRecord {
                face,
                sent_at: now,
                retries: 0,
                nacked: false,
            }),
        }
    }

    /// Returns false if the Interest was never sent on `face`.
    pub fn mark_nacked(&mut self, face: FaceId) -> bool {
        match self.outgoing.iter_mut().find(|r| r.face == face) {
            Some(record) => {
                record.nacked = true;
                true
            }
            None => false,
        }
    }

    /// Whether some upstream face may still answer.
    pub fn has_pending_outgoing(&self) -> bool {
        self.outgoing.iter().any(|r| !r.nacked)
    }

    pub fn expires_at(&self) -> Duration {
        self.expires_at
    }

    pub fn set_expires_at(&mut self, at: Duration) {
        self.expires_at = at;
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    /// Replaces the expiry timer, returning the previous one.
    pub fn set_timer(&mut self, timer: TimerId) -> Option<TimerId> {
        self.timer.replace(timer)
    }

    fn remove_face(&mut self, face: FaceId) {
        self.incoming.retain(|r| r.face != face);
        self.outgoing.retain(|r| r.face != face);
    }
}

#[derive(Debug, Default)]
pub struct Pit {
    entries: HashMap<Name, PitEntry>,

    /// Capacity, 0 for unlimited.
    max_entries: usize,
}

impl Pit {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn set_max_entries(&mut self, max_entries: usize) {
        self.max_entries = max_entries;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, name: &Name) -> Option<&PitEntry> {
        self.entries.get(name)
    }

    pub fn lookup_mut(&mut self, name: &Name) -> Option<&mut PitEntry> {
        self.entries.get_mut(name)
    }

    /// Creates the entry for `interest` arriving on `in_face`, replacing any
    /// existing entry of the same name.
    pub fn create(
        &mut self,
        interest: Interest,
        fib_prefix: Name,
        in_face: FaceId,
        expires_at: Duration,
    ) -> Result<&mut PitEntry, Error> {
        let name = interest.name.clone();
        if self.max_entries > 0
            && self.entries.len() >= self.max_entries
            && !self.entries.contains_key(&name)
        {
            return Err(Error::PitFull(self.max_entries));
        }

        trace!("[PIT] Creating entry {} from {}", name, in_face);
        let nonce = interest.nonce;
        let entry = PitEntry {
            name: name.clone(),
            nonces: HashSet::from([nonce]),
            interest,
            fib_prefix,
            incoming: vec![InRecord {
                face: in_face,
                nonce,
            }],
            outgoing: Vec::new(),
            expires_at,
            timer: None,
        };
        Ok(match self.entries.entry(name) {
            Entry::Occupied(mut slot) => {
                slot.insert(entry);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(entry),
        })
    }

    /// Names of all entries whose name is a prefix of `data_name`, longest first.
    pub fn matching(&self, data_name: &Name) -> Vec<Name> {
        (0..=data_name.len())
            .rev()
            .map(|k| data_name.prefix(k))
            .filter(|prefix| self.entries.contains_key(prefix))
            .collect()
    }

    /// The longest entry name that is a prefix of `data_name`.
    pub fn find_matching(&self, data_name: &Name) -> Option<&PitEntry> {
        (0..=data_name.len())
            .rev()
            .find_map(|k| self.entries.get(&data_name.prefix(k)))
    }

    pub fn erase(&mut self, name: &Name) -> Option<PitEntry> {
        self.entries.remove(name)
    }

    /// Forgets `face` everywhere. Entries left with nobody to answer are
    /// erased and returned so their timers can be cancelled.
    pub fn remove_face(&mut self, face: FaceId) -> Vec<PitEntry> {
        for entry in self.entries.values_mut() {
            entry.remove_face(face);
        }
        let orphaned: Vec<Name> = self
            .entries
            .iter()
            .filter(|(_, e)| e.incoming.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        orphaned
            .iter()
            .filter_map(|name| self.entries.remove(name))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PitEntry> {
        self.entries.values()
    }
}
