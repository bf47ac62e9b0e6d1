//! The forwarding element.
//!
//! Owns the faces, the FIB, the PIT, the Content Store and the strategy
//! choice, and runs the Interest, Nack and Data pipelines. Everything happens synchronously inside
//! [`Forwarder::receive`] and [`Forwarder::run_until`]; the scheduler is the
//! only source of time.

use crate::attributes::{parse_value, Attributes};
use crate::config::ForwarderConfig;
use crate::cs::ContentStore;
use crate::error::Error;
use crate::face::{Face, FaceTable, Transport};
use crate::fib::{FaceStatus, Fib};
use crate::pit::Pit;
use crate::scheduler::{EventQueue, Scheduler, TimerId};
use crate::strategy::{ForwardingContext, Propagation, Strategy, StrategyChoice};
use log::{debug, info, trace, warn};
use rust_ndnfwd_common::metrics::ForwarderMetrics;
use rust_ndnfwd_common::{
    ContentObject, FaceId, FaceType, Interest, Name, NackType, Packet, PacketKind,
};
use std::collections::HashMap;
use std::time::Duration;

/// Timer events raised by the forwarder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwarderEvent {
    /// The PIT entry for this name reached its lifetime.
    PitExpire(Name),
}

/// What a protocol handler did with a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The handler took the packet; the forwarding pipeline skips it.
    Consumed,
    /// The packet continues through the forwarding pipeline.
    Continue,
}

/// Callback invoked for packets of one kind arriving on one face.
pub type ProtocolHandler = Box<dyn FnMut(FaceId, &Packet) -> Disposition>;

/// Which faces a re-propagation may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    /// Any face except the downstream ones.
    Any,
    /// Only faces the Interest was not yet sent on.
    Alternate,
}

enum Pending {
    Looped,
    Waiting {
        retransmission: bool,
        expires_at: Duration,
    },
}

pub struct Forwarder<S: Scheduler<ForwarderEvent> = EventQueue<ForwarderEvent>> {
    config: ForwarderConfig,
    faces: FaceTable,
    fib: Fib,
    pit: Pit,
    cs: ContentStore,
    strategies: StrategyChoice,
    scheduler: S,

    /// Protocol handlers keyed by packet kind and arrival face.
    handlers: HashMap<(PacketKind, FaceId), ProtocolHandler>,

    metrics: ForwarderMetrics,
}

impl Forwarder {
    /// Creates a forwarder driven by its own event queue.
    pub fn new(config: ForwarderConfig) -> Self {
        Self::with_scheduler(config, EventQueue::new())
    }
}

impl<S: Scheduler<ForwarderEvent>> Forwarder<S> {
    pub fn with_scheduler(config: ForwarderConfig, scheduler: S) -> Self {
        let mut strategies = StrategyChoice::new(config.strategy);
        for choice in &config.strategy_choices {
            strategies.set(choice.prefix.clone(), choice.strategy);
        }
        Self {
            pit: Pit::new(config.pit_max_entries),
            cs: ContentStore::new(config.cs_max_entries),
            config,
            faces: FaceTable::new(),
            fib: Fib::new(),
            strategies,
            scheduler,
            handlers: HashMap::new(),
            metrics: ForwarderMetrics::new(),
        }
    }

    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn metrics(&self) -> &ForwarderMetrics {
        &self.metrics
    }

    pub fn faces(&self) -> &FaceTable {
        &self.faces
    }

    pub fn face(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(id)
    }

    pub fn face_mut(&mut self, id: FaceId) -> Option<&mut Face> {
        self.faces.get_mut(id)
    }

    pub fn fib(&self) -> &Fib {
        &self.fib
    }

    pub fn fib_mut(&mut self) -> &mut Fib {
        &mut self.fib
    }

    pub fn pit(&self) -> &Pit {
        &self.pit
    }

    pub fn content_store(&self) -> &ContentStore {
        &self.cs
    }

    pub fn strategy_choice(&self) -> &StrategyChoice {
        &self.strategies
    }

    /* ------------------------------------------------------------ *
     * Faces, routes and handlers
     * ------------------------------------------------------------ */

    /// Registers a face, applying the configured face defaults.
    pub fn add_face(&mut self, face_type: FaceType, transport: Box<dyn Transport>) -> FaceId {
        let id = self.faces.add(face_type, transport);
        let defaults = &self.config.face;
        if let Some(face) = self.faces.get_mut(id) {
            if let Some(max) = defaults.bucket_max {
                face.set_bucket_max(max);
            }
            face.set_bucket_leak(defaults.bucket_leak);
            face.set_cost(PacketKind::Interest, defaults.interest_cost);
            face.set_cost(PacketKind::ContentObject, defaults.data_cost);
        }
        info!("[Forwarder] Added {} face {}", face_type, id);
        id
    }

    /// Marks the face down, purges it from the FIB and the PIT and drops it.
    pub fn remove_face(&mut self, id: FaceId) -> Result<(), Error> {
        let face = self.faces.get_mut(id).ok_or(Error::UnknownFace(id))?;
        face.set_up(false);

        self.fib.remove_from_all(id);
        for orphan in self.pit.remove_face(id) {
            if let Some(timer) = orphan.timer() {
                self.scheduler.cancel(timer);
            }
        }
        self.metrics.pit_size.set(self.pit.len() as u64);
        self.handlers.retain(|&(_, face), _| face != id);
        self.faces.remove(id);
        info!("[Forwarder] Removed face {}", id);
        Ok(())
    }

    pub fn add_route(&mut self, prefix: Name, face: FaceId, cost: i32) -> Result<(), Error> {
        if !self.faces.contains(face) {
            return Err(Error::UnknownFace(face));
        }
        self.fib.add(prefix, face, cost);
        Ok(())
    }

    pub fn remove_route(&mut self, prefix: &Name, face: FaceId) -> bool {
        self.fib.remove(prefix, face)
    }

    /// Installs the routes listed in the configuration. Every face they
    /// name must already exist.
    pub fn install_routes(&mut self) -> Result<usize, Error> {
        let routes = self.config.routes.clone();
        for route in &routes {
            self.add_route(route.prefix.clone(), route.face, route.cost)?;
        }
        Ok(routes.len())
    }

    pub fn set_strategy(&mut self, prefix: Name, strategy: Strategy) {
        debug!("[Forwarder] Strategy for {} is now {}", prefix, strategy);
        if prefix.is_empty() {
            self.config.strategy = strategy;
        }
        self.strategies.set(prefix, strategy);
    }

    /// Routes packets of `kind` arriving on `face` through `handler` before
    /// the forwarding pipeline. Replaces any previous handler.
    pub fn register_handler(&mut self, kind: PacketKind, face: FaceId, handler: ProtocolHandler) {
        self.handlers.insert((kind, face), handler);
    }

    pub fn unregister_handler(&mut self, kind: PacketKind, face: FaceId) -> bool {
        self.handlers.remove(&(kind, face)).is_some()
    }

    /* ------------------------------------------------------------ *
     * Entry points
     * ------------------------------------------------------------ */

    /// Processes a packet that arrived on `face`.
    ///
    /// Malformed packets are dropped and the decode error is returned.
    pub fn receive(&mut self, face_id: FaceId, packet: Packet) -> Result<(), Error> {
        let face = self.faces.get_mut(face_id).ok_or(Error::UnknownFace(face_id))?;
        let Some(packet) = face.receive(packet) else {
            return Ok(());
        };

        let kind = PacketKind::classify(packet.as_slice())?;
        trace!("[Forwarder] {} packet {} on {}", kind, packet.uid(), face_id);

        if let Some(handler) = self.handlers.get_mut(&(kind, face_id)) {
            if handler(face_id, &packet) == Disposition::Consumed {
                return Ok(());
            }
        }

        match kind {
            PacketKind::Interest => self.on_interest(face_id, packet),
            PacketKind::ContentObject => self.on_data(face_id, packet),
        }
    }

    /// Decodes a full packet serialization and processes it.
    pub fn receive_bytes(&mut self, face: FaceId, bytes: &[u8]) -> Result<(), Error> {
        let packet = Packet::from_wire(bytes)?;
        self.receive(face, packet)
    }

    /// Fires every timer due up to `time`, then moves the clock there.
    pub fn run_until(&mut self, time: Duration) {
        while let Some((id, event)) = self.scheduler.pop_due(time) {
            self.on_timer(id, event);
        }
        self.scheduler.advance_to(time);
    }

    pub fn advance(&mut self, delta: Duration) {
        let until = self.scheduler.now() + delta;
        self.run_until(until);
    }

    /* ------------------------------------------------------------ *
     * Interest pipeline
     * ------------------------------------------------------------ */

    fn on_interest(&mut self, in_face: FaceId, mut packet: Packet) -> Result<(), Error> {
        let interest = packet.remove_header::<Interest>()?;
        if interest.is_nack() {
            return self.on_nack(in_face, interest);
        }

        self.metrics.interests_received.increment();
        let now = self.scheduler.now();
        let name = interest.name.clone();
        debug!("[Forwarder] Interest {} nonce={} from {}", name, interest.nonce, in_face);

        let detect_retransmissions = self.config.detect_retransmissions;
        let pending = self.pit.lookup_mut(&name).map(|entry| {
            if !entry.add_nonce(interest.nonce) {
                return Pending::Looped;
            }
            let retransmission = !entry.add_incoming(in_face, interest.nonce);
            if retransmission && detect_retransmissions {
                entry.set_upstream_nonce(interest.nonce);
            }
            Pending::Waiting {
                retransmission,
                expires_at: entry.expires_at(),
            }
        });

        match pending {
            Some(Pending::Looped) => {
                debug!("[Forwarder] Duplicate nonce {} for {}, loop", interest.nonce, name);
                self.metrics.interests_dropped.increment();
                self.send_nack(in_face, &interest, NackType::NackLoop);
            }
            Some(Pending::Waiting {
                retransmission,
                expires_at,
            }) => {
                let new_expiry = now + interest.lifetime();
                if new_expiry > expires_at {
                    self.arm_expiry(&name, new_expiry);
                }
                if retransmission && detect_retransmissions {
                    debug!("[Forwarder] Retransmission of {} from {}", name, in_face);
                    self.propagate(&name, Retry::Any);
                } else {
                    trace!("[Forwarder] Aggregated {} from {}", name, in_face);
                    self.metrics.interests_aggregated.increment();
                }
            }
            None => {
                if !self.satisfy_from_store(in_face, &interest) {
                    self.create_and_forward(in_face, interest, now);
                }
            }
        }
        Ok(())
    }

    /// Answers `interest` with cached Data. Returns false on a miss.
    fn satisfy_from_store(&mut self, in_face: FaceId, interest: &Interest) -> bool {
        if !self.cs.is_enabled() {
            return false;
        }
        let Some(data) = self.cs.lookup(interest, self.scheduler.now()) else {
            self.metrics.cs_misses.increment();
            return false;
        };
        self.metrics.cs_hits.increment();
        debug!("[Forwarder] {} answered from the Content Store by {}", interest.name, data.name());
        if self.transmit(in_face, &data.to_packet()) {
            self.metrics.data_sent.increment();
        } else {
            debug!("[Forwarder] Could not deliver cached {} to {}", data.name(), in_face);
        }
        true
    }

    fn create_and_forward(&mut self, in_face: FaceId, interest: Interest, now: Duration) {
        let name = interest.name.clone();
        let Some(prefix) = self.fib.longest_prefix_match(&name).map(|e| e.prefix().clone()) else {
            debug!("[Forwarder] No route for {}", name);
            self.metrics.fib_misses.increment();
            self.metrics.interests_dropped.increment();
            self.send_nack(in_face, &interest, NackType::NackGiveupPit);
            return;
        };
        self.metrics.fib_hits.increment();

        let expires_at = now + interest.lifetime();
        if let Err(e) = self.pit.create(interest.clone(), prefix, in_face, expires_at) {
            warn!("[Forwarder] Cannot track {}: {}", name, e);
            self.metrics.interests_dropped.increment();
            self.send_nack(in_face, &interest, NackType::NackGiveupPit);
            return;
        }
        self.metrics.pit_size.set(self.pit.len() as u64);
        self.arm_expiry(&name, expires_at);
        self.propagate(&name, Retry::Any);
    }

    /// Hands the pending Interest to its strategy. When no face takes it and
    /// no upstream is still outstanding, the entry is given up.
    fn propagate(&mut self, name: &Name, retry: Retry) {
        let now = self.scheduler.now();
        let Some(entry) = self.pit.lookup(name) else {
            return;
        };

        let mut exclude: Vec<FaceId> = entry.incoming_faces().collect();
        if retry == Retry::Alternate {
            exclude.extend(entry.outgoing().iter().map(|r| r.face));
        }
        let packet = entry.interest().to_packet();
        let scope = entry.interest().scope;
        let fib_prefix = entry.fib_prefix().clone();
        let strategy = self.strategies.find(name);

        let ctx = ForwardingContext {
            exclude: &exclude,
            scope,
            now,
        };
        let outcome = match self.fib.find_exact(&fib_prefix) {
            Some(fib_entry) => strategy.propagate(fib_entry, &mut self.faces, &packet, &ctx),
            None => Propagation::default(),
        };

        for &face in &outcome.failed {
            warn!("[Forwarder] {} failed to transmit, marking RED for {}", face, fib_prefix);
            self.fib.update_status(&fib_prefix, face, FaceStatus::Red);
        }
        for &face in &outcome.revived {
            debug!("[Forwarder] RED {} took an Interest for {}, now YELLOW", face, fib_prefix);
            self.fib.update_status(&fib_prefix, face, FaceStatus::Yellow);
        }
        if outcome.congested {
            self.metrics.rate_limited.increment();
        }

        let Some(entry) = self.pit.lookup_mut(name) else {
            return;
        };
        if outcome.is_sent() {
            for &face in &outcome.sent {
                entry.record_outgoing(face, now);
            }
            debug!("[Forwarder] {} via {} -> {:?}", name, strategy, outcome.sent);
            self.metrics.interests_forwarded.add(outcome.sent.len() as u64);
        } else if !entry.has_pending_outgoing() {
            let reason = if outcome.congested {
                NackType::NackCongestion
            } else {
                NackType::NackGiveupPit
            };
            self.give_up(name, reason);
        }
    }

    /// Erases the entry and Nacks every downstream face.
    fn give_up(&mut self, name: &Name, reason: NackType) {
        let Some(entry) = self.pit.erase(name) else {
            return;
        };
        if let Some(timer) = entry.timer() {
            self.scheduler.cancel(timer);
        }
        self.metrics.pit_size.set(self.pit.len() as u64);
        self.metrics.interests_dropped.increment();
        debug!("[Forwarder] Giving up on {}: {}", name, reason);

        for record in entry.incoming() {
            let interest = entry.interest().clone().with_nonce(record.nonce);
            self.send_nack(record.face, &interest, reason);
        }
    }

    fn send_nack(&mut self, face_id: FaceId, interest: &Interest, nack_type: NackType) {
        if !self.config.nacks_enabled {
            return;
        }
        let packet = interest.to_nack(nack_type).to_packet();
        if self.transmit(face_id, &packet) {
            trace!("[Forwarder] {} for {} to {}", nack_type, interest.name, face_id);
            self.metrics.nacks_sent.increment();
        } else {
            debug!("[Forwarder] Could not send {} to {}", nack_type, face_id);
        }
    }

    /// Sends `packet` on `face_id` after draining its bucket up to now.
    fn transmit(&mut self, face_id: FaceId, packet: &Packet) -> bool {
        let now = self.scheduler.now();
        match self.faces.get_mut(face_id) {
            Some(face) => {
                face.leak_until(now);
                face.send(packet)
            }
            None => false,
        }
    }

    /// (Re)schedules the expiry of the entry for `name` at `at`.
    fn arm_expiry(&mut self, name: &Name, at: Duration) {
        let delay = at.saturating_sub(self.scheduler.now());
        let Some(entry) = self.pit.lookup_mut(name) else {
            return;
        };
        let timer = self
            .scheduler
            .schedule_after(delay, ForwarderEvent::PitExpire(name.clone()));
        entry.set_expires_at(at);
        if let Some(previous) = entry.set_timer(timer) {
            self.scheduler.cancel(previous);
        }
    }

    /* ------------------------------------------------------------ *
     * Nack pipeline
     * ------------------------------------------------------------ */

    fn on_nack(&mut self, in_face: FaceId, nack: Interest) -> Result<(), Error> {
        self.metrics.nacks_received.increment();
        let name = nack.name.clone();
        debug!("[Forwarder] {} for {} from {}", nack.nack_type, name, in_face);

        let Some(entry) = self.pit.lookup_mut(&name) else {
            debug!("[Forwarder] No pending Interest for Nack {}", name);
            return Ok(());
        };
        if !entry.has_nonce(nack.nonce) || !entry.mark_nacked(in_face) {
            debug!("[Forwarder] Stale Nack for {} from {}", name, in_face);
            return Ok(());
        }

        let fib_prefix = entry.fib_prefix().clone();
        self.fib.update_status(&fib_prefix, in_face, FaceStatus::Yellow);
        self.propagate(&name, Retry::Alternate);
        Ok(())
    }

    /* ------------------------------------------------------------ *
     * Data pipeline
     * ------------------------------------------------------------ */

    fn on_data(&mut self, in_face: FaceId, packet: Packet) -> Result<(), Error> {
        let data = ContentObject::from_packet(packet)?;
        self.metrics.data_received.increment();
        debug!("[Forwarder] Data {} from {}", data.name(), in_face);

        let now = self.scheduler.now();
        let matching = self.pit.matching(data.name());
        if matching.is_empty() {
            debug!("[Forwarder] Unsolicited Data {} from {}", data.name(), in_face);
            self.metrics.data_unsolicited.increment();
            if self.config.cache_unsolicited_data {
                self.cs.insert(data, now);
            }
            return Ok(());
        }

        let outgoing = data.to_packet();
        let mut delivered: Vec<FaceId> = Vec::new();

        for name in matching {
            let Some(entry) = self.pit.erase(&name) else {
                continue;
            };
            if let Some(timer) = entry.timer() {
                self.scheduler.cancel(timer);
            }

            if let Some(record) = entry.out_record(in_face) {
                let sample = now.saturating_sub(record.sent_at);
                self.fib.update_rtt(entry.fib_prefix(), in_face, sample);
                self.fib.update_status(entry.fib_prefix(), in_face, FaceStatus::Green);
                self.metrics.rtt_us.observe(sample.as_micros() as u64);
            }

            for face_id in entry.incoming_faces() {
                if face_id == in_face || delivered.contains(&face_id) {
                    continue;
                }
                delivered.push(face_id);
                if self.transmit(face_id, &outgoing) {
                    self.metrics.data_sent.increment();
                } else {
                    debug!("[Forwarder] Could not deliver {} to {}", name, face_id);
                }
            }
        }
        self.metrics.pit_size.set(self.pit.len() as u64);
        self.cs.insert(data, now);
        Ok(())
    }

    /* ------------------------------------------------------------ *
     * Timers
     * ------------------------------------------------------------ */

    fn on_timer(&mut self, id: TimerId, event: ForwarderEvent) {
        match event {
            ForwarderEvent::PitExpire(name) => {
                let current = self.pit.lookup(&name).and_then(|e| e.timer());
                if current != Some(id) {
                    return;
                }
                let Some(entry) = self.pit.erase(&name) else {
                    return;
                };
                debug!("[Forwarder] Interest {} expired", name);
                for record in entry.outgoing().iter().filter(|r| !r.nacked) {
                    self.fib
                        .update_status(entry.fib_prefix(), record.face, FaceStatus::Yellow);
                }
                self.metrics.interests_timed_out.increment();
                self.metrics.pit_size.set(self.pit.len() as u64);
            }
        }
    }
}

impl<S: Scheduler<ForwarderEvent>> Attributes for Forwarder<S> {
    fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), Error> {
        match name {
            "Strategy" => {
                let strategy = value.parse()?;
                self.set_strategy(Name::new(), strategy);
            }
            "NacksEnabled" => self.config.nacks_enabled = parse_value(name, value)?,
            "DetectRetransmissions" => self.config.detect_retransmissions = parse_value(name, value)?,
            "PitMaxEntries" => {
                let max = parse_value(name, value)?;
                self.config.pit_max_entries = max;
                self.pit.set_max_entries(max);
            }
            "CsMaxEntries" => {
                let max = parse_value(name, value)?;
                self.config.cs_max_entries = max;
                self.cs.set_max_entries(max);
            }
            "CacheUnsolicitedData" => self.config.cache_unsolicited_data = parse_value(name, value)?,
            _ => return Err(Error::UnknownAttribute(name.to_string())),
        }
        Ok(())
    }

    fn get_attribute(&self, name: &str) -> Result<String, Error> {
        Ok(match name {
            "Strategy" => self.strategies.default_strategy().to_string(),
            "NacksEnabled" => self.config.nacks_enabled.to_string(),
            "DetectRetransmissions" => self.config.detect_retransmissions.to_string(),
            "PitMaxEntries" => self.pit.max_entries().to_string(),
            "CsMaxEntries" => self.cs.max_entries().to_string(),
            "CacheUnsolicitedData" => self.config.cache_unsolicited_data.to_string(),
            _ => return Err(Error::UnknownAttribute(name.to_string())),
        })
    }
}
