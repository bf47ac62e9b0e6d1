//! Faces: the forwarder's send/receive endpoints.
//!
//! A face wraps a [`Transport`] that moves bytes to a device or an
//! in-process application, and guards it with a [`LeakyBucket`]. The
//! forwarder owns every face in a [`FaceTable`] and refers to them by
//! [`FaceId`].

use crate::attributes::{parse_value, Attributes};
use crate::error::Error;
use crate::limiter::LeakyBucket;
use log::{debug, trace, warn};
use rust_ndnfwd_common::{FaceId, FaceType, Packet, PacketKind};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// Moves serialized packets to the other side of a face.
pub trait Transport {
    /// Returns false if the bytes could not be handed to the device.
    fn transmit(&mut self, bytes: &[u8], destination: Option<&str>) -> bool;
}

/// Creates a connected pair: the transport goes into an application face,
/// the handle stays with the application and collects what the forwarder sends.
pub fn app_channel() -> (AppTransport, AppHandle) {
    let inbox = Rc::new(RefCell::new(VecDeque::new()));
    (
        AppTransport {
            inbox: Rc::clone(&inbox),
        },
        AppHandle { inbox },
    )
}

/// Transport of an application face: decodes and queues each packet.
#[derive(Debug)]
pub struct AppTransport {
    inbox: Rc<RefCell<VecDeque<Packet>>>,
}

impl Transport for AppTransport {
    fn transmit(&mut self, bytes: &[u8], _destination: Option<&str>) -> bool {
        match Packet::from_wire(bytes) {
            Ok(packet) => {
                self.inbox.borrow_mut().push_back(packet);
                true
            }
            Err(e) => {
                warn!("[AppTransport] Dropping undecodable packet: {}", e);
                false
            }
        }
    }
}

/// Application side of an [`app_channel`].
#[derive(Debug, Clone)]
pub struct AppHandle {
    inbox: Rc<RefCell<VecDeque<Packet>>>,
}

impl AppHandle {
    /// Takes the oldest packet delivered to the application.
    pub fn recv(&self) -> Option<Packet> {
        self.inbox.borrow_mut().pop_front()
    }

    pub fn drain(&self) -> Vec<Packet> {
        self.inbox.borrow_mut().drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.inbox.borrow().len()
    }
}

/// Per-face traffic counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FaceCounters {
    pub in_interests: u64,
    pub in_data: u64,
    pub out_interests: u64,
    pub out_data: u64,

    /// Sends refused because the face was down or over its limit.
    pub refused: u64,

    /// Sends the transport rejected.
    pub tx_failures: u64,

    /// Packets received while the face was down.
    pub rx_dropped: u64,
}

pub struct Face {
    /// Identifier assigned by the face table
    id: FaceId,

    face_type: FaceType,

    /// Whether the face may carry traffic
    up: bool,

    /// Address handed to the transport with every packet
    remote: Option<String>,

    bucket: LeakyBucket,

    /// Bucket units consumed by one Interest
    interest_cost: f64,

    /// Bucket units consumed by one ContentObject
    data_cost: f64,

    transport: Box<dyn Transport>,

    counters: FaceCounters,
}

impl Face {
    pub fn new(id: FaceId, face_type: FaceType, transport: Box<dyn Transport>) -> Self {
        Self {
            id,
            face_type,
            up: true,
            remote: None,
            bucket: LeakyBucket::unlimited(),
            interest_cost: 1.0,
            data_cost: 1.0,
            transport,
            counters: FaceCounters::default(),
        }
    }

    pub fn id(&self) -> FaceId {
        self.id
    }

    pub fn face_type(&self) -> FaceType {
        self.face_type
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    pub fn set_up(&mut self, up: bool) {
        if self.up != up {
            debug!("[Face {}] {}", self.id, if up { "up" } else { "down" });
        }
        self.up = up;
    }

    pub fn remote(&self) -> Option<&str> {
        self.remote.as_deref()
    }

    pub fn set_remote(&mut self, remote: impl Into<String>) {
        self.remote = Some(remote.into());
    }

    pub fn bucket(&self) -> &LeakyBucket {
        &self.bucket
    }

    pub fn set_bucket_max(&mut self, capacity: f64) {
        self.bucket.set_max(capacity);
    }

    pub fn set_bucket_leak(&mut self, rate: f64) {
        self.bucket.set_leak_rate(rate);
    }

    /// Sets the bucket cost of one packet of `kind`.
    pub fn set_cost(&mut self, kind: PacketKind, cost: f64) {
        match kind {
            PacketKind::Interest => self.interest_cost = cost,
            PacketKind::ContentObject => self.data_cost = cost,
        }
    }

    pub fn cost(&self, kind: PacketKind) -> f64 {
        match kind {
            PacketKind::Interest => self.interest_cost,
            PacketKind::ContentObject => self.data_cost,
        }
    }

    pub fn leak(&mut self, interval: Duration) {
        self.bucket.leak(interval);
    }

    pub fn leak_until(&mut self, now: Duration) {
        self.bucket.leak_until(now);
    }

    pub fn is_below_limit(&self) -> bool {
        self.bucket.is_below_limit()
    }

    /// Whether a send would be attempted right now.
    pub fn can_send(&self) -> bool {
        self.up && self.is_below_limit()
    }

    /// Transmits `packet` if the face is up and below its limit.
    ///
    /// Returns false when the face refused the packet or the transport failed;
    /// the bucket is only charged for packets actually transmitted.
    pub fn send(&mut self, packet: &Packet) -> bool {
        if !self.can_send() {
            self.counters.refused += 1;
            trace!("[Face {}] Refusing packet {} (up={}, level={})",
                self.id, packet.uid(), self.up, self.bucket.level());
            return false;
        }

        let kind = match PacketKind::classify(packet.as_slice()) {
            Ok(kind) => kind,
            Err(e) => {
                warn!("[Face {}] Not sending unclassifiable packet {}: {}", self.id, packet.uid(), e);
                return false;
            }
        };

        let wire = packet.to_wire();
        if !self.transport.transmit(&wire, self.remote.as_deref()) {
            self.counters.tx_failures += 1;
            debug!("[Face {}] Transport rejected {} packet {}", self.id, kind, packet.uid());
            return false;
        }

        self.bucket.fill(self.cost(kind));
        match kind {
            PacketKind::Interest => self.counters.out_interests += 1,
            PacketKind::ContentObject => self.counters.out_data += 1,
        }
        trace!("[Face {}] Sent {} packet {} ({} bytes)", self.id, kind, packet.uid(), wire.len());
        true
    }

    /// Accepts a packet from the transport side. Packets arriving on a down
    /// face are dropped; everything else is returned for the upstream handler.
    pub fn receive(&mut self, packet: Packet) -> Option<Packet> {
        if !self.up {
            self.counters.rx_dropped += 1;
            debug!("[Face {}] Dropping packet {} received while down", self.id, packet.uid());
            return None;
        }
        match PacketKind::classify(packet.as_slice()) {
            Ok(PacketKind::Interest) => self.counters.in_interests += 1,
            Ok(PacketKind::ContentObject) => self.counters.in_data += 1,
            Err(_) => {}
        }
        Some(packet)
    }

    pub fn counters(&self) -> &FaceCounters {
        &self.counters
    }
}

impl fmt::Debug for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Face")
            .field("id", &self.id)
            .field("face_type", &self.face_type)
            .field("up", &self.up)
            .field("remote", &self.remote)
            .field("bucket", &self.bucket)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl Attributes for Face {
    fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), Error> {
        match name {
            "Up" => self.set_up(parse_value(name, value)?),
            "BucketMax" => self.set_bucket_max(parse_value(name, value)?),
            "BucketLeak" => self.set_bucket_leak(parse_value(name, value)?),
            "InterestCost" => self.interest_cost = parse_value(name, value)?,
            "DataCost" => self.data_cost = parse_value(name, value)?,
            "RemoteAddress" => self.set_remote(value),
            _ => return Err(Error::UnknownAttribute(name.to_string())),
        }
        Ok(())
    }

    fn get_attribute(&self, name: &str) -> Result<String, Error> {
        Ok(match name {
            "Id" => self.id.0.to_string(),
            "Type" => self.face_type.to_string(),
            "Up" => self.up.to_string(),
            "BucketMax" => self.bucket.max().to_string(),
            "BucketLeak" => self.bucket.leak_rate().to_string(),
            "InterestCost" => self.interest_cost.to_string(),
            "DataCost" => self.data_cost.to_string(),
            "RemoteAddress" => self.remote.clone().unwrap_or_default(),
            _ => return Err(Error::UnknownAttribute(name.to_string())),
        })
    }
}

/// Arena of faces indexed by [`FaceId`]. Ids are never reused.
#[derive(Debug, Default)]
pub struct FaceTable {
    slots: Vec<Option<Face>>,
}

impl FaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new face and returns its id.
    pub fn add(&mut self, face_type: FaceType, transport: Box<dyn Transport>) -> FaceId {
        let id = FaceId(self.slots.len() as u32);
        self.slots.push(Some(Face::new(id, face_type, transport)));
        id
    }

    /// Marks the face down and drops it from the table.
    pub fn remove(&mut self, id: FaceId) -> Option<Face> {
        let mut face = self.slots.get_mut(id.0 as usize)?.take()?;
        face.set_up(false);
        Some(face)
    }

    pub fn get(&self, id: FaceId) -> Option<&Face> {
        self.slots.get(id.0 as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: FaceId) -> Option<&mut Face> {
        self.slots.get_mut(id.0 as usize)?.as_mut()
    }

    pub fn contains(&self, id: FaceId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Face> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Face> {
        self.slots.iter_mut().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ndnfwd_common::{ContentObject, Interest, Name};

    fn interest() -> Packet {
        Interest::new("/a".parse::<Name>().unwrap()).with_nonce(1).to_packet()
    }

    struct Refusing;

    impl Transport for Refusing {
        fn transmit(&mut self, _bytes: &[u8], _destination: Option<&str>) -> bool {
            false
        }
    }

    #[test]
    fn test_app_face_delivers_packets() {
        let (transport, app) = app_channel();
        let mut face = Face::new(FaceId(0), FaceType::App, Box::new(transport));

        assert!(face.send(&interest()));
        let data = ContentObject::new(Name::new(), &b"x"[..]).to_packet();
        assert!(face.send(&data));

        assert_eq!(app.pending(), 2);
        let first = app.recv().unwrap();
        assert_eq!(first.as_slice(), interest().as_slice());
        assert_eq!(first.metadata().items().len(), 1);
        assert_eq!(face.counters().out_interests, 1);
        assert_eq!(face.counters().out_data, 1);
    }

    #[test]
    fn test_rate_limited_face_refuses() {
        let (transport, app) = app_channel();
        let mut face = Face::new(FaceId(0), FaceType::NetDevice, Box::new(transport));
        face.set_bucket_max(10.0);
        face.set_bucket_leak(1.0);

        for _ in 0..10 {
            assert!(face.send(&interest()));
        }
        assert!(!face.is_below_limit());
        assert!(!face.send(&interest()));
        assert_eq!(app.pending(), 10);
        assert_eq!(face.counters().refused, 1);

        face.leak_until(Duration::from_secs(10));
        assert!(face.is_below_limit());
        assert!(face.send(&interest()));
    }

    #[test]
    fn test_per_kind_cost() {
        let (transport, _app) = app_channel();
        let mut face = Face::new(FaceId(0), FaceType::NetDevice, Box::new(transport));
        face.set_bucket_max(3.0);
        face.set_cost(PacketKind::Interest, 2.5);
        assert!(face.send(&interest()));
        assert!(face.send(&interest()));
        assert!(!face.is_below_limit());
    }

    #[test]
    fn test_down_face() {
        let (transport, app) = app_channel();
        let mut face = Face::new(FaceId(3), FaceType::NetDevice, Box::new(transport));
        face.set_up(false);
        assert!(!face.send(&interest()));
        assert!(face.receive(interest()).is_none());
        assert_eq!(app.pending(), 0);
        assert_eq!(face.counters().rx_dropped, 1);

        face.set_up(true);
        assert!(face.receive(interest()).is_some());
        assert_eq!(face.counters().in_interests, 1);
    }

    #[test]
    fn test_transport_failure_does_not_charge_bucket() {
        let mut face = Face::new(FaceId(0), FaceType::NetDevice, Box::new(Refusing));
        face.set_bucket_max(1.0);
        assert!(!face.send(&interest()));
        assert_eq!(face.bucket().level(), 0.0);
        assert_eq!(face.counters().tx_failures, 1);
    }

    #[test]
    fn test_attributes() {
        let (transport, _app) = app_channel();
        let mut face = Face::new(FaceId(0), FaceType::App, Box::new(transport));
        face.set_attribute("BucketMax", "25").unwrap();
        face.set_attribute("BucketLeak", "2.5").unwrap();
        face.set_attribute("Up", "false").unwrap();
        assert_eq!(face.get_attribute("BucketMax").unwrap(), "25");
        assert_eq!(face.get_attribute("BucketLeak").unwrap(), "2.5");
        assert_eq!(face.get_attribute("Type").unwrap(), "app");
        assert!(!face.is_up());

        assert!(matches!(face.set_attribute("Mtu", "1500"), Err(Error::UnknownAttribute(_))));
        assert!(matches!(
            face.set_attribute("BucketMax", "lots"),
            Err(Error::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_face_table_ids_not_reused() {
        let mut table = FaceTable::new();
        let a = table.add(FaceType::App, Box::new(Refusing));
        let b = table.add(FaceType::NetDevice, Box::new(Refusing));
        let removed = table.remove(a).unwrap();
        assert!(!removed.is_up());
        let c = table.add(FaceType::NetDevice, Box::new(Refusing));
        assert_ne!(c, a);
        assert_ne!(c, b);
        assert_eq!(table.len(), 2);
        assert!(table.get(a).is_none());
    }
}
