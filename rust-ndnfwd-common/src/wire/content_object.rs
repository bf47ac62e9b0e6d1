//! ContentObject header and trailer.
//!
//! A ContentObject travels as `[header][payload][trailer]`:
//!
//! ```text
//! header  = [0x06][Name][Timestamp ms:64][Freshness ms:32]
//! trailer = [0x00][0x00]
//! ```

use super::{read_name, PacketKind};
use crate::error::Error;
use crate::name::Name;
use crate::packet::{Header, Packet, Trailer};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Closing marker written after the payload.
const TRAILER_MARKER: [u8; 2] = [0x00, 0x00];

const TAIL_TYPE_ID: u16 = 0x0100 | PacketKind::ContentObject as u16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentObjectHeader {
    pub name: Name,

    /// Production time, milliseconds on the producer's clock.
    pub timestamp_ms: u64,

    /// How long caches may consider the content fresh.
    pub freshness_ms: u32,
}

impl ContentObjectHeader {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            timestamp_ms: 0,
            freshness_ms: 0,
        }
    }

    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp_ms = timestamp.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness_ms = freshness.as_millis().min(u32::MAX as u128) as u32;
        self
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_millis(self.freshness_ms as u64)
    }
}

impl Header for ContentObjectHeader {
    const TYPE_ID: u16 = PacketKind::ContentObject as u16;

    fn serialized_size(&self) -> usize {
        1 + self.name.encoded_len() + 8 + 4
    }

    fn serialize(&self, buf: &mut BytesMut) {
        buf.put_u8(PacketKind::ContentObject as u8);
        self.name.encode(buf);
        buf.put_u64(self.timestamp_ms);
        buf.put_u32(self.freshness_ms);
    }

    fn deserialize(buf: &[u8]) -> Result<(Self, usize), Error> {
        let mut rd = buf;
        if !rd.has_remaining() || rd.get_u8() != PacketKind::ContentObject as u8 {
            return Err(Error::HeaderFormat("not a ContentObject".into()));
        }
        let name = read_name(&mut rd, "name")?;
        if rd.remaining() < 12 {
            return Err(Error::HeaderFormat(
                "truncated ContentObject: missing timestamp/freshness".into(),
            ));
        }
        let timestamp_ms = rd.get_u64();
        let freshness_ms = rd.get_u32();
        let header = Self {
            name,
            timestamp_ms,
            freshness_ms,
        };
        Ok((header, buf.len() - rd.len()))
    }
}

/// Closing marker of a ContentObject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentObjectTail;

impl Trailer for ContentObjectTail {
    const TYPE_ID: u16 = TAIL_TYPE_ID;

    fn serialized_size(&self) -> usize {
        TRAILER_MARKER.len()
    }

    fn serialize(&self, buf: &mut BytesMut) {
        buf.put_slice(&TRAILER_MARKER);
    }

    fn deserialize(buf: &[u8]) -> Result<(Self, usize), Error> {
        match buf.len().checked_sub(TRAILER_MARKER.len()) {
            Some(at) if buf[at..] == TRAILER_MARKER => Ok((ContentObjectTail, TRAILER_MARKER.len())),
            Some(_) => Err(Error::HeaderFormat("bad ContentObject trailer marker".into())),
            None => Err(Error::HeaderFormat("truncated ContentObject trailer".into())),
        }
    }
}

/// A ContentObject: header fields plus the opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentObject {
    pub header: ContentObjectHeader,
    pub payload: Bytes,
}

impl ContentObject {
    pub fn new(name: Name, payload: impl Into<Bytes>) -> Self {
        Self {
            header: ContentObjectHeader::new(name),
            payload: payload.into(),
        }
    }

    pub fn name(&self) -> &Name {
        &self.header.name
    }

    /// Builds `[header][payload][trailer]`.
    pub fn to_packet(&self) -> Packet {
        let mut packet = Packet::with_payload(&self.payload);
        packet.add_header(&self.header);
        packet.add_trailer(&ContentObjectTail);
        packet
    }

    /// Strips header and trailer from `packet`; what remains is the payload.
    pub fn from_packet(mut packet: Packet) -> Result<Self, Error> {
        let header = packet.remove_header::<ContentObjectHeader>()?;
        packet.remove_trailer::<ContentObjectTail>()?;
        Ok(Self {
            header,
            payload: packet.to_bytes(),
        })
    }
}
