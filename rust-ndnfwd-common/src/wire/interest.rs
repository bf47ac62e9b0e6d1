//! Interest header.
//!
//! Field layout, big-endian:
//!
//! ```text
//! [Name][Nonce:32][ScopePresent:8][Scope:8]?[Lifetime ms:32]
//! [MinPresent:8][MinSuffix:32]?[MaxPresent:8][MaxSuffix:32]?
//! [ExcludePresent:8][Exclude Name]?[Flags:8][NackType:32]
//! ```
//!
//! On top of that layout the header is framed by a leading packet-kind byte
//! (`0x05`, see [`PacketKind`]) so a receiver can tell Interests from
//! ContentObjects before parsing either.

use super::{read_name, NackType, PacketKind};
use crate::error::Error;
use crate::name::Name;
use crate::packet::{Header, Packet};
use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Interest lifetime.
pub const DEFAULT_LIFETIME_MS: u32 = 4000;

const FLAG_CHILD_SELECTOR: u8 = 0x01;
const FLAG_ANSWER_ORIGIN_KIND: u8 = 0x02;
const KNOWN_FLAGS: u8 = FLAG_CHILD_SELECTOR | FLAG_ANSWER_ORIGIN_KIND;

/// Represents an Interest packet header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interest {
    /// The name requested in the Interest.
    pub name: Name,

    /// Random value used for loop and duplicate detection.
    pub nonce: u32,

    /// Limits how far the Interest may travel.
    pub scope: Option<u8>,

    /// Interest lifetime in milliseconds.
    pub lifetime_ms: u32,

    /// Minimum number of components the answer may have beyond the name.
    pub min_suffix_components: Option<u32>,

    pub max_suffix_components: Option<u32>,

    /// Components a matching answer must not carry right after the name.
    pub exclude: Option<Name>,

    pub child_selector: bool,

    pub answer_origin_kind: bool,

    /// Non-normal values turn the Interest into a negative acknowledgement.
    pub nack_type: NackType,
}

impl Interest {
    /// Creates a new Interest with a random nonce.
    pub fn new(name: Name) -> Self {
        Self {
            name,
            nonce: rand::random(),
            scope: None,
            lifetime_ms: DEFAULT_LIFETIME_MS,
            min_suffix_components: None,
            max_suffix_components: None,
            exclude: None,
            child_selector: false,
            answer_origin_kind: false,
            nack_type: NackType::NormalInterest,
        }
    }

    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn with_scope(mut self, scope: u8) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime_ms = lifetime.as_millis().min(u32::MAX as u128) as u32;
        self
    }

    pub fn with_suffix_components(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.min_suffix_components = min;
        self.max_suffix_components = max;
        self
    }

    pub fn with_exclude(mut self, exclude: Name) -> Self {
        self.exclude = Some(exclude);
        self
    }

    pub fn with_child_selector(mut self, enabled: bool) -> Self {
        self.child_selector = enabled;
        self
    }

    pub fn with_answer_origin_kind(mut self, enabled: bool) -> Self {
        self.answer_origin_kind = enabled;
        self
    }

    pub fn with_nack(mut self, nack_type: NackType) -> Self {
        self.nack_type = nack_type;
        self
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_millis(self.lifetime_ms as u64)
    }

    pub fn is_nack(&self) -> bool {
        self.nack_type != NackType::NormalInterest
    }

    /// Same Interest turned into a Nack of the given kind.
    pub fn to_nack(&self, nack_type: NackType) -> Self {
        self.clone().with_nack(nack_type)
    }

    /// Wraps the header into a fresh packet.
    pub fn to_packet(&self) -> Packet {
        let mut packet = Packet::new();
        packet.add_header(self);
        packet
    }

    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.child_selector {
            flags |= FLAG_CHILD_SELECTOR;
        }
        if self.answer_origin_kind {
            flags |= FLAG_ANSWER_ORIGIN_KIND;
        }
        flags
    }
}

impl Header for Interest {
    const TYPE_ID: u16 = PacketKind::Interest as u16;

    fn serialized_size(&self) -> usize {
        1 + self.name.encoded_len()
            + 4
            + 1
            + self.scope.map_or(0, |_| 1)
            + 4
            + optional_u32_size(self.min_suffix_components)
            + optional_u32_size(self.max_suffix_components)
            + 1
            + self.exclude.as_ref().map_or(0, Name::encoded_len)
            + 1
            + 4
    }

    fn serialize(&self, buf: &mut BytesMut) {
        buf.put_u8(PacketKind::Interest as u8);
        self.name.encode(buf);
        buf.put_u32(self.nonce);
        match self.scope {
            Some(scope) => {
                buf.put_u8(1);
                buf.put_u8(scope);
            }
            None => buf.put_u8(0),
        }
        buf.put_u32(self.lifetime_ms);
        put_optional_u32(buf, self.min_suffix_components);
        put_optional_u32(buf, self.max_suffix_components);
        match &self.exclude {
            Some(exclude) => {
                buf.put_u8(1);
                exclude.encode(buf);
            }
            None => buf.put_u8(0),
        }
        buf.put_u8(self.flags());
        buf.put_u32(self.nack_type as u32);
    }

    fn deserialize(buf: &[u8]) -> Result<(Self, usize), Error> {
        let mut rd = buf;

        let marker = take_u8(&mut rd, "packet kind")?;
        if marker != PacketKind::Interest as u8 {
            return Err(Error::HeaderFormat(format!("not an Interest (kind 0x{marker:02x})")));
        }
        let name = read_name(&mut rd, "name")?;
        let nonce = take_u32(&mut rd, "nonce")?;
        let scope = match take_u8(&mut rd, "scope presence")? {
            0 => None,
            1 => Some(take_u8(&mut rd, "scope")?),
            other => return Err(Error::HeaderFormat(format!("bad scope presence {other}"))),
        };
        let lifetime_ms = take_u32(&mut rd, "lifetime")?;
        let min_suffix_components = take_optional_u32(&mut rd, "min suffix components")?;
        let max_suffix_components = take_optional_u32(&mut rd, "max suffix components")?;
        let exclude = match take_u8(&mut rd, "exclude presence")? {
            0 => None,
            1 => Some(read_name(&mut rd, "exclude")?),
            other => return Err(Error::HeaderFormat(format!("bad exclude presence {other}"))),
        };
        let flags = take_u8(&mut rd, "flags")?;
        if flags & !KNOWN_FLAGS != 0 {
            return Err(Error::HeaderFormat(format!("unknown Interest flags 0x{flags:02x}")));
        }
        let nack_type = NackType::try_from(take_u32(&mut rd, "nack type")?)?;

        let interest = Self {
            name,
            nonce,
            scope,
            lifetime_ms,
            min_suffix_components,
            max_suffix_components,
            exclude,
            child_selector: flags & FLAG_CHILD_SELECTOR != 0,
            answer_origin_kind: flags & FLAG_ANSWER_ORIGIN_KIND != 0,
            nack_type,
        };
        Ok((interest, buf.len() - rd.len()))
    }
}

fn take_u8(rd: &mut &[u8], field: &str) -> Result<u8, Error> {
    if rd.remaining() < 1 {
        return Err(Error::HeaderFormat(format!("truncated Interest: missing {field}")));
    }
    Ok(rd.get_u8())
}

fn take_u32(rd: &mut &[u8], field: &str) -> Result<u32, Error> {
    if rd.remaining() < 4 {
        return Err(Error::HeaderFormat(format!("truncated Interest: missing {field}")));
    }
    Ok(rd.get_u32())
}

fn take_optional_u32(rd: &mut &[u8], field: &str) -> Result<Option<u32>, Error> {
    match take_u8(rd, field)? {
        0 => Ok(None),
        1 => Ok(Some(take_u32(rd, field)?)),
        other => Err(Error::HeaderFormat(format!("bad {field} presence {other}"))),
    }
}

fn optional_u32_size(value: Option<u32>) -> usize {
    1 + value.map_or(0, |_| 4)
}

fn put_optional_u32(buf: &mut BytesMut, value: Option<u32>) {
    match value {
        Some(v) => {
            buf.put_u8(1);
            buf.put_u32(v);
        }
        None => buf.put_u8(0),
    }
}
