//! Wire formats for Interest and ContentObject packets.

mod content_object;
mod interest;

#[cfg(test)]
mod tests;

pub use content_object::{ContentObject, ContentObjectHeader, ContentObjectTail};
pub use interest::{Interest, DEFAULT_LIFETIME_MS};

use crate::error::Error;
use crate::name::Name;
use serde::{Deserialize, Serialize};
use std::fmt;

/// First byte of every packet, telling the two header types apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PacketKind {
    Interest = 0x05,
    ContentObject = 0x06,
}

impl PacketKind {
    /// Classifies a packet by peeking at its first byte.
    pub fn classify(bytes: &[u8]) -> Result<Self, Error> {
        match bytes.first() {
            Some(0x05) => Ok(PacketKind::Interest),
            Some(0x06) => Ok(PacketKind::ContentObject),
            Some(other) => Err(Error::HeaderFormat(format!("unknown packet kind 0x{other:02x}"))),
            None => Err(Error::HeaderFormat("empty packet".into())),
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketKind::Interest => write!(f, "Interest"),
            PacketKind::ContentObject => write!(f, "ContentObject"),
        }
    }
}

/// Why an Interest is flowing back toward its requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum NackType {
    NormalInterest = 0,
    /// Duplicate nonce seen: the Interest looped.
    NackLoop = 10,
    /// Every candidate face was over its rate limit.
    NackCongestion = 11,
    /// The pending table gave up on the Interest.
    NackGiveupPit = 12,
}

impl TryFrom<u32> for NackType {
    type Error = Error;

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(NackType::NormalInterest),
            10 => Ok(NackType::NackLoop),
            11 => Ok(NackType::NackCongestion),
            12 => Ok(NackType::NackGiveupPit),
            other => Err(Error::HeaderFormat(format!("unknown nack type {other}"))),
        }
    }
}

impl fmt::Display for NackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NackType::NormalInterest => "NORMAL_INTEREST",
            NackType::NackLoop => "NACK_LOOP",
            NackType::NackCongestion => "NACK_CONGESTION",
            NackType::NackGiveupPit => "NACK_GIVEUP_PIT",
        };
        f.write_str(s)
    }
}

/// Reads a name TLV, reporting any TLV problem as a header format error.
pub(crate) fn read_name(rd: &mut &[u8], field: &str) -> Result<Name, Error> {
    Name::decode(rd).map_err(|e| Error::HeaderFormat(format!("{field} section: {e}")))
}
