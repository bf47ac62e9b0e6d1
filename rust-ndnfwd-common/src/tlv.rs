//! TLV (Type‑Length‑Value) encoding and decoding utilities.
//!
//! Names travel on the wire as a TLV element whose value is a sequence of
//! component TLVs. Everything else in the headers is fixed-width.

use crate::error::Error;
use bytes::{Buf, BufMut, Bytes};

/* ---------------------------------------------------------------- *
 * TLV type constants (single‑byte)
 * ---------------------------------------------------------------- */

pub const TLV_NAME: u8 = 0x07;
pub const TLV_COMPONENT: u8 = 0x08;

/* ---------------------------------------------------------------- *
 * Encoding helpers
 * ---------------------------------------------------------------- */

/// Encode the variable‑width TLV *length* field.
///
/// * `< 253`  → 1 byte
/// * `≤ 65 535`  → marker 253 + 2‑byte length
/// * otherwise → marker 254 + 4‑byte length
pub fn encode_tlv_length(length: usize, buf: &mut impl BufMut) {
    if length < 253 {
        buf.put_u8(length as u8);
    } else if length <= 65_535 {
        buf.put_u8(253);
        buf.put_u16(length as u16);
    } else {
        buf.put_u8(254);
        buf.put_u32(length as u32);
    }
}

/* ---------------------------------------------------------------- *
 * Decoding helpers
 * ---------------------------------------------------------------- */

/// Decode the TLV *length* field using the variable‑width rules.
pub fn decode_tlv_length(buf: &mut impl Buf) -> Result<usize, Error> {
    if !buf.has_remaining() {
        return Err(Error::Tlv("buffer underflow when decoding TLV length".into()));
    }

    let first_byte = buf.get_u8();
    match first_byte {
        0..=252 => Ok(first_byte as usize),
        253 => {
            if buf.remaining() < 2 {
                return Err(Error::Tlv("buffer underflow when decoding 16‑bit TLV length".into()));
            }
            Ok(buf.get_u16() as usize)
        }
        254 => {
            if buf.remaining() < 4 {
                return Err(Error::Tlv("buffer underflow when decoding 32‑bit TLV length".into()));
            }
            Ok(buf.get_u32() as usize)
        }
        255 => Err(Error::Tlv("64‑bit TLV lengths not supported".into())),
    }
}

/// Number of bytes required to encode `length` with the variable‑width scheme.
pub fn tlv_length_size(length: usize) -> usize {
    if length < 253 {
        1
    } else if length <= 65_535 {
        3
    } else {
        5
    }
}

/* ---------------------------------------------------------------- *
 * TLV element wrapper
 * ---------------------------------------------------------------- */

/// A generic TLV element consisting of *type*, *length* and *value*.
#[derive(Debug, Clone, PartialEq)]
pub struct TlvElement {
    pub tlv_type: u8,
    pub value: Bytes,
}

impl TlvElement {
    pub fn new(tlv_type: u8, value: impl Into<Bytes>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Total number of bytes when this element is encoded.
    pub fn len(&self) -> usize {
        encoded_len(self.value.len())
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.tlv_type);
        encode_tlv_length(self.value.len(), buf);
        buf.put_slice(&self.value);
    }

    /// Decode a single element from `buf`, advancing it past the element.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        if buf.remaining() < 2 {
            return Err(Error::Tlv("buffer too small for TLV header".into()));
        }

        let tlv_type = buf.get_u8();
        let length = decode_tlv_length(buf)?;

        if buf.remaining() < length {
            return Err(Error::Tlv(format!(
                "TLV value requires {} bytes but only {} available",
                length,
                buf.remaining()
            )));
        }

        let value = buf.copy_to_bytes(length);
        Ok(Self { tlv_type, value })
    }
}

/// Encoded size of an element carrying `value_len` bytes.
pub fn encoded_len(value_len: usize) -> usize {
    1 + tlv_length_size(value_len) + value_len
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_length_widths() {
        for (len, width, marker) in [(100usize, 1usize, None), (1000, 3, Some(253u8)), (100_000, 5, Some(254))] {
            let mut buf = BytesMut::new();
            encode_tlv_length(len, &mut buf);
            assert_eq!(buf.len(), width);
            assert_eq!(tlv_length_size(len), width);
            if let Some(m) = marker {
                assert_eq!(buf[0], m);
            }
            let mut rd = buf.freeze();
            assert_eq!(decode_tlv_length(&mut rd).unwrap(), len);
        }
    }

    #[test]
    fn test_element_encoding() {
        let element = TlvElement::new(TLV_COMPONENT, &b"abc"[..]);
        let mut buf = BytesMut::new();
        element.encode(&mut buf);

        assert_eq!(&buf[..], &[TLV_COMPONENT, 3, b'a', b'b', b'c']);
        assert_eq!(element.len(), 5);

        let mut rd = buf.freeze();
        assert_eq!(TlvElement::decode(&mut rd).unwrap(), element);
        assert!(!rd.has_remaining());
    }

    #[test]
    fn test_truncated_value() {
        let mut rd = Bytes::from_static(&[TLV_COMPONENT, 5, b'a']);
        assert!(matches!(TlvElement::decode(&mut rd), Err(Error::Tlv(_))));
    }

    #[test]
    fn test_reserved_length_marker() {
        let mut rd = Bytes::from_static(&[255, 0, 0]);
        assert!(decode_tlv_length(&mut rd).is_err());
    }
}
