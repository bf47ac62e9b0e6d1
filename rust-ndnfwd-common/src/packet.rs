//! Packets: a buffer, a unique id and the metadata chain describing the
//! buffer's layout.

use crate::buffer::Buffer;
use crate::error::Error;
use crate::metadata::{Item, ItemKind, PacketMetadata};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::trace;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// A protocol header written at the front of a packet.
pub trait Header: Sized {
    /// Identifies the header type in the metadata chain.
    const TYPE_ID: u16;

    /// Exact number of bytes [`Header::serialize`] writes.
    fn serialized_size(&self) -> usize;

    fn serialize(&self, buf: &mut BytesMut);

    /// Parses the header from the start of `buf`, returning it with the
    /// number of bytes consumed.
    fn deserialize(buf: &[u8]) -> Result<(Self, usize), Error>;
}

/// A protocol trailer written at the back of a packet.
pub trait Trailer: Sized {
    const TYPE_ID: u16;

    fn serialized_size(&self) -> usize;

    fn serialize(&self, buf: &mut BytesMut);

    /// Parses the trailer from the *end* of `buf`, returning it with the
    /// number of bytes consumed.
    fn deserialize(buf: &[u8]) -> Result<(Self, usize), Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    uid: u64,
    buffer: Buffer,
    metadata: PacketMetadata,
}

impl Packet {
    pub fn new() -> Self {
        Self {
            uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
            buffer: Buffer::new(),
            metadata: PacketMetadata::new(),
        }
    }

    /// Creates a packet whose buffer holds an opaque payload.
    pub fn with_payload(payload: &[u8]) -> Self {
        let mut packet = Self::new();
        packet.add_payload(payload);
        packet
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn to_bytes(&self) -> Bytes {
        self.buffer.to_bytes()
    }

    pub fn metadata(&self) -> &PacketMetadata {
        &self.metadata
    }

    /// Copy sharing the buffer storage until either side is written to.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub fn add_payload(&mut self, payload: &[u8]) {
        self.buffer.add_at_end(payload);
        self.metadata.add_at_end(Item::payload(payload.len()));
    }

    /* ------------------------------------------------------------ *
     * Headers and trailers
     * ------------------------------------------------------------ */

    pub fn add_header<H: Header>(&mut self, header: &H) {
        let size = header.serialized_size();
        let mut buf = BytesMut::with_capacity(size);
        header.serialize(&mut buf);
        debug_assert_eq!(buf.len(), size, "serialize() did not write serialized_size() bytes");

        self.buffer.add_at_start(&buf);
        self.metadata.add_at_start(Item::header(H::TYPE_ID, buf.len()));
        trace!("packet {}: added header #{} ({} bytes)", self.uid, H::TYPE_ID, buf.len());
    }

    pub fn peek_header<H: Header>(&self) -> Result<H, Error> {
        self.check_front(H::TYPE_ID)?;
        let (header, _) = H::deserialize(self.buffer.as_slice())?;
        Ok(header)
    }

    pub fn remove_header<H: Header>(&mut self) -> Result<H, Error> {
        self.check_front(H::TYPE_ID)?;
        let (header, consumed) = H::deserialize(self.buffer.as_slice())?;
        self.buffer.remove_at_start(consumed)?;
        self.metadata.remove_at_start(consumed);
        Ok(header)
    }

    pub fn add_trailer<T: Trailer>(&mut self, trailer: &T) {
        let size = trailer.serialized_size();
        let mut buf = BytesMut::with_capacity(size);
        trailer.serialize(&mut buf);
        debug_assert_eq!(buf.len(), size, "serialize() did not write serialized_size() bytes");

        self.buffer.add_at_end(&buf);
        self.metadata.add_at_end(Item::trailer(T::TYPE_ID, buf.len()));
    }

    pub fn peek_trailer<T: Trailer>(&self) -> Result<T, Error> {
        self.check_back(T::TYPE_ID)?;
        let (trailer, _) = T::deserialize(self.buffer.as_slice())?;
        Ok(trailer)
    }

    pub fn remove_trailer<T: Trailer>(&mut self) -> Result<T, Error> {
        self.check_back(T::TYPE_ID)?;
        let (trailer, consumed) = T::deserialize(self.buffer.as_slice())?;
        self.buffer.remove_at_end(consumed)?;
        self.metadata.remove_at_end(consumed);
        Ok(trailer)
    }

    /// Packets rebuilt from raw wire bytes carry no metadata; only packets
    /// that have a chain get their layout checked.
    fn check_front(&self, type_id: u16) -> Result<(), Error> {
        match self.metadata.front() {
            None => Ok(()),
            Some(item) if item.kind == ItemKind::Header && item.type_id == type_id && !item.is_fragment() => Ok(()),
            Some(item) => Err(Error::HeaderFormat(format!(
                "expected header #{type_id} at front, found {item}"
            ))),
        }
    }

    fn check_back(&self, type_id: u16) -> Result<(), Error> {
        match self.metadata.back() {
            None => Ok(()),
            Some(item) if item.kind == ItemKind::Trailer && item.type_id == type_id && !item.is_fragment() => Ok(()),
            Some(item) => Err(Error::HeaderFormat(format!(
                "expected trailer #{type_id} at back, found {item}"
            ))),
        }
    }

    /* ------------------------------------------------------------ *
     * Raw byte removal, fragmentation and reassembly
     * ------------------------------------------------------------ */

    pub fn remove_at_start(&mut self, n: usize) -> Result<(), Error> {
        self.buffer.remove_at_start(n)?;
        self.metadata.remove_at_start(n);
        Ok(())
    }

    pub fn remove_at_end(&mut self, n: usize) -> Result<(), Error> {
        self.buffer.remove_at_end(n)?;
        self.metadata.remove_at_end(n);
        Ok(())
    }

    /// Zero-copy fragment covering `[start, start + len)`. The fragment keeps
    /// this packet's uid.
    pub fn create_fragment(&self, start: usize, len: usize) -> Result<Self, Error> {
        Ok(Self {
            uid: self.uid,
            buffer: self.buffer.fragment(start, len)?,
            metadata: self.metadata.fragment(start, len),
        })
    }

    /// Appends `other`'s bytes and metadata, merging split items back.
    pub fn add_at_end(&mut self, other: &Packet) {
        self.buffer.add_at_end(other.as_slice());
        self.metadata.add_at_end_metadata(&other.metadata);
    }

    /// Splits the packet into fragments of at most `fragment_size` bytes.
    pub fn fragment_into(&self, fragment_size: usize) -> Result<Vec<Self>, Error> {
        assert!(fragment_size > 0, "fragment size must be positive");
        let mut fragments = Vec::with_capacity(self.len().div_ceil(fragment_size));
        let mut offset = 0;
        while offset < self.len() {
            let len = fragment_size.min(self.len() - offset);
            fragments.push(self.create_fragment(offset, len)?);
            offset += len;
        }
        trace!("packet {}: split {} bytes into {} fragments", self.uid, self.len(), fragments.len());
        Ok(fragments)
    }

    /// Reassembles fragments produced by [`Packet::fragment_into`].
    pub fn reassemble(fragments: impl IntoIterator<Item = Self>) -> Option<Self> {
        let mut fragments = fragments.into_iter();
        let mut packet = fragments.next()?;
        for fragment in fragments {
            packet.add_at_end(&fragment);
        }
        Some(packet)
    }

    /* ------------------------------------------------------------ *
     * Serialization: [uid:64][metadata][buffer]
     * ------------------------------------------------------------ */

    pub fn serialized_size(&self) -> usize {
        8 + self.metadata.serialized_size() + self.buffer.serialized_size()
    }

    /// Writes the packet into `out`, failing when `out` is too small.
    pub fn serialize(&self, out: &mut [u8]) -> Result<usize, Error> {
        let needed = self.serialized_size();
        if out.len() < needed {
            return Err(Error::Serialize {
                needed,
                max: out.len(),
            });
        }
        let mut dst = out;
        self.encode(&mut dst);
        Ok(needed)
    }

    /// Appends the full serialization to `buf`.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.uid);
        self.metadata.serialize(buf);
        self.buffer.encode(buf);
    }

    pub fn deserialize(bytes: &[u8]) -> Result<(Self, usize), Error> {
        let mut rd = bytes;
        if rd.remaining() < 8 {
            return Err(Error::HeaderFormat("truncated packet uid".into()));
        }
        let uid = rd.get_u64();
        let (metadata, md_len) = PacketMetadata::deserialize(rd)?;
        rd.advance(md_len);
        let (buffer, buf_len) = Buffer::deserialize(rd)?;
        rd.advance(buf_len);

        let described: usize = metadata.items().map(|i| i.chunk_len()).sum();
        if !metadata.is_empty() && described != buffer.len() {
            return Err(Error::HeaderFormat(format!(
                "metadata describes {} bytes but buffer holds {}",
                described,
                buffer.len()
            )));
        }

        let packet = Self {
            uid,
            buffer,
            metadata,
        };
        Ok((packet, bytes.len() - rd.remaining()))
    }

    /// Full serialization as an owned byte string, used on link crossings.
    pub fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.serialized_size());
        self.encode(&mut buf);
        buf.freeze()
    }

    pub fn from_wire(bytes: &[u8]) -> Result<Self, Error> {
        let (packet, consumed) = Self::deserialize(bytes)?;
        if consumed != bytes.len() {
            return Err(Error::HeaderFormat(format!(
                "{} trailing bytes after packet",
                bytes.len() - consumed
            )));
        }
        Ok(packet)
    }

    /// Wraps raw protocol bytes received without a metadata chain.
    pub fn from_raw(bytes: &[u8]) -> Self {
        Self {
            uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
            buffer: Buffer::from_slice(bytes),
            metadata: PacketMetadata::new(),
        }
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self::new()
    }
}
