//! Packet metadata chain.
//!
//! Every header, trailer and payload written into a packet leaves an item in
//! the chain, in buffer order. Fragmenting a packet clips the items to the
//! fragment's byte range; reassembling merges the clipped pieces back. The
//! chain is serialized together with the packet, so a receiver can walk the
//! structure the sender built without parsing any protocol layer.

use crate::error::Error;
use bytes::{Buf, BufMut};
use std::collections::VecDeque;
use std::fmt;

/// What a metadata item describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ItemKind {
    Header = 1,
    Trailer = 2,
    Payload = 3,
}

impl TryFrom<u8> for ItemKind {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(ItemKind::Header),
            2 => Ok(ItemKind::Trailer),
            3 => Ok(ItemKind::Payload),
            other => Err(Error::HeaderFormat(format!("unknown metadata item kind {other}"))),
        }
    }
}

/// One region of the packet buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub kind: ItemKind,
    /// Header/trailer type id, zero for payload.
    pub type_id: u16,
    /// Size of the complete item.
    pub size: u32,
    /// Byte range of the item carried here when only part of it is present.
    pub fragment: Option<(u32, u32)>,
}

/// Serialized size of one item.
const ITEM_SIZE: usize = 1 + 2 + 4 + 1 + 4 + 4;

impl Item {
    pub fn header(type_id: u16, size: usize) -> Self {
        Self::whole(ItemKind::Header, type_id, size)
    }

    pub fn trailer(type_id: u16, size: usize) -> Self {
        Self::whole(ItemKind::Trailer, type_id, size)
    }

    pub fn payload(size: usize) -> Self {
        Self::whole(ItemKind::Payload, 0, size)
    }

    fn whole(kind: ItemKind, type_id: u16, size: usize) -> Self {
        Self {
            kind,
            type_id,
            size: size as u32,
            fragment: None,
        }
    }

    pub fn is_fragment(&self) -> bool {
        self.fragment.is_some()
    }

    /// Bytes of this item present in the buffer.
    pub fn chunk_len(&self) -> usize {
        match self.fragment {
            Some((start, end)) => (end - start) as usize,
            None => self.size as usize,
        }
    }

    fn chunk_start(&self) -> u32 {
        self.fragment.map_or(0, |(start, _)| start)
    }

    /// Restricts the item to `[from, to)` relative to the chunk present.
    fn clip(&self, from: usize, to: usize) -> Self {
        let base = self.chunk_start();
        let range = (base + from as u32, base + to as u32);
        let mut item = self.clone();
        item.fragment = (range != (0, self.size)).then_some(range);
        item
    }

    fn same_origin(&self, other: &Self) -> bool {
        self.kind == other.kind && self.type_id == other.type_id && self.size == other.size
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ItemKind::Header => "header",
            ItemKind::Trailer => "trailer",
            ItemKind::Payload => "payload",
        };
        write!(f, "{kind}")?;
        if self.kind != ItemKind::Payload {
            write!(f, "#{}", self.type_id)?;
        }
        write!(f, " size={}", self.size)?;
        if let Some((start, end)) = self.fragment {
            write!(f, " fragment=[{start}..{end})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketMetadata {
    items: VecDeque<Item>,
}

impl PacketMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> impl ExactSizeIterator<Item = &Item> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn front(&self) -> Option<&Item> {
        self.items.front()
    }

    pub fn back(&self) -> Option<&Item> {
        self.items.back()
    }

    pub fn add_at_start(&mut self, item: Item) {
        self.items.push_front(item);
    }

    pub fn add_at_end(&mut self, item: Item) {
        self.items.push_back(item);
    }

    /// Drops `n` bytes worth of items from the front, clipping a partially
    /// removed item into a fragment.
    pub fn remove_at_start(&mut self, mut n: usize) {
        while n > 0 {
            let Some(front) = self.items.front_mut() else { return };
            let chunk = front.chunk_len();
            if chunk <= n {
                n -= chunk;
                self.items.pop_front();
            } else {
                *front = front.clip(n, chunk);
                n = 0;
            }
        }
    }

    pub fn remove_at_end(&mut self, mut n: usize) {
        while n > 0 {
            let Some(back) = self.items.back_mut() else { return };
            let chunk = back.chunk_len();
            if chunk <= n {
                n -= chunk;
                self.items.pop_back();
            } else {
                *back = back.clip(0, chunk - n);
                n = 0;
            }
        }
    }

    /// Metadata for the byte range `[start, start + len)`.
    pub fn fragment(&self, start: usize, len: usize) -> Self {
        let stop = start + len;
        let mut offset = 0;
        let mut items = VecDeque::new();
        for item in &self.items {
            let chunk = item.chunk_len();
            let (lo, hi) = (start.max(offset), stop.min(offset + chunk));
            if lo < hi {
                items.push_back(item.clip(lo - offset, hi - offset));
            }
            offset += chunk;
            if offset >= stop {
                break;
            }
        }
        Self { items }
    }

    /// Appends `other`, merging a trailing fragment with a leading fragment
    /// of the same item when their ranges touch.
    pub fn add_at_end_metadata(&mut self, other: &Self) {
        let mut rest = other.items.iter();
        if let (Some(last), Some(first)) = (self.items.back_mut(), other.items.front()) {
            if let (Some((a, b)), Some((c, d))) = (last.fragment, first.fragment) {
                if last.same_origin(first) && b == c {
                    let range = (a, d);
                    last.fragment = (range != (0, last.size)).then_some(range);
                    rest.next();
                }
            }
        }
        self.items.extend(rest.cloned());
    }

    /* ------------------------------------------------------------ *
     * Serialization: [count:32] then per item
     * [kind:8][type:16][size:32][fragment:8][start:32][end:32]
     * ------------------------------------------------------------ */

    pub fn serialized_size(&self) -> usize {
        4 + self.items.len() * ITEM_SIZE
    }

    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.items.len() as u32);
        for item in &self.items {
            let (start, end) = item.fragment.unwrap_or((0, item.size));
            buf.put_u8(item.kind as u8);
            buf.put_u16(item.type_id);
            buf.put_u32(item.size);
            buf.put_u8(item.is_fragment() as u8);
            buf.put_u32(start);
            buf.put_u32(end);
        }
    }

    pub fn deserialize(bytes: &[u8]) -> Result<(Self, usize), Error> {
        let mut rd = bytes;
        if rd.remaining() < 4 {
            return Err(Error::HeaderFormat("truncated packet metadata".into()));
        }
        let count = rd.get_u32() as usize;
        let mut items = VecDeque::with_capacity(count.min(64));
        for _ in 0..count {
            if rd.remaining() < ITEM_SIZE {
                return Err(Error::HeaderFormat("truncated packet metadata".into()));
            }
            let kind = ItemKind::try_from(rd.get_u8())?;
            let type_id = rd.get_u16();
            let size = rd.get_u32();
            let is_fragment = rd.get_u8() != 0;
            let (start, end) = (rd.get_u32(), rd.get_u32());
            if start > end || end > size {
                return Err(Error::HeaderFormat(format!(
                    "bad fragment range [{start}..{end}) for item of size {size}"
                )));
            }
            items.push_back(Item {
                kind,
                type_id,
                size,
                fragment: is_fragment.then_some((start, end)),
            });
        }
        Ok((Self { items }, bytes.len() - rd.remaining()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PacketMetadata {
        // [header 10][payload 20][trailer 2]
        let mut md = PacketMetadata::new();
        md.add_at_end(Item::payload(20));
        md.add_at_start(Item::header(1, 10));
        md.add_at_end(Item::trailer(2, 2));
        md
    }

    #[test]
    fn test_fragment_clips_items() {
        let md = sample();
        let frag = md.fragment(5, 10);
        let items: Vec<_> = frag.items().cloned().collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].fragment, Some((5, 10)));
        assert_eq!(items[1].kind, ItemKind::Payload);
        assert_eq!(items[1].fragment, Some((0, 5)));
    }

    #[test]
    fn test_reassembly_merges_fragments() {
        let md = sample();
        let mut first = md.fragment(0, 15);
        let second = md.fragment(15, 17);
        first.add_at_end_metadata(&second);
        assert_eq!(first, md);
    }

    #[test]
    fn test_remove_at_start_and_end() {
        let mut md = sample();
        md.remove_at_start(12);
        assert_eq!(md.front().unwrap().fragment, Some((2, 20)));
        md.remove_at_end(3);
        assert_eq!(md.items().len(), 1);
        assert_eq!(md.back().unwrap().fragment, Some((2, 19)));
    }

    #[test]
    fn test_serialization() {
        let md = sample().fragment(3, 20);
        let mut out = bytes::BytesMut::new();
        md.serialize(&mut out);
        assert_eq!(out.len(), md.serialized_size());

        let (restored, consumed) = PacketMetadata::deserialize(&out).unwrap();
        assert_eq!(consumed, out.len());
        assert_eq!(restored, md);

        assert!(PacketMetadata::deserialize(&out[..out.len() - 1]).is_err());
    }

    #[test]
    fn test_display() {
        let md = sample().fragment(0, 12);
        let text: Vec<String> = md.items().map(|i| i.to_string()).collect();
        assert_eq!(text, vec!["header#1 size=10", "payload size=20 fragment=[0..2)"]);
    }
}
