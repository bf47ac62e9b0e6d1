//! Byte buffer with cheap prepend/append.
//!
//! The buffer keeps free room on both sides of its logical content, so headers
//! can be pushed at the front and trailers at the back without moving the
//! payload. Storage is a shared [`Bytes`]: clones and fragments point at the
//! same allocation until one of them is written to.

use crate::error::Error;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Headroom allocated on first growth at either end.
const DEFAULT_ROOM: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct Buffer {
    /// Whole allocation: headroom, content, tailroom.
    storage: Bytes,
    start: usize,
    end: usize,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buffer = Self::new();
        buffer.add_at_end(bytes);
        buffer
    }

    /// Logical size in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.storage[self.start..self.end]
    }

    /// The content as a `Bytes` sharing this buffer's storage.
    pub fn to_bytes(&self) -> Bytes {
        self.storage.slice(self.start..self.end)
    }

    /// Free bytes in front of the content that can be written without
    /// reallocating.
    pub fn headroom(&self) -> usize {
        if self.storage.is_unique() {
            self.start
        } else {
            0
        }
    }

    pub fn tailroom(&self) -> usize {
        if self.storage.is_unique() {
            self.storage.len() - self.end
        } else {
            0
        }
    }

    /// Makes sure at least `size` bytes can be prepended without a copy.
    pub fn reserve(&mut self, size: usize) {
        self.make_room_front(size);
    }

    pub fn add_at_start(&mut self, bytes: &[u8]) {
        let n = bytes.len();
        self.make_room_front(n);
        let start = self.start - n;
        self.write_at(start, bytes);
        self.start = start;
    }

    pub fn add_at_end(&mut self, bytes: &[u8]) {
        let n = bytes.len();
        self.make_room_back(n);
        self.write_at(self.end, bytes);
        self.end += n;
    }

    pub fn remove_at_start(&mut self, n: usize) -> Result<(), Error> {
        if n > self.len() {
            return Err(Error::out_of_range(n, self.len()));
        }
        self.start += n;
        Ok(())
    }

    pub fn remove_at_end(&mut self, n: usize) -> Result<(), Error> {
        if n > self.len() {
            return Err(Error::out_of_range(n, self.len()));
        }
        self.end -= n;
        Ok(())
    }

    /// Zero-copy view of `len` bytes starting at `start`.
    pub fn fragment(&self, start: usize, len: usize) -> Result<Self, Error> {
        let available = self.len();
        match start.checked_add(len) {
            Some(stop) if stop <= available => Ok(Self {
                storage: self.storage.clone(),
                start: self.start + start,
                end: self.start + stop,
            }),
            _ => Err(Error::out_of_range(start.saturating_add(len), available)),
        }
    }

    /// Deep copy with fresh, unshared storage.
    pub fn deep_copy(&self) -> Self {
        Self::from_slice(self.as_slice())
    }

    /* ------------------------------------------------------------ *
     * Serialization: [length:32][bytes]
     * ------------------------------------------------------------ */

    pub fn serialized_size(&self) -> usize {
        4 + self.len()
    }

    /// Writes the buffer into `out`, returning the number of bytes written.
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

    /// Appends the serialized form to `buf`.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.len() as u32);
        buf.put_slice(self.as_slice());
    }

    /// Reads a buffer written by [`Buffer::serialize`], returning it together
    /// with the number of bytes consumed.
    pub fn deserialize(bytes: &[u8]) -> Result<(Self, usize), Error> {
        let mut rd = bytes;
        if rd.remaining() < 4 {
            return Err(Error::HeaderFormat("truncated buffer length".into()));
        }
        let len = rd.get_u32() as usize;
        if rd.remaining() < len {
            return Err(Error::HeaderFormat(format!(
                "buffer claims {} bytes but only {} present",
                len,
                rd.remaining()
            )));
        }
        Ok((Self::from_slice(&rd[..len]), 4 + len))
    }

    /* ------------------------------------------------------------ *
     * Growth
     * ------------------------------------------------------------ */

    /// Copies `bytes` into the storage at `at`. The room must already exist.
    fn write_at(&mut self, at: usize, bytes: &[u8]) {
        let storage = std::mem::take(&mut self.storage);
        let mut storage = storage
            .try_into_mut()
            .unwrap_or_else(|shared| BytesMut::from(&shared[..]));
        storage[at..at + bytes.len()].copy_from_slice(bytes);
        self.storage = storage.freeze();
    }

    fn make_room_front(&mut self, n: usize) {
        if self.headroom() >= n {
            return;
        }
        let head = n.max(self.len()).max(DEFAULT_ROOM);
        let tail = self.tailroom();
        self.reallocate(head, tail);
    }

    fn make_room_back(&mut self, n: usize) {
        if self.tailroom() >= n {
            return;
        }
        let tail = n.max(self.len()).max(DEFAULT_ROOM);
        let head = self.headroom();
        self.reallocate(head, tail);
    }

    fn reallocate(&mut self, head: usize, tail: usize) {
        let len = self.len();
        let mut storage = BytesMut::zeroed(head + len + tail);
        storage[head..head + len].copy_from_slice(self.as_slice());
        self.storage = storage.freeze();
        self.start = head;
        self.end = head + len;
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Buffer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepend_append() {
        let mut buffer = Buffer::from_slice(b"payload");
        buffer.add_at_start(b"hdr:");
        buffer.add_at_end(b":tr");
        assert_eq!(buffer.as_slice(), b"hdr:payload:tr");

        buffer.remove_at_start(4).unwrap();
        buffer.remove_at_end(3).unwrap();
        assert_eq!(buffer.as_slice(), b"payload");
    }

    #[test]
    fn test_reserve_avoids_reallocation() {
        let mut buffer = Buffer::from_slice(b"x");
        buffer.reserve(128);
        assert!(buffer.headroom() >= 128);
        let before = buffer.storage.as_ptr();
        buffer.add_at_start(&[1u8; 100]);
        assert_eq!(buffer.storage.as_ptr(), before);
        assert_eq!(buffer.len(), 101);
    }

    #[test]
    fn test_fragment_is_zero_copy_and_copy_on_write() {
        let mut whole = Buffer::from_slice(b"0123456789");
        let frag = whole.fragment(2, 5).unwrap();
        assert_eq!(frag.as_slice(), b"23456");
        assert_eq!(whole.storage.as_ptr(), frag.storage.as_ptr());
        assert_eq!(frag.to_bytes(), Bytes::from_static(b"23456"));

        // Writing to the original must not disturb the fragment.
        whole.add_at_start(b"ab");
        assert_eq!(frag.as_slice(), b"23456");
        assert_eq!(whole.as_slice(), b"ab0123456789");

        assert_eq!(whole.fragment(9, 3).unwrap().as_slice(), b"789");
    }

    #[test]
    fn test_serialize_respects_max_size() {
        let buffer = Buffer::from_slice(b"abc");
        let mut small = [0u8; 6];
        assert_eq!(
            buffer.serialize(&mut small),
            Err(Error::Serialize { needed: 7, max: 6 })
        );

        let mut out = [0u8; 16];
        let written = buffer.serialize(&mut out).unwrap();
        assert_eq!(written, 7);

        let (restored, consumed) = Buffer::deserialize(&out[..written]).unwrap();
        assert_eq!(consumed, 7);
        assert_eq!(restored, buffer);

        assert!(Buffer::deserialize(&out[..5]).is_err());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of range")]
    fn test_remove_too_much_is_fatal_in_debug() {
        let mut buffer = Buffer::from_slice(b"abc");
        let _ = buffer.remove_at_start(4);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_remove_too_much_is_reported() {
        let mut buffer = Buffer::from_slice(b"abc");
        assert!(matches!(buffer.remove_at_end(4), Err(Error::OutOfRange { .. })));
        assert_eq!(buffer.len(), 3);
    }
}
