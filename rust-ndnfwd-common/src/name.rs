//! Hierarchical names.
//!
//! A [`Name`] is an immutable, ordered sequence of opaque components, most
//! general first. Components are reference-counted byte strings, so cloning a
//! name (which FIB entries, PIT entries and packets all do) never copies
//! component bytes.

use crate::error::Error;
use crate::tlv::{self, TlvElement};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Represents a single name component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameComponent(Bytes);

impl NameComponent {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn to_tlv(&self) -> TlvElement {
        TlvElement::new(tlv::TLV_COMPONENT, self.0.clone())
    }
}

impl From<&str> for NameComponent {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<&[u8]> for NameComponent {
    fn from(b: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(b))
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Components made only of periods (the empty one included) get three
        // extra periods, so they never print as "", "." or "..".
        if self.0.iter().all(|&b| b == b'.') {
            return write!(f, "...{}", ".".repeat(self.0.len()));
        }
        // Printable ASCII goes out as-is; everything else, plus the two
        // characters with meaning in the URI form, is percent-escaped.
        for &b in self.0.iter() {
            if b.is_ascii_graphic() && b != b'/' && b != b'%' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{:02X}", b)?;
            }
        }
        Ok(())
    }
}

/// Represents a hierarchical name.
///
/// Ordering is component-wise: components compare as byte strings, and a
/// name sorts before every longer name it is a prefix of.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    /// Creates the empty name `/`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_components(components: impl IntoIterator<Item = NameComponent>) -> Self {
        Self {
            components: components.into_iter().collect(),
        }
    }

    /// Returns a new name with `component` appended.
    pub fn append(&self, component: impl Into<NameComponent>) -> Self {
        let mut components = Vec::with_capacity(self.components.len() + 1);
        components.extend(self.components.iter().cloned());
        components.push(component.into());
        Self { components }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> impl ExactSizeIterator<Item = &NameComponent> {
        self.components.iter()
    }

    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    /// Returns the first `len` components. Asking for more components than
    /// the name has yields the whole name.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            components: self.components[..len.min(self.components.len())].to_vec(),
        }
    }

    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.len() <= other.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }

    /* ------------------------------------------------------------ *
     * Wire format
     * ------------------------------------------------------------ */

    fn value_len(&self) -> usize {
        self.components
            .iter()
            .map(|c| tlv::encoded_len(c.len()))
            .sum()
    }

    /// Number of bytes written by [`Name::encode`].
    pub fn encoded_len(&self) -> usize {
        tlv::encoded_len(self.value_len())
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(tlv::TLV_NAME);
        tlv::encode_tlv_length(self.value_len(), buf);
        for component in &self.components {
            component.to_tlv().encode(buf);
        }
    }

    pub fn to_tlv(&self) -> TlvElement {
        let mut value = BytesMut::with_capacity(self.value_len());
        for component in &self.components {
            component.to_tlv().encode(&mut value);
        }
        TlvElement::new(tlv::TLV_NAME, value.freeze())
    }

    /// Decodes a name, advancing `buf` past it.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        let element = TlvElement::decode(buf)?;
        Self::from_tlv(&element)
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_NAME {
            return Err(Error::Tlv(format!(
                "expected name TLV type {}, got {}",
                tlv::TLV_NAME,
                element.tlv_type
            )));
        }

        let mut components = Vec::new();
        let mut value = element.value.clone();
        while value.has_remaining() {
            let component = TlvElement::decode(&mut value)?;
            if component.tlv_type != tlv::TLV_COMPONENT {
                return Err(Error::Tlv(format!(
                    "expected name component TLV type {}, got {}",
                    tlv::TLV_COMPONENT,
                    component.tlv_type
                )));
            }
            components.push(NameComponent(component.value));
        }

        Ok(Self { components })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl FromStr for Name {
    type Err = Error;

    /// Parses the `/a/b/c` form. A trailing `/` is accepted, an empty
    /// component in the middle is not: the empty component is spelled `...`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| Error::Format(format!("name must start with '/': {s:?}")))?;
        if rest.is_empty() {
            return Ok(Self::new());
        }
        let rest = rest.strip_suffix('/').unwrap_or(rest);

        let mut components = Vec::new();
        for part in rest.split('/') {
            if part.is_empty() {
                return Err(Error::Format(format!("empty component in {s:?}")));
            }
            components.push(NameComponent(unescape(part)?));
        }
        Ok(Self { components })
    }
}

impl TryFrom<String> for Name {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.to_string()
    }
}

fn unescape(part: &str) -> Result<Bytes, Error> {
    let raw = part.as_bytes();
    if raw.iter().all(|&b| b == b'.') {
        return match raw.len() {
            0..=2 => Err(Error::Format(format!("reserved component {part:?}"))),
            n => Ok(Bytes::from(vec![b'.'; n - 3])),
        };
    }
    let mut out = BytesMut::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            let hex = raw
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| Error::Format(format!("bad escape in component {part:?}")))?;
            out.put_u8(hex);
            i += 3;
        } else {
            out.put_u8(raw[i]);
            i += 1;
        }
    }
    Ok(out.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn test_name_creation() {
        let name = n("/test/data/1");
        let parts: Vec<_> = name.components().map(|c| c.as_bytes().to_vec()).collect();
        assert_eq!(parts, vec![b"test".to_vec(), b"data".to_vec(), b"1".to_vec()]);
        assert_eq!(name.to_string(), "/test/data/1");
        assert_eq!(n("/").len(), 0);
        assert_eq!(n("/a/b/").to_string(), "/a/b");
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "a/b", "/a//b", "/a/%zz", "/a/%4", "/a/.", "/../b"] {
            assert!(matches!(bad.parse::<Name>(), Err(Error::Format(_))), "{bad}");
        }
    }

    #[test]
    fn test_escaped_round_trip() {
        let name = Name::new()
            .append(&b"a/b"[..])
            .append(&[0u8, 0xff, b'%'][..])
            .append("plain");
        let text = name.to_string();
        assert_eq!(text, "/a%2Fb/%00%FF%25/plain");
        assert_eq!(n(&text), name);
    }

    #[test]
    fn test_period_components_round_trip() {
        let name = Name::new().append("a").append("").append("b");
        assert_eq!(name.to_string(), "/a/.../b");
        assert_eq!(n("/a/.../b"), name);

        let lone = Name::new().append("");
        assert_eq!(lone.to_string(), "/...");
        assert_eq!(n(&lone.to_string()), lone);
        assert_ne!(n("/..."), Name::new());

        let dots = Name::new().append(".").append("..").append("x.y");
        assert_eq!(dots.to_string(), "/..../...../x.y");
        assert_eq!(n(&dots.to_string()), dots);
    }

    #[test]
    fn test_ordering() {
        let names: Vec<Name> = ["/", "/a", "/a/b", "/a/c", "/ab", "/b", "/a/b/c"]
            .into_iter()
            .map(n)
            .collect();

        for a in &names {
            for b in &names {
                assert_eq!(a.cmp(b), b.cmp(a).reverse(), "{a} vs {b}");
            }
        }

        assert!(n("/a") < n("/a/b"));
        assert!(n("/a/b") < n("/a/c"));
        assert!(n("/a/c") < n("/ab"));
        assert!(n("/") < n("/a"));
    }

    #[test]
    fn test_prefix() {
        let name = n("/a/b/c");
        for k in 0..=4 {
            let p = name.prefix(k);
            assert_eq!(p.prefix(k), p);
            assert!(p.is_prefix_of(&name));
        }
        assert_eq!(name.prefix(2), n("/a/b"));
        assert_eq!(name.prefix(0), Name::new());
        assert_eq!(name.prefix(10), name);
        assert!(!n("/a/c").is_prefix_of(&name));
        assert!(!name.is_prefix_of(&n("/a/b")));
    }

    #[test]
    fn test_wire_encoding() {
        let name = n("/hello/world");
        let mut buf = BytesMut::new();
        name.encode(&mut buf);
        assert_eq!(buf.len(), name.encoded_len());
        assert_eq!(buf[0], tlv::TLV_NAME);

        let mut rd = buf.freeze();
        assert_eq!(Name::decode(&mut rd).unwrap(), name);
        assert_eq!(name.to_tlv().len(), name.encoded_len());
    }

    #[test]
    fn test_component_overruns_name() {
        // Name claims 4 value bytes but its only component claims 5.
        let mut rd = Bytes::from_static(&[tlv::TLV_NAME, 4, tlv::TLV_COMPONENT, 5, b'a', b'b']);
        assert!(Name::decode(&mut rd).is_err());
    }

    #[test]
    fn test_serde_string_form() {
        let name: Name = serde_json::from_str("\"/a/b\"").unwrap();
        assert_eq!(name, n("/a/b"));
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"/a/b\"");
        assert!(serde_json::from_str::<Name>("\"nope\"").is_err());
    }
}
