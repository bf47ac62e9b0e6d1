//! Unit tests for the Interest / ContentObject wire formats

use super::*;
use crate::packet::{Header, Packet, Trailer};
use bytes::BytesMut;
use std::time::Duration;

fn name(s: &str) -> Name {
    s.parse().unwrap()
}

fn encode<H: Header>(header: &H) -> BytesMut {
    let mut buf = BytesMut::new();
    header.serialize(&mut buf);
    buf
}

fn full_interest() -> Interest {
    Interest::new(name("/test/interest"))
        .with_nonce(42)
        .with_scope(2)
        .with_lifetime(Duration::from_millis(1500))
        .with_suffix_components(Some(1), Some(3))
        .with_exclude(name("/x/y"))
        .with_child_selector(true)
        .with_answer_origin_kind(true)
        .with_nack(NackType::NackCongestion)
}

#[test]
fn test_interest_round_trip() {
    for interest in [Interest::new(name("/a")).with_nonce(1), full_interest()] {
        let wire = encode(&interest);
        assert_eq!(wire.len(), interest.serialized_size());

        let (parsed, consumed) = <Interest as Header>::deserialize(&wire).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(parsed, interest);
        assert_eq!(encode(&parsed), wire);
    }
}

#[test]
fn test_interest_field_layout() {
    let interest = Interest::new(Name::new()).with_nonce(0x01020304);
    let wire = encode(&interest);
    #[rustfmt::skip]
    let expected = [
        0x05,                   // kind
        0x07, 0x00,             // empty name
        0x01, 0x02, 0x03, 0x04, // nonce
        0x00,                   // no scope
        0x00, 0x00, 0x0f, 0xa0, // lifetime 4000 ms
        0x00,                   // no min suffix
        0x00,                   // no max suffix
        0x00,                   // no exclude
        0x00,                   // flags
        0x00, 0x00, 0x00, 0x00, // normal interest
    ];
    assert_eq!(&wire[..], &expected[..]);
}

#[test]
fn test_interest_optional_fields_are_omitted() {
    let bare = Interest::new(name("/a/b")).with_nonce(5);
    let scoped = bare.clone().with_scope(1);
    assert_eq!(scoped.serialized_size(), bare.serialized_size() + 1);

    let excluded = bare.clone().with_exclude(name("/c"));
    assert_eq!(
        excluded.serialized_size(),
        bare.serialized_size() + name("/c").encoded_len()
    );
}

#[test]
fn test_suffix_selectors_keep_every_value() {
    for (min, max) in [(Some(u32::MAX), None), (Some(0), Some(u32::MAX)), (None, Some(7))] {
        let interest = Interest::new(name("/a")).with_nonce(3).with_suffix_components(min, max);
        let wire = encode(&interest);
        assert_eq!(wire.len(), interest.serialized_size());

        let (parsed, _) = <Interest as Header>::deserialize(&wire).unwrap();
        assert_eq!(parsed.min_suffix_components, min);
        assert_eq!(parsed.max_suffix_components, max);
    }

    // Presence byte other than 0 or 1.
    let mut wire = encode(&Interest::new(name("/a")).with_nonce(1));
    let min_at = 1 + name("/a").encoded_len() + 4 + 1 + 4;
    wire[min_at] = 2;
    assert!(<Interest as Header>::deserialize(&wire).is_err());
}

#[test]
fn test_interest_truncated_at_every_length() {
    let wire = encode(&full_interest());
    for cut in 0..wire.len() {
        assert!(
            matches!(<Interest as Header>::deserialize(&wire[..cut]), Err(Error::HeaderFormat(_))),
            "cut at {cut}"
        );
    }
}

#[test]
fn test_interest_malformed() {
    // Name section claims more bytes than its components provide.
    let mut wire = encode(&Interest::new(name("/ab")).with_nonce(1));
    wire[2] += 1;
    assert!(<Interest as Header>::deserialize(&wire).is_err());

    // Unknown flag bit.
    let mut wire = encode(&Interest::new(name("/a")).with_nonce(1));
    let flags_at = wire.len() - 5;
    wire[flags_at] = 0x80;
    assert!(<Interest as Header>::deserialize(&wire).is_err());

    // Unknown nack code.
    let mut wire = encode(&Interest::new(name("/a")).with_nonce(1));
    let last = wire.len() - 1;
    wire[last] = 0x63;
    assert!(<Interest as Header>::deserialize(&wire).is_err());

    // ContentObject bytes are not an Interest.
    let co = encode(&ContentObjectHeader::new(name("/a")));
    assert!(<Interest as Header>::deserialize(&co).is_err());
}

#[test]
fn test_nack_helpers() {
    let interest = Interest::new(name("/a")).with_nonce(9);
    assert!(!interest.is_nack());
    let nack = interest.to_nack(NackType::NackLoop);
    assert!(nack.is_nack());
    assert_eq!(nack.nonce, 9);
    assert_eq!(nack.nack_type.to_string(), "NACK_LOOP");
}

#[test]
fn test_content_object_round_trip() {
    let co = ContentObject {
        header: ContentObjectHeader::new(name("/video/seg/1"))
            .with_timestamp(Duration::from_secs(12))
            .with_freshness(Duration::from_millis(500)),
        payload: bytes::Bytes::from_static(b"Hello, NDN!"),
    };

    let packet = co.to_packet();
    assert_eq!(PacketKind::classify(packet.as_slice()).unwrap(), PacketKind::ContentObject);
    assert_eq!(
        packet.len(),
        co.header.serialized_size() + co.payload.len() + ContentObjectTail.serialized_size()
    );

    let over_the_link = Packet::from_wire(&packet.to_wire()).unwrap();
    assert_eq!(ContentObject::from_packet(over_the_link).unwrap(), co);

    let raw = Packet::from_raw(packet.as_slice());
    assert_eq!(ContentObject::from_packet(raw).unwrap(), co);
}

#[test]
fn test_content_object_errors() {
    let co = ContentObject::new(name("/a"), &b"xyz"[..]);
    let packet = co.to_packet();

    let bytes = packet.as_slice();
    let mut corrupted = bytes.to_vec();
    let last = corrupted.len() - 1;
    corrupted[last] = 0x01;
    assert!(ContentObject::from_packet(Packet::from_raw(&corrupted)).is_err());

    assert!(<ContentObjectTail as Trailer>::deserialize(&[0x00]).is_err());

    let header_len = co.header.serialized_size();
    assert!(<ContentObjectHeader as Header>::deserialize(&bytes[..header_len - 1]).is_err());
}

#[test]
fn test_interest_packet_metadata() {
    let packet = full_interest().to_packet();
    let items: Vec<_> = packet.metadata().items().cloned().collect();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].type_id, Interest::TYPE_ID);

    let mut received = Packet::from_wire(&packet.to_wire()).unwrap();
    assert_eq!(PacketKind::classify(received.as_slice()).unwrap(), PacketKind::Interest);
    assert_eq!(received.remove_header::<Interest>().unwrap(), full_interest());
    assert!(received.is_empty());

    // Removing the wrong header type fails without consuming anything.
    let mut packet = full_interest().to_packet();
    assert!(packet.remove_header::<ContentObjectHeader>().is_err());
    assert_eq!(packet.len(), full_interest().serialized_size());
}
