//! Packet decoding for the ndnfwd CLI

use anyhow::{Context, Result};
use rust_ndnfwd_common::{ContentObject, Header, Interest, Packet, PacketKind};
use serde_json::{json, Value};

use crate::utils::{from_hex, hex};
use crate::PacketCommands;

pub fn handle_command(cmd: PacketCommands) -> Result<()> {
    match cmd {
        PacketCommands::Decode { hex } => {
            let bytes = from_hex(&hex)?;
            let decoded = decode(&bytes)?;
            println!("{}", serde_json::to_string_pretty(&decoded)?);
            Ok(())
        }
    }
}

/// Decodes raw header bytes, or a full packet serialization when the first
/// byte is not a packet-kind marker.
fn decode(bytes: &[u8]) -> Result<Value> {
    let packet = match PacketKind::classify(bytes) {
        Ok(_) => Packet::from_raw(bytes),
        Err(_) => Packet::from_wire(bytes).context("Neither a raw header nor a packet serialization")?,
    };

    match PacketKind::classify(packet.as_slice())? {
        PacketKind::Interest => {
            let (interest, consumed) =
                <Interest as Header>::deserialize(packet.as_slice()).context("Malformed Interest")?;
            let mut value = serde_json::to_value(&interest)?;
            value["kind"] = json!(if interest.is_nack() { "Nack" } else { "Interest" });
            value["trailing_bytes"] = json!(packet.len() - consumed);
            Ok(value)
        }
        PacketKind::ContentObject => {
            let data = ContentObject::from_packet(packet).context("Malformed ContentObject")?;
            Ok(json!({
                "kind": "ContentObject",
                "name": data.name().to_string(),
                "timestamp_ms": data.header.timestamp_ms,
                "freshness_ms": data.header.freshness_ms,
                "payload": String::from_utf8_lossy(&data.payload),
                "payload_hex": hex(&data.payload),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ndnfwd_common::Name;

    #[test]
    fn test_decode_raw_interest() {
        let interest = Interest::new("/a/b".parse::<Name>().unwrap()).with_nonce(42);
        let value = decode(interest.to_packet().as_slice()).unwrap();
        assert_eq!(value["name"], "/a/b");
        assert_eq!(value["nonce"], 42);
        assert_eq!(value["kind"], "Interest");
    }

    #[test]
    fn test_decode_wire_content_object() {
        let data = ContentObject::new("/c".parse().unwrap(), &b"hi"[..]);
        let value = decode(&data.to_packet().to_wire()).unwrap();
        assert_eq!(value["kind"], "ContentObject");
        assert_eq!(value["payload"], "hi");
        assert_eq!(value["payload_hex"], "6869");
    }

    #[test]
    fn test_decode_garbage() {
        assert!(decode(&[0x05, 0x01]).is_err());
        assert!(decode(&[0x01]).is_err());
    }
}
