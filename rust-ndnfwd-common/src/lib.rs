//! Common types for the named-data forwarding core.
//!
//! Names, the packet buffer with its metadata chain, and the Interest /
//! ContentObject wire formats. The forwarding tables and faces that consume
//! these live in `rust-ndnfwd-core`.

pub mod buffer;
pub mod error;
pub mod metadata;
pub mod metrics;
pub mod name;
pub mod packet;
pub mod tlv;
pub mod types;
pub mod wire;

/// Reexport of common types
pub use error::Error;
pub use name::{Name, NameComponent};
pub use packet::{Header, Packet, Trailer};
pub use types::{FaceId, FaceType};
pub use wire::{ContentObject, ContentObjectHeader, ContentObjectTail, Interest, NackType, PacketKind};

pub type Result<T> = std::result::Result<T, Error>;
