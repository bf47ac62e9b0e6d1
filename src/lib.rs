//! Named-data forwarding core.
//!
//! Facade over the workspace crates: [`common`] holds names, packets and wire
//! formats, [`forwarding`] the faces, tables, strategies and the forwarder.

pub use rust_ndnfwd_common as common;
pub use rust_ndnfwd_core as forwarding;

pub use rust_ndnfwd_common::{ContentObject, FaceId, FaceType, Interest, Name, NackType, Packet};
pub use rust_ndnfwd_core::{Fib, Forwarder, ForwarderConfig, Strategy};
