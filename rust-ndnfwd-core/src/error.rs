//! Error types for the forwarding tables, faces and pipelines.

use rust_ndnfwd_common::{FaceId, Name};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Packet could not be decoded or manipulated.
    #[error(transparent)]
    Packet(#[from] rust_ndnfwd_common::Error),

    /// No face can be selected from a FIB entry.
    #[error("no viable face for prefix {0}")]
    NoFaces(Name),

    /// Face id not registered with the forwarder.
    #[error("unknown face {0}")]
    UnknownFace(FaceId),

    /// Strategy name not recognised.
    #[error("unknown forwarding strategy: {0}")]
    UnknownStrategy(String),

    /// Attribute name not supported by the object.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    /// Attribute value could not be parsed.
    #[error("invalid value {value:?} for attribute {name}")]
    InvalidAttribute { name: String, value: String },

    /// Pending Interest table reached its capacity.
    #[error("PIT full ({0} entries)")]
    PitFull(usize),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
