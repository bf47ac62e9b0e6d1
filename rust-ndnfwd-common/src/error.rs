//! Error types for the forwarding core.

use thiserror::Error;

/// All possible errors raised by names, buffers and wire codecs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed name string.
    #[error("name format error: {0}")]
    Format(String),

    /// Truncated or corrupt header or trailer.
    #[error("header format error: {0}")]
    HeaderFormat(String),

    /// Error related to TLV encoding/decoding.
    #[error("TLV error: {0}")]
    Tlv(String),

    /// Buffer index out of bounds.
    #[error("out of range: requested {requested}, available {available}")]
    OutOfRange { requested: usize, available: usize },

    /// Destination buffer too small for serialization.
    #[error("serialization needs {needed} bytes but only {max} allowed")]
    Serialize { needed: usize, max: usize },
}

impl Error {
    /// Out-of-range access is a caller bug: it aborts debug builds and is
    /// reported as an error value in release builds.
    pub(crate) fn out_of_range(requested: usize, available: usize) -> Self {
        if cfg!(debug_assertions) {
            panic!("out of range: requested {requested}, available {available}");
        }
        Error::OutOfRange {
            requested,
            available,
        }
    }
}
