//! Identifiers shared by the forwarding components.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a face, assigned on registration and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceId(pub u32);

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "face{}", self.0)
    }
}

/// Face type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaceType {
    /// Network device link.
    NetDevice,
    /// In-process application endpoint.
    App,
}

impl fmt::Display for FaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaceType::NetDevice => write!(f, "net-device"),
            FaceType::App => write!(f, "app"),
        }
    }
}
