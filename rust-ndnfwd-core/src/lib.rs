//! Forwarding core: faces, FIB, PIT, Content Store, strategies and the
//! forwarder that ties them together.
//!
//! The core is single-threaded and event driven. Packets enter through
//! [`Forwarder::receive`], timers fire through [`Forwarder::run_until`], and
//! faces push bytes out through their [`Transport`].

pub mod attributes;
pub mod config;
pub mod cs;
pub mod error;
pub mod face;
pub mod fib;
pub mod forwarder;
pub mod limiter;
pub mod pit;
pub mod scheduler;
pub mod strategy;

pub use attributes::Attributes;
pub use config::{FaceConfig, ForwarderConfig, RouteConfig};
pub use cs::ContentStore;
pub use error::Error;
pub use face::{app_channel, AppHandle, AppTransport, Face, FaceTable, Transport};
pub use fib::{EntryId, FaceMetric, FaceStatus, Fib, FibEntry};
pub use forwarder::{Disposition, Forwarder, ForwarderEvent, ProtocolHandler};
pub use limiter::LeakyBucket;
pub use pit::{Pit, PitEntry};
pub use scheduler::{EventQueue, Scheduler, TimerId};
pub use strategy::{Strategy, StrategyChoice};

pub type Result<T> = std::result::Result<T, Error>;
