//! Forwarding strategies.
//!
//! A strategy decides which faces of a FIB entry an Interest goes out on.
//! All variants work from the same inputs: the entry's ranked face metrics
//! and the face table.

use crate::error::Error;
use crate::face::FaceTable;
use crate::fib::{FaceStatus, FibEntry};
use log::trace;
use rust_ndnfwd_common::{FaceId, FaceType, Name, Packet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Send on the best usable face only.
    #[default]
    BestRoute,
    /// Send on every usable face.
    #[serde(alias = "broadcast")]
    Flooding,
    /// Best route while the best face is GREEN, flooding otherwise.
    SmartFlooding,
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best-route" => Ok(Strategy::BestRoute),
            "flooding" | "broadcast" => Ok(Strategy::Flooding),
            "smart-flooding" => Ok(Strategy::SmartFlooding),
            other => Err(Error::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::BestRoute => write!(f, "best-route"),
            Strategy::Flooding => write!(f, "flooding"),
            Strategy::SmartFlooding => write!(f, "smart-flooding"),
        }
    }
}

/// Per-Interest constraints on face selection.
#[derive(Debug, Clone, Copy)]
pub struct ForwardingContext<'a> {
    /// Faces the Interest must not go out on: where it came from and where
    /// it was already sent.
    pub exclude: &'a [FaceId],

    /// Interest scope. 0 and 1 keep the Interest on application faces.
    pub scope: Option<u8>,

    /// Current time, used to leak face buckets before checking them.
    pub now: Duration,
}

/// What happened when an Interest was propagated.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Propagation {
    /// Faces the Interest went out on.
    pub sent: Vec<FaceId>,

    /// At least one otherwise usable face was over its rate limit.
    pub congested: bool,

    /// Faces whose transport rejected the packet.
    pub failed: Vec<FaceId>,

    /// RED faces that took the Interest because no usable face did. Also
    /// listed in `sent`.
    pub revived: Vec<FaceId>,
}

impl Propagation {
    pub fn is_sent(&self) -> bool {
        !self.sent.is_empty()
    }
}

enum Attempt {
    Sent,
    Ineligible,
    Limited,
    Failed,
}

impl Strategy {
    /// Sends `packet` according to the strategy.
    ///
    /// RED faces are skipped. When nothing else took the Interest and the
    /// entry has no GREEN face, the best RED face is tried once so that a
    /// recovered link can come back.
    pub fn propagate(
        &self,
        entry: &FibEntry,
        faces: &mut FaceTable,
        packet: &Packet,
        ctx: &ForwardingContext<'_>,
    ) -> Propagation {
        let mut result = match self {
            Strategy::BestRoute => best_route(entry, faces, packet, ctx),
            Strategy::Flooding => flooding(entry, faces, packet, ctx),
            Strategy::SmartFlooding => match entry.find_best_candidate(0) {
                Ok(best) if best.status() == FaceStatus::Green => best_route(entry, faces, packet, ctx),
                _ => flooding(entry, faces, packet, ctx),
            },
        };
        if !result.is_sent() && entry.needs_probing() {
            retry_red_face(entry, faces, packet, ctx, &mut result);
        }
        result
    }
}

fn best_route(
    entry: &FibEntry,
    faces: &mut FaceTable,
    packet: &Packet,
    ctx: &ForwardingContext<'_>,
) -> Propagation {
    let mut result = Propagation::default();
    let mut skip = 0;
    while let Ok(metric) = entry.find_best_candidate(skip) {
        skip += 1;
        match attempt(metric.face(), metric.status(), faces, packet, ctx) {
            Attempt::Sent => {
                result.sent.push(metric.face());
                break;
            }
            Attempt::Limited => result.congested = true,
            Attempt::Failed => result.failed.push(metric.face()),
            Attempt::Ineligible => {}
        }
    }
    result
}

fn flooding(
    entry: &FibEntry,
    faces: &mut FaceTable,
    packet: &Packet,
    ctx: &ForwardingContext<'_>,
) -> Propagation {
    let mut result = Propagation::default();
    for metric in entry.ranked() {
        match attempt(metric.face(), metric.status(), faces, packet, ctx) {
            Attempt::Sent => result.sent.push(metric.face()),
            Attempt::Limited => result.congested = true,
            Attempt::Failed => result.failed.push(metric.face()),
            Attempt::Ineligible => {}
        }
    }
    result
}

fn retry_red_face(
    entry: &FibEntry,
    faces: &mut FaceTable,
    packet: &Packet,
    ctx: &ForwardingContext<'_>,
    result: &mut Propagation,
) {
    let red = entry.ranked().into_iter().filter(|m| m.status() == FaceStatus::Red);
    for metric in red {
        if result.failed.contains(&metric.face()) {
            continue;
        }
        match attempt(metric.face(), FaceStatus::Yellow, faces, packet, ctx) {
            Attempt::Sent => {
                trace!("[Strategy] Retrying RED {} for {}", metric.face(), entry.prefix());
                result.sent.push(metric.face());
                result.revived.push(metric.face());
                break;
            }
            Attempt::Limited => result.congested = true,
            Attempt::Failed => result.failed.push(metric.face()),
            Attempt::Ineligible => {}
        }
    }
}

fn attempt(
    id: FaceId,
    status: FaceStatus,
    faces: &mut FaceTable,
    packet: &Packet,
    ctx: &ForwardingContext<'_>,
) -> Attempt {
    if status == FaceStatus::Red || ctx.exclude.contains(&id) {
        return Attempt::Ineligible;
    }
    let Some(face) = faces.get_mut(id) else {
        return Attempt::Ineligible;
    };
    if !face.is_up() {
        return Attempt::Ineligible;
    }
    if matches!(ctx.scope, Some(0) | Some(1)) && face.face_type() != FaceType::App {
        return Attempt::Ineligible;
    }

    face.leak_until(ctx.now);
    if !face.is_below_limit() {
        trace!("[Strategy] {} over its limit", id);
        return Attempt::Limited;
    }
    if face.send(packet) {
        Attempt::Sent
    } else {
        Attempt::Failed
    }
}

/// Strategy per name prefix, resolved by longest-prefix match. The root
/// prefix always carries a strategy.
#[derive(Debug, Clone)]
pub struct StrategyChoice {
    choices: HashMap<Name, Strategy>,
}

impl StrategyChoice {
    pub fn new(default: Strategy) -> Self {
        Self {
            choices: HashMap::from([(Name::new(), default)]),
        }
    }

    pub fn set(&mut self, prefix: Name, strategy: Strategy) {
        self.choices.insert(prefix, strategy);
    }

    /// Removes the choice for `prefix`. The root choice cannot be removed.
    pub fn unset(&mut self, prefix: &Name) -> bool {
        !prefix.is_empty() && self.choices.remove(prefix).is_some()
    }

    pub fn default_strategy(&self) -> Strategy {
        self.choices.get(&Name::new()).copied().unwrap_or_default()
    }

    /// Strategy of the longest configured prefix of `name`.
    pub fn find(&self, name: &Name) -> Strategy {
        (0..=name.len())
            .rev()
            .find_map(|k| self.choices.get(&name.prefix(k)).copied())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Strategy)> {
        self.choices.iter()
    }
}

impl Default for StrategyChoice {
    fn default() -> Self {
        Self::new(Strategy::default())
    }
}
