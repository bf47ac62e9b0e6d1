//! FIB entry: a prefix and the faces it can be forwarded on.

use crate::error::Error;
use log::trace;
use rust_ndnfwd_common::{FaceId, Name};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const RTT_ALPHA: f64 = 1.0 / 8.0;
const RTT_BETA: f64 = 1.0 / 4.0;

/// Health of a face for one prefix. Ordered best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FaceStatus {
    /// Known to bring data back.
    Green,
    /// Untested or recently failed.
    Yellow,
    /// Known not to work.
    Red,
}

impl fmt::Display for FaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaceStatus::Green => write!(f, "GREEN"),
            FaceStatus::Yellow => write!(f, "YELLOW"),
            FaceStatus::Red => write!(f, "RED"),
        }
    }
}

/// Routing state of one face within one FIB entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceMetric {
    face: FaceId,
    cost: i32,
    status: FaceStatus,

    /// Smoothed RTT, `None` until the first sample.
    srtt: Option<Duration>,
    rttvar: Duration,
}

impl FaceMetric {
    pub fn new(face: FaceId, cost: i32) -> Self {
        Self {
            face,
            cost,
            status: FaceStatus::Green,
            srtt: None,
            rttvar: Duration::ZERO,
        }
    }

    pub fn face(&self) -> FaceId {
        self.face
    }

    pub fn cost(&self) -> i32 {
        self.cost
    }

    pub fn status(&self) -> FaceStatus {
        self.status
    }

    pub fn srtt(&self) -> Option<Duration> {
        self.srtt
    }

    pub fn rttvar(&self) -> Duration {
        self.rttvar
    }

    /// Retransmission timeout, `srtt + 4 * rttvar`. `None` before any sample.
    pub fn rto(&self) -> Option<Duration> {
        self.srtt.map(|srtt| srtt + self.rttvar * 4)
    }

    /// Folds one RTT sample into the estimator.
    pub fn update_rtt(&mut self, sample: Duration) {
        match self.srtt {
            None => {
                self.srtt = Some(sample);
                self.rttvar = sample / 2;
            }
            Some(srtt) => {
                let s = srtt.as_secs_f64();
                let x = sample.as_secs_f64();
                let var = (1.0 - RTT_BETA) * self.rttvar.as_secs_f64() + RTT_BETA * (x - s).abs();
                let smoothed = (1.0 - RTT_ALPHA) * s + RTT_ALPHA * x;
                self.rttvar = Duration::from_secs_f64(var.max(0.0));
                self.srtt = Some(Duration::from_secs_f64(smoothed.max(0.0)));
            }
        }
    }

    /// Ranking key: status first, then cost.
    fn rank(&self) -> (FaceStatus, i32) {
        (self.status, self.cost)
    }
}

/// A FIB row: a name prefix and its candidate faces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FibEntry {
    prefix: Name,

    /// Face metrics in insertion order. Ranking is computed on read.
    faces: Vec<FaceMetric>,

    /// Set when the best candidate is not known to work.
    needs_probing: bool,
}

impl FibEntry {
    pub fn new(prefix: Name) -> Self {
        Self {
            prefix,
            faces: Vec::new(),
            needs_probing: false,
        }
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    /// Face metrics in insertion order.
    pub fn faces(&self) -> &[FaceMetric] {
        &self.faces
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn needs_probing(&self) -> bool {
        self.needs_probing
    }

    pub fn set_needs_probing(&mut self, needs_probing: bool) {
        self.needs_probing = needs_probing;
    }

    pub fn metric(&self, face: FaceId) -> Option<&FaceMetric> {
        self.faces.iter().find(|m| m.face == face)
    }

    fn metric_mut(&mut self, face: FaceId) -> Option<&mut FaceMetric> {
        self.faces.iter_mut().find(|m| m.face == face)
    }

    /// Adds `face` with `cost`, or updates the cost if the face is already
    /// present. A newly added face starts GREEN.
    pub fn add_or_update_route(&mut self, face: FaceId, cost: i32) {
        match self.metric_mut(face) {
            Some(metric) => metric.cost = cost,
            None => self.faces.push(FaceMetric::new(face, cost)),
        }
        self.refresh_probing();
    }

    /// Returns true if the face was present.
    pub fn remove_face(&mut self, face: FaceId) -> bool {
        let before = self.faces.len();
        self.faces.retain(|m| m.face != face);
        self.refresh_probing();
        self.faces.len() != before
    }

    /// Returns false if `face` is not part of this entry.
    pub fn update_rtt(&mut self, face: FaceId, sample: Duration) -> bool {
        match self.metric_mut(face) {
            Some(metric) => {
                metric.update_rtt(sample);
                true
            }
            None => false,
        }
    }

    /// Returns false if `face` is not part of this entry.
    pub fn update_status(&mut self, face: FaceId, status: FaceStatus) -> bool {
        let prefix = &self.prefix;
        let Some(metric) = self.faces.iter_mut().find(|m| m.face == face) else {
            return false;
        };
        if metric.status != status {
            trace!("[FIB {}] {} {} -> {}", prefix, face, metric.status, status);
            metric.status = status;
        }
        self.refresh_probing();
        true
    }

    /// Faces ordered by (status, cost). Ties keep insertion order.
    pub fn ranked(&self) -> Vec<&FaceMetric> {
        let mut ranked: Vec<&FaceMetric> = self.faces.iter().collect();
        ranked.sort_by_key(|m| m.rank());
        ranked
    }

    /// The `skip`-th best face.
    pub fn find_best_candidate(&self, skip: usize) -> Result<&FaceMetric, Error> {
        self.ranked()
            .into_iter()
            .nth(skip)
            .ok_or_else(|| Error::NoFaces(self.prefix.clone()))
    }

    /// Marks every face RED at the maximum cost.
    pub fn invalidate(&mut self) {
        for metric in &mut self.faces {
            metric.status = FaceStatus::Red;
            metric.cost = i32::MAX;
        }
        self.refresh_probing();
    }

    fn refresh_probing(&mut self) {
        self.needs_probing = match self.faces.iter().min_by_key(|m| m.rank()) {
            Some(best) => best.status != FaceStatus::Green,
            None => false,
        };
    }
}

impl fmt::Display for FibEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix)?;
        for (i, metric) in self.ranked().into_iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{}{}(cost={}, {})", sep, metric.face, metric.cost, metric.status)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> FibEntry {
        FibEntry::new("/a".parse().unwrap())
    }

    #[test]
    fn test_ranking_by_status_then_cost() {
        let mut e = entry();
        e.add_or_update_route(FaceId(1), 5);
        e.add_or_update_route(FaceId(2), 1);
        e.add_or_update_route(FaceId(3), 2);
        e.update_status(FaceId(2), FaceStatus::Red);

        assert_eq!(e.find_best_candidate(0).unwrap().face(), FaceId(3));
        assert_eq!(e.find_best_candidate(1).unwrap().face(), FaceId(1));
        assert_eq!(e.find_best_candidate(2).unwrap().face(), FaceId(2));
        assert!(matches!(e.find_best_candidate(3), Err(Error::NoFaces(_))));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut e = entry();
        e.add_or_update_route(FaceId(7), 3);
        e.add_or_update_route(FaceId(4), 3);
        let order: Vec<FaceId> = e.ranked().iter().map(|m| m.face()).collect();
        assert_eq!(order, vec![FaceId(7), FaceId(4)]);
    }

    #[test]
    fn test_empty_entry_has_no_candidate() {
        assert!(matches!(entry().find_best_candidate(0), Err(Error::NoFaces(_))));
    }

    #[test]
    fn test_readd_updates_cost_in_place() {
        let mut e = entry();
        e.add_or_update_route(FaceId(1), 10);
        e.add_or_update_route(FaceId(1), 2);
        assert_eq!(e.face_count(), 1);
        assert_eq!(e.metric(FaceId(1)).unwrap().cost(), 2);
    }

    #[test]
    fn test_rtt_estimator() {
        let mut m = FaceMetric::new(FaceId(0), 0);
        assert_eq!(m.rto(), None);

        m.update_rtt(Duration::from_millis(100));
        assert_eq!(m.srtt(), Some(Duration::from_millis(100)));
        assert_eq!(m.rttvar(), Duration::from_millis(50));
        assert_eq!(m.rto(), Some(Duration::from_millis(300)));

        // rttvar = 3/4 * 50 + 1/4 * |200 - 100| = 62.5
        // srtt   = 7/8 * 100 + 1/8 * 200 = 112.5
        m.update_rtt(Duration::from_millis(200));
        let srtt = m.srtt().unwrap().as_secs_f64() * 1000.0;
        let rttvar = m.rttvar().as_secs_f64() * 1000.0;
        assert!((srtt - 112.5).abs() < 1e-3, "srtt {srtt}");
        assert!((rttvar - 62.5).abs() < 1e-3, "rttvar {rttvar}");
    }

    #[test]
    fn test_rtt_does_not_affect_ranking() {
        let mut e = entry();
        e.add_or_update_route(FaceId(1), 1);
        e.add_or_update_route(FaceId(2), 2);
        e.update_rtt(FaceId(1), Duration::from_secs(5));
        e.update_rtt(FaceId(2), Duration::from_millis(1));
        assert_eq!(e.find_best_candidate(0).unwrap().face(), FaceId(1));
    }

    #[test]
    fn test_invalidate_and_probing() {
        let mut e = entry();
        e.add_or_update_route(FaceId(1), 1);
        e.add_or_update_route(FaceId(2), 2);
        assert!(!e.needs_probing());

        e.update_status(FaceId(1), FaceStatus::Yellow);
        // face2 is still green and now ranks first
        assert!(!e.needs_probing());
        e.update_status(FaceId(2), FaceStatus::Yellow);
        assert!(e.needs_probing());

        e.invalidate();
        assert!(e.faces().iter().all(|m| m.status() == FaceStatus::Red && m.cost() == i32::MAX));
        assert!(e.needs_probing());
    }

    #[test]
    fn test_remove_face() {
        let mut e = entry();
        e.add_or_update_route(FaceId(1), 1);
        assert!(e.remove_face(FaceId(1)));
        assert!(!e.remove_face(FaceId(1)));
        assert!(e.is_empty());
        assert!(!e.update_status(FaceId(1), FaceStatus::Red));
        assert!(!e.update_rtt(FaceId(1), Duration::from_millis(1)));
    }

    #[test]
    fn test_display() {
        let mut e = entry();
        e.add_or_update_route(FaceId(1), 5);
        e.add_or_update_route(FaceId(2), 1);
        assert_eq!(e.to_string(), "/a face2(cost=1, GREEN), face1(cost=5, GREEN)");
    }
}
