//! Forwarding counters.
//!
//! Cheap relaxed atomics, so a snapshot can be read from outside the
//! forwarding loop without coordination.

use std::sync::atomic::{AtomicU64, Ordering};

/* ---------------------------------------------------------------- *
 * Counter
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Clone for Counter {
    fn clone(&self) -> Self {
        Self {
            value: AtomicU64::new(self.value()),
        }
    }
}

/* ---------------------------------------------------------------- *
 * Gauge
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Clone for Gauge {
    fn clone(&self) -> Self {
        Self {
            value: AtomicU64::new(self.value()),
        }
    }
}

/* ---------------------------------------------------------------- *
 * Histogram
 * ---------------------------------------------------------------- */

/// Fixed-boundary histogram. A sample lands in the first bucket whose upper
/// boundary is `>=` the sample; larger samples count as overflow.
#[derive(Debug)]
pub struct Histogram {
    boundaries: Vec<u64>,
    buckets: Vec<AtomicU64>,
    overflow: AtomicU64,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(boundaries: Vec<u64>) -> Self {
        debug_assert!(boundaries.windows(2).all(|w| w[0] < w[1]), "boundaries must increase");
        Self {
            buckets: boundaries.iter().map(|_| AtomicU64::new(0)).collect(),
            boundaries,
            overflow: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Boundaries growing geometrically from `min` to at least `max`.
    pub fn exponential(min: u64, max: u64, buckets: usize) -> Self {
        assert!(min > 0 && min < max && buckets > 1);
        let factor = (max as f64 / min as f64).powf(1.0 / (buckets as f64 - 1.0));
        let mut boundaries = Vec::with_capacity(buckets);
        let mut value = min as f64;
        for _ in 0..buckets {
            let b = value.ceil() as u64;
            if boundaries.last().map_or(true, |&last| b > last) {
                boundaries.push(b);
            }
            value *= factor;
        }
        Self::new(boundaries)
    }

    pub fn observe(&self, value: u64) {
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        match self.boundaries.iter().position(|&b| value <= b) {
            Some(idx) => self.buckets[idx].fetch_add(1, Ordering::Relaxed),
            None => self.overflow.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn average(&self) -> f64 {
        match self.count() {
            0 => 0.0,
            c => self.sum.load(Ordering::Relaxed) as f64 / c as f64,
        }
    }

    /// `(upper boundary, count)` per bucket.
    pub fn counts(&self) -> Vec<(u64, u64)> {
        self.boundaries
            .iter()
            .zip(&self.buckets)
            .map(|(&b, c)| (b, c.load(Ordering::Relaxed)))
            .collect()
    }

    pub fn overflow(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }
}

impl Clone for Histogram {
    fn clone(&self) -> Self {
        let copy = |a: &AtomicU64| AtomicU64::new(a.load(Ordering::Relaxed));
        Self {
            boundaries: self.boundaries.clone(),
            buckets: self.buckets.iter().map(copy).collect(),
            overflow: copy(&self.overflow),
            sum: copy(&self.sum),
            count: copy(&self.count),
        }
    }
}

/* ---------------------------------------------------------------- *
 * Aggregate forwarding metrics
 * ---------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub struct ForwarderMetrics {
    // Interest pipeline
    pub interests_received: Counter,
    pub interests_forwarded: Counter,
    pub interests_aggregated: Counter,
    pub interests_dropped: Counter,
    pub interests_timed_out: Counter,

    // Nacks
    pub nacks_received: Counter,
    pub nacks_sent: Counter,

    // Data pipeline
    pub data_received: Counter,
    pub data_sent: Counter,
    pub data_unsolicited: Counter,

    // Tables
    pub fib_hits: Counter,
    pub fib_misses: Counter,
    pub pit_size: Gauge,
    pub cs_hits: Counter,
    pub cs_misses: Counter,

    // Faces
    pub rate_limited: Counter,

    /// Round-trip samples in microseconds.
    pub rtt_us: Histogram,
}

impl ForwarderMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for ForwarderMetrics {
    fn default() -> Self {
        Self {
            interests_received: Counter::new(),
            interests_forwarded: Counter::new(),
            interests_aggregated: Counter::new(),
            interests_dropped: Counter::new(),
            interests_timed_out: Counter::new(),
            nacks_received: Counter::new(),
            nacks_sent: Counter::new(),
            data_received: Counter::new(),
            data_sent: Counter::new(),
            data_unsolicited: Counter::new(),
            fib_hits: Counter::new(),
            fib_misses: Counter::new(),
            pit_size: Gauge::new(),
            cs_hits: Counter::new(),
            cs_misses: Counter::new(),
            rate_limited: Counter::new(),
            rtt_us: Histogram::exponential(100, 10_000_000, 12),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_buckets() {
        let h = Histogram::new(vec![10, 100, 1000]);
        for v in [1, 10, 11, 500, 5000] {
            h.observe(v);
        }
        assert_eq!(h.counts(), vec![(10, 2), (100, 1), (1000, 1)]);
        assert_eq!(h.overflow(), 1);
        assert_eq!(h.count(), 5);
        assert!((h.average() - 1104.4).abs() < 1e-9);
    }

    #[test]
    fn test_exponential_boundaries() {
        let h = Histogram::exponential(1, 1000, 4);
        let bounds: Vec<u64> = h.counts().into_iter().map(|(b, _)| b).collect();
        assert_eq!(bounds.first(), Some(&1));
        assert!(bounds.windows(2).all(|w| w[0] < w[1]));
        assert!(*bounds.last().unwrap() >= 1000);
    }

    #[test]
    fn test_counter_clone_snapshots() {
        let c = Counter::new();
        c.add(3);
        let snapshot = c.clone();
        c.increment();
        assert_eq!(snapshot.value(), 3);
        assert_eq!(c.value(), 4);
    }
}
