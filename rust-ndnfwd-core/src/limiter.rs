//! Leaky-bucket rate limiter attached to each face.
//!
//! Every successful send pours its cost into the bucket and the bucket drains
//! at a constant rate. A face may send while the level is below capacity.
//! Draining is lazy: callers pass the current time and the elapsed interval
//! since the previous leak is applied in one step.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct LeakyBucket {
    /// Current fill level in cost units.
    level: f64,

    /// Capacity. `f64::INFINITY` disables limiting.
    max: f64,

    /// Units drained per second.
    leak_rate: f64,

    /// Time of the last leak.
    last_leak: Duration,
}

impl LeakyBucket {
    /// A bucket that never limits.
    pub fn unlimited() -> Self {
        Self::new(f64::INFINITY, 0.0)
    }

    pub fn new(max: f64, leak_rate: f64) -> Self {
        Self {
            level: 0.0,
            max,
            leak_rate,
            last_leak: Duration::ZERO,
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn leak_rate(&self) -> f64 {
        self.leak_rate
    }

    pub fn is_limited(&self) -> bool {
        self.max.is_finite()
    }

    pub fn set_max(&mut self, max: f64) {
        self.max = max;
    }

    pub fn set_leak_rate(&mut self, rate: f64) {
        self.leak_rate = rate.max(0.0);
    }

    /// Drains `rate * interval`, clamping at zero.
    pub fn leak(&mut self, interval: Duration) {
        self.level = (self.level - self.leak_rate * interval.as_secs_f64()).max(0.0);
    }

    /// Drains for the time elapsed since the last leak.
    pub fn leak_until(&mut self, now: Duration) {
        if now > self.last_leak {
            self.leak(now - self.last_leak);
            self.last_leak = now;
        }
    }

    pub fn is_below_limit(&self) -> bool {
        self.level < self.max
    }

    pub fn fill(&mut self, cost: f64) {
        self.level += cost;
    }
}

impl Default for LeakyBucket {
    fn default() -> Self {
        Self::unlimited()
    }
}
