//! Timer service.
//!
//! The forwarder never reads a wall clock. Time is whatever the scheduler
//! says it is, which lets a simulation or a test drive expiry
//! deterministically.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

/// Handle returned by [`Scheduler::schedule_after`], used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Source of time and delayed events.
pub trait Scheduler<E> {
    /// Current time, measured from the scheduler's epoch.
    fn now(&self) -> Duration;

    /// Schedules `event` to fire `delay` after [`Scheduler::now`].
    fn schedule_after(&mut self, delay: Duration, event: E) -> TimerId;

    /// Cancels a pending timer. Returns false if it already fired or was cancelled.
    fn cancel(&mut self, id: TimerId) -> bool;

    /// Pops the earliest event due at or before `until`, moving the clock to
    /// its firing time.
    fn pop_due(&mut self, until: Duration) -> Option<(TimerId, E)>;

    /// Moves the clock forward to `time`. Never moves it backwards.
    fn advance_to(&mut self, time: Duration);
}

/// Discrete-event queue ordered by firing time, then by insertion.
#[derive(Debug)]
pub struct EventQueue<E> {
    now: Duration,
    next_id: u64,
    queue: BinaryHeap<Reverse<(Duration, u64)>>,
    pending: HashMap<u64, E>,
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            queue: BinaryHeap::new(),
            pending: HashMap::new(),
        }
    }

    /// Number of timers still pending.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Scheduler<E> for EventQueue<E> {
    fn now(&self) -> Duration {
        self.now
    }

    fn schedule_after(&mut self, delay: Duration, event: E) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(Reverse((self.now + delay, id)));
        self.pending.insert(id, event);
        TimerId(id)
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        // The heap slot is dropped lazily when it reaches the top.
        self.pending.remove(&id.0).is_some()
    }

    fn pop_due(&mut self, until: Duration) -> Option<(TimerId, E)> {
        while let Some(&Reverse((at, id))) = self.queue.peek() {
            if at > until {
                return None;
            }
            self.queue.pop();
            if let Some(event) = self.pending.remove(&id) {
                self.now = self.now.max(at);
                return Some((TimerId(id), event));
            }
        }
        None
    }

    fn advance_to(&mut self, time: Duration) {
        self.now = self.now.max(time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_fire_in_time_order() {
        let mut q = EventQueue::new();
        q.schedule_after(Duration::from_millis(30), "c");
        q.schedule_after(Duration::from_millis(10), "a");
        q.schedule_after(Duration::from_millis(10), "b");

        let until = Duration::from_millis(20);
        assert_eq!(q.pop_due(until).map(|(_, e)| e), Some("a"));
        assert_eq!(q.pop_due(until).map(|(_, e)| e), Some("b"));
        assert_eq!(q.now(), Duration::from_millis(10));
        assert!(q.pop_due(until).is_none());

        q.advance_to(until);
        assert_eq!(q.now(), until);
        assert_eq!(q.pop_due(Duration::from_secs(1)).map(|(_, e)| e), Some("c"));
        assert!(q.is_empty());
    }

    #[test]
    fn test_cancel() {
        let mut q = EventQueue::new();
        let a = q.schedule_after(Duration::from_millis(5), 1);
        q.schedule_after(Duration::from_millis(6), 2);
        assert!(q.cancel(a));
        assert!(!q.cancel(a));
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_due(Duration::from_secs(1)).map(|(_, e)| e), Some(2));
    }

    #[test]
    fn test_clock_never_moves_backwards() {
        let mut q: EventQueue<()> = EventQueue::new();
        q.advance_to(Duration::from_secs(5));
        q.advance_to(Duration::from_secs(1));
        assert_eq!(q.now(), Duration::from_secs(5));
    }
}
