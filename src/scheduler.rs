//! Deferred callbacks posted back onto the monitor's own serial timeline.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

/// Identifies one pending dismiss timer. A timer whose token no longer matches
/// the overlay's current token is stale and does nothing when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deferred {
    Redirect { app_id: String },
    AutoDismiss(TimerToken),
    GraceElapsed(TimerToken),
}

pub trait Scheduler {
    fn schedule(&mut self, delay: Duration, task: Deferred);
}

/// Time source for the monitor's debounce. Never follows wall-clock steps.
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Timer {
    due: Instant,
    seq: u64,
    task: Deferred,
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

/// Min-heap of deferred tasks. Tasks with equal deadlines fire in scheduling order.
#[derive(Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<Timer>>,
    seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_at(&mut self, due: Instant, task: Deferred) {
        self.seq += 1;
        self.heap.push(Reverse(Timer {
            due,
            seq: self.seq,
            task,
        }));
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(t)| t.due)
    }

    /// Pop the earliest task if it is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<Deferred> {
        if self.next_deadline()? > now {
            return None;
        }
        self.heap.pop().map(|Reverse(t)| t.task)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl Scheduler for TimerQueue {
    fn schedule(&mut self, delay: Duration, task: Deferred) {
        self.schedule_at(Instant::now() + delay, task);
    }
}
