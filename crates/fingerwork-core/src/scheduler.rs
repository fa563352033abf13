#![forbid(unsafe_code)]

//! Deferred continuations driven by the caller's clock.
//!
//! Aggregation windows and release grace periods are "fire once after a fixed
//! delay" tasks. Nothing runs on a background thread: the engine drains due
//! tasks at the start of every input call and every frame, so deferred work
//! interleaves with input in a deterministic order.
//!
//! # Invariants
//!
//! 1. [`DeferredQueue::pop_due`] yields tasks in deadline order; tasks with
//!    equal deadlines fire in the order they were scheduled.
//! 2. A task never fires before its deadline.
//!
//! There is no cancel. Payloads carry enough identity (a cluster generation,
//! a release token) for the receiver to recognize and discard stale tasks.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use web_time::{Duration, Instant};

struct Entry<T> {
    deadline: Instant,
    seq: u64,
    payload: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // Reversed so the max-heap pops the earliest deadline first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A min-heap of tasks keyed by deadline.
pub struct DeferredQueue<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

impl<T> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for DeferredQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("pending", &self.heap.len())
            .field("next_deadline", &self.next_deadline())
            .finish()
    }
}

impl<T> DeferredQueue<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `payload` to fire at `deadline`.
    pub fn schedule_at(&mut self, deadline: Instant, payload: T) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.heap.push(Entry {
            deadline,
            seq,
            payload,
        });
    }

    /// Schedule `payload` to fire `delay` after `now`.
    pub fn schedule(&mut self, now: Instant, delay: Duration, payload: T) {
        self.schedule_at(now + delay, payload);
    }

    /// Remove and return the earliest task whose deadline is `<= now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<(Instant, T)> {
        if self.heap.peek()?.deadline > now {
            return None;
        }
        self.heap.pop().map(|e| (e.deadline, e.payload))
    }

    /// Deadline of the next pending task.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|e| e.deadline)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drop every pending task.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
