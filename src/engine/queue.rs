//! External event queue, delayed events, and wake-up coalescing.
//!
//! The external queue is shared: producers append from any thread through
//! [`PostHandle`](crate::engine::PostHandle) or the machine itself, but
//! only the owning processing context drains it. Delayed events hold a
//! cancellable handle; cancellation before expiry removes the event with
//! no side effects. The internal queue is not here: it is owned privately
//! by the machine and never leaves the processing context.

use crate::core::Event;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Cancellable handle for an event posted with a delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DelayedEventId(Uuid);

impl DelayedEventId {
    fn mint() -> Self {
        Self(Uuid::new_v4())
    }
}

struct DelayedEntry {
    id: DelayedEventId,
    deadline: Instant,
    event: Event,
}

#[derive(Default)]
struct QueueInner {
    external: VecDeque<Event>,
    delayed: Vec<DelayedEntry>,
}

/// Producer-facing half of the machine: external queue, delay table, and
/// the coalescing wake-up / stop flags.
pub(crate) struct SharedQueue {
    inner: Mutex<QueueInner>,
    scheduled: AtomicBool,
    stop_requested: AtomicBool,
}

impl SharedQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            scheduled: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        // A producer panicking mid-append leaves the queue consistent
        // enough to keep draining.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an external event and schedule a wake-up.
    pub(crate) fn post(&self, event: Event) {
        self.lock().external.push_back(event);
        self.schedule();
    }

    /// Record a delayed event; it only becomes visible to the drain once
    /// its deadline passes.
    pub(crate) fn post_delayed(&self, event: Event, delay: Duration) -> DelayedEventId {
        let id = DelayedEventId::mint();
        self.lock().delayed.push(DelayedEntry {
            id,
            deadline: Instant::now() + delay,
            event,
        });
        id
    }

    /// Cancel a delayed event. Returns `false` if it already fired or was
    /// already cancelled.
    pub(crate) fn cancel(&self, id: DelayedEventId) -> bool {
        let mut inner = self.lock();
        let before = inner.delayed.len();
        inner.delayed.retain(|entry| entry.id != id);
        inner.delayed.len() != before
    }

    /// Move events whose deadline has passed into the external queue, in
    /// deadline order.
    pub(crate) fn promote_due(&self, now: Instant) {
        let mut inner = self.lock();
        let mut due: Vec<DelayedEntry> = Vec::new();
        let mut remaining: Vec<DelayedEntry> = Vec::new();
        for entry in inner.delayed.drain(..) {
            if entry.deadline <= now {
                due.push(entry);
            } else {
                remaining.push(entry);
            }
        }
        due.sort_by_key(|entry| entry.deadline);
        inner.delayed = remaining;
        for entry in due {
            inner.external.push_back(entry.event);
        }
    }

    pub(crate) fn pop_external(&self) -> Option<Event> {
        self.lock().external.pop_front()
    }

    pub(crate) fn clear(&self) {
        let mut inner = self.lock();
        inner.external.clear();
        inner.delayed.clear();
    }

    /// Idempotent wake-up: the first call after a drain flips the flag,
    /// further calls coalesce.
    pub(crate) fn schedule(&self) -> bool {
        self.scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    pub(crate) fn clear_scheduled(&self) {
        self.scheduled.store(false, Ordering::Release);
    }

    /// Request that the processing context stop draining.
    pub(crate) fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.schedule();
    }

    /// Consume a pending stop request.
    pub(crate) fn take_stop(&self) -> bool {
        self.stop_requested.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posted_events_drain_in_fifo_order() {
        let q = SharedQueue::new();
        q.post(Event::new("one"));
        q.post(Event::new("two"));
        assert_eq!(q.pop_external().map(|e| e.name), Some("one".into()));
        assert_eq!(q.pop_external().map(|e| e.name), Some("two".into()));
        assert!(q.pop_external().is_none());
    }

    #[test]
    fn delayed_event_is_invisible_until_due() {
        let q = SharedQueue::new();
        q.post_delayed(Event::new("later"), Duration::from_secs(60));
        q.promote_due(Instant::now());
        assert!(q.pop_external().is_none());
    }

    #[test]
    fn due_events_promote_in_deadline_order() {
        let q = SharedQueue::new();
        q.post_delayed(Event::new("second"), Duration::from_millis(2));
        q.post_delayed(Event::new("first"), Duration::from_millis(1));
        q.promote_due(Instant::now() + Duration::from_secs(1));
        assert_eq!(q.pop_external().map(|e| e.name), Some("first".into()));
        assert_eq!(q.pop_external().map(|e| e.name), Some("second".into()));
    }

    #[test]
    fn cancel_removes_pending_delayed_event() {
        let q = SharedQueue::new();
        let id = q.post_delayed(Event::new("later"), Duration::from_secs(60));
        assert!(q.cancel(id));
        assert!(!q.cancel(id), "second cancel is a no-op");
        q.promote_due(Instant::now() + Duration::from_secs(120));
        assert!(q.pop_external().is_none());
    }

    #[test]
    fn schedule_coalesces_until_cleared() {
        let q = SharedQueue::new();
        assert!(q.schedule(), "first trigger wins the wake-up");
        assert!(!q.schedule(), "second trigger coalesces");
        assert!(q.is_scheduled());
        q.clear_scheduled();
        assert!(q.schedule());
    }

    #[test]
    fn stop_request_is_consumed_once() {
        let q = SharedQueue::new();
        q.request_stop();
        assert!(q.take_stop());
        assert!(!q.take_stop());
    }
}
