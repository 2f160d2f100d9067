//! Per-subscriber outbound queue
//!
//! Bounded FIFO with a drop-oldest overflow policy. For a live preview the
//! newest frame matters more than completeness, so a full queue sheds its
//! head instead of blocking the publisher or growing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use super::event::FrameEvent;

/// What happened to a pushed event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Appended
    Queued,
    /// Appended after discarding the oldest queued event
    DroppedOldest,
    /// Queue is closed; event discarded
    Closed,
}

/// Outbound queue owned by the hub, drained by one subscription
#[derive(Debug)]
pub struct SubscriberQueue {
    id: u64,
    capacity: usize,
    events: Mutex<VecDeque<Arc<FrameEvent>>>,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl SubscriberQueue {
    pub(crate) fn new(id: u64, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            id,
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events waiting
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Events discarded by the overflow policy
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Enqueue without blocking
    pub fn push(&self, event: Arc<FrameEvent>) -> PushOutcome {
        if self.is_closed() {
            return PushOutcome::Closed;
        }

        let outcome = {
            let mut events = self.lock();
            let outcome = if events.len() >= self.capacity {
                events.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
                PushOutcome::DroppedOldest
            } else {
                PushOutcome::Queued
            };
            events.push_back(event);
            outcome
        };

        self.notify.notify_one();
        outcome
    }

    /// Take the next event if one is queued
    pub fn try_pop(&self) -> Option<Arc<FrameEvent>> {
        self.lock().pop_front()
    }

    /// Wait for the next event
    ///
    /// Drains anything still queued after close, then returns `None`.
    pub async fn recv(&self) -> Option<Arc<FrameEvent>> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(event) = self.try_pop() {
                return Some(event);
            }
            if self.is_closed() {
                return None;
            }

            notified.await;
        }
    }

    /// Stop accepting events and wake the reader
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Arc<FrameEvent>>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
