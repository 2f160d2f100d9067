//! Hub implementation
//!
//! The central hub that caches the most recent frame set and fans each
//! published frame set out to every subscriber queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::config::HubConfig;
use super::error::HubError;
use super::event::FrameEvent;
use super::queue::{PushOutcome, SubscriberQueue};
use crate::frame::FrameSet;

/// Outcome of a successful publish
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PublishReceipt {
    /// Sequence assigned to the frame set
    pub sequence: u64,
    /// Subscriber queues the event was placed on
    pub delivered: usize,
    /// Timestamp carried by the event
    pub timestamp: f64,
}

/// Point-in-time hub statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    /// Sequence of the most recent publish (0 before the first)
    pub sequence: u64,
    /// Registered subscribers
    pub subscribers: usize,
    /// Whether a frame set is cached for late joiners
    pub has_latest: bool,
    /// Events shed by full subscriber queues since start
    pub dropped_events: u64,
    pub closed: bool,
}

/// Broadcast hub
///
/// Cheap to clone; all clones share one state. Construct one per process and
/// hand it to the ingest and stream handlers.
#[derive(Debug, Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

#[derive(Debug)]
struct HubInner {
    config: HubConfig,
    /// Held for a whole publish; `state` only around the bookkeeping
    publish_gate: Mutex<()>,
    state: Mutex<HubState>,
    dropped_events: AtomicU64,
}

#[derive(Debug, Default)]
struct HubState {
    sequence: u64,
    latest: Option<Arc<FrameEvent>>,
    subscribers: HashMap<u64, Arc<SubscriberQueue>>,
    next_subscriber_id: u64,
    closed: bool,
}

impl Hub {
    /// Create a new hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a new hub with custom configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                config,
                publish_gate: Mutex::new(()),
                state: Mutex::new(HubState {
                    next_subscriber_id: 1,
                    ..HubState::default()
                }),
                dropped_events: AtomicU64::new(0),
            }),
        }
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Publish a normalized frame set
    ///
    /// Publishers take turns on a gate so sequences reach the cache and the
    /// queues in order. The event is serialized while holding only the gate;
    /// the state lock covers assigning the sequence, replacing the cached
    /// frame set and enqueueing on every open subscriber queue. Queues found
    /// closed are evicted on the way.
    pub fn publish(&self, mut frame: FrameSet) -> Result<PublishReceipt, HubError> {
        let _gate = self
            .inner
            .publish_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let sequence = {
            let state = self.inner.lock();
            if state.closed {
                return Err(HubError::Closed);
            }
            state.sequence + 1
        };
        frame.sequence = sequence;
        let timestamp = *frame.timestamp.get_or_insert_with(now_secs);
        let slots = frame.slots.len();

        let event = Arc::new(FrameEvent::encode(Arc::new(frame)));

        let mut state = self.inner.lock();
        if state.closed {
            return Err(HubError::Closed);
        }
        state.sequence = sequence;
        state.latest = Some(Arc::clone(&event));

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, queue) in &state.subscribers {
            match queue.push(Arc::clone(&event)) {
                PushOutcome::Queued => delivered += 1,
                PushOutcome::DroppedOldest => {
                    delivered += 1;
                    self.inner.dropped_events.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        subscriber_id = id,
                        sequence = sequence,
                        "Subscriber queue full, dropped oldest event"
                    );
                }
                PushOutcome::Closed => dead.push(*id),
            }
        }
        for id in dead {
            state.subscribers.remove(&id);
            tracing::info!(
                subscriber_id = id,
                subscribers = state.subscribers.len(),
                "Subscriber evicted (queue closed)"
            );
        }

        tracing::info!(
            sequence = sequence,
            kind = %event.kind,
            slots = slots,
            delivered = delivered,
            "Frame set published"
        );

        Ok(PublishReceipt {
            sequence,
            delivered,
            timestamp,
        })
    }

    /// Register a new subscriber
    ///
    /// With `snapshot_on_subscribe`, the cached frame set (if any) is queued
    /// immediately so the viewer does not wait for the next publish.
    pub fn subscribe(&self) -> Result<Subscription, HubError> {
        let mut state = self.inner.lock();
        if state.closed {
            return Err(HubError::Closed);
        }

        let id = state.next_subscriber_id;
        state.next_subscriber_id += 1;

        let queue = Arc::new(SubscriberQueue::new(id, self.inner.config.queue_capacity));
        if self.inner.config.snapshot_on_subscribe {
            if let Some(latest) = &state.latest {
                queue.push(Arc::clone(latest));
            }
        }
        state.subscribers.insert(id, Arc::clone(&queue));

        tracing::info!(
            subscriber_id = id,
            subscribers = state.subscribers.len(),
            snapshot = !queue.is_empty(),
            "Subscriber added"
        );

        Ok(Subscription {
            id,
            queue,
            hub: Arc::downgrade(&self.inner),
        })
    }

    /// Remove a subscriber; returns whether it was registered
    ///
    /// Idempotent.
    pub fn unsubscribe(&self, id: u64) -> bool {
        self.inner.evict(id)
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// The cached most recent event
    pub fn latest(&self) -> Option<Arc<FrameEvent>> {
        self.inner.lock().latest.clone()
    }

    /// Sequence of the most recent publish
    pub fn sequence(&self) -> u64 {
        self.inner.lock().sequence
    }

    pub fn stats(&self) -> HubStats {
        let state = self.inner.lock();
        HubStats {
            sequence: state.sequence,
            subscribers: state.subscribers.len(),
            has_latest: state.latest.is_some(),
            dropped_events: self.inner.dropped_events.load(Ordering::Relaxed),
            closed: state.closed,
        }
    }

    /// Close every subscriber queue and refuse further publishes/subscribes
    ///
    /// Open subscriptions drain what is already queued and then end.
    pub fn shutdown(&self) {
        let mut state = self.inner.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let count = state.subscribers.len();
        for (_, queue) in state.subscribers.drain() {
            queue.close();
        }
        tracing::info!(subscribers = count, "Hub shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl HubInner {
    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn evict(&self, id: u64) -> bool {
        let mut state = self.lock();
        match state.subscribers.remove(&id) {
            Some(queue) => {
                queue.close();
                tracing::info!(
                    subscriber_id = id,
                    subscribers = state.subscribers.len(),
                    dropped = queue.dropped(),
                    "Subscriber removed"
                );
                true
            }
            None => false,
        }
    }
}

/// One viewer's registration with the hub
///
/// Dropping it unregisters synchronously, so a closed stream never leaves a
/// registration behind.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    queue: Arc<SubscriberQueue>,
    hub: Weak<HubInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next event; `None` once evicted or the hub shuts down
    pub async fn recv(&self) -> Option<Arc<FrameEvent>> {
        self.queue.recv().await
    }

    pub fn try_recv(&self) -> Option<Arc<FrameEvent>> {
        self.queue.try_pop()
    }

    /// Events waiting to be written
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Events this subscriber lost to the overflow policy
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        match self.hub.upgrade() {
            Some(hub) => {
                hub.evict(self.id);
            }
            None => self.queue.close(),
        }
    }
}

/// Seconds since the Unix epoch
fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::frame::{SlotName, SlotPayload};

    fn frame(tag: &'static [u8]) -> FrameSet {
        FrameSet::new(SlotPayload::new("image/png", Bytes::from_static(tag)))
    }

    #[tokio::test]
    async fn test_publish_assigns_sequence() {
        let hub = Hub::new();

        let first = hub.publish(frame(b"a")).unwrap();
        let second = hub.publish(frame(b"b")).unwrap();

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(first.delivered, 0);
        assert!(second.timestamp > 0.0);
        assert_eq!(hub.sequence(), 2);
        assert_eq!(hub.latest().unwrap().frame.main().unwrap().data.as_ref(), b"b");
    }

    #[tokio::test]
    async fn test_producer_timestamp_kept() {
        let hub = Hub::new();
        let mut f = frame(b"a");
        f.timestamp = Some(42.0);
        let receipt = hub.publish(f).unwrap();
        assert_eq!(receipt.timestamp, 42.0);
    }

    #[tokio::test]
    async fn test_subscribe_receives_publish() {
        let hub = Hub::new();
        let sub = hub.subscribe().unwrap();
        assert_eq!(hub.subscriber_count(), 1);

        let receipt = hub.publish(frame(b"a")).unwrap();
        assert_eq!(receipt.delivered, 1);

        let event = sub.recv().await.unwrap();
        assert_eq!(event.sequence(), 1);
    }

    #[tokio::test]
    async fn test_late_join_snapshot() {
        let hub = Hub::new();
        for tag in [b"1", b"2", b"3"] {
            hub.publish(frame(tag)).unwrap();
        }

        let late = hub.subscribe().unwrap();
        let event = late.try_recv().unwrap();
        assert_eq!(event.sequence(), 3);
        assert_eq!(event.frame.slot(SlotName::Main).unwrap().data.as_ref(), b"3");
        assert!(late.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_disabled() {
        let hub = Hub::with_config(HubConfig::default().snapshot_on_subscribe(false));
        hub.publish(frame(b"a")).unwrap();

        let sub = hub.subscribe().unwrap();
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let hub = Hub::new();
        let sub = hub.subscribe().unwrap();
        let id = sub.id();
        assert_eq!(hub.subscriber_count(), 1);

        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
        // Idempotent
        assert!(!hub.unsubscribe(id));

        let receipt = hub.publish(frame(b"a")).unwrap();
        assert_eq!(receipt.delivered, 0);
    }

    #[tokio::test]
    async fn test_explicit_unsubscribe_ends_stream() {
        let hub = Hub::new();
        let sub = hub.subscribe().unwrap();

        assert!(hub.unsubscribe(sub.id()));
        assert!(sub.is_closed());
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_slow_subscriber_bounded() {
        let hub = Hub::with_config(HubConfig::default().queue_capacity(2));
        let slow = hub.subscribe().unwrap();
        let fast = hub.subscribe().unwrap();

        for i in 0..5u8 {
            hub.publish(FrameSet::new(SlotPayload::new(
                "image/png",
                Bytes::from(vec![i]),
            )))
            .unwrap();
            fast.try_recv().unwrap();
        }

        assert_eq!(slow.queued(), 2);
        assert_eq!(slow.dropped(), 3);
        assert_eq!(slow.try_recv().unwrap().sequence(), 4);
        assert_eq!(slow.try_recv().unwrap().sequence(), 5);
        assert_eq!(hub.stats().dropped_events, 3);
        assert_eq!(fast.dropped(), 0);
    }

    #[tokio::test]
    async fn test_shutdown() {
        let hub = Hub::new();
        let sub = hub.subscribe().unwrap();
        hub.publish(frame(b"a")).unwrap();

        hub.shutdown();
        assert!(hub.is_closed());
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.publish(frame(b"b")), Err(HubError::Closed));
        assert!(matches!(hub.subscribe(), Err(HubError::Closed)));

        // Already-queued event still drains
        assert_eq!(sub.recv().await.unwrap().sequence(), 1);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_publishes_unique_sequences() {
        let hub = Hub::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let hub = hub.clone();
            handles.push(tokio::spawn(async move {
                (0..25)
                    .map(|_| hub.publish(frame(b"x")).unwrap().sequence)
                    .collect::<Vec<_>>()
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 200);
        assert_eq!(hub.sequence(), 200);
        assert_eq!(hub.latest().unwrap().sequence(), hub.sequence());
    }

    #[test]
    fn test_readers_not_blocked_by_publish_in_progress() {
        let hub = Hub::new();
        let sub = hub.subscribe().unwrap();

        // A publish holding the gate (e.g. while encoding) leaves state free
        let gate = hub.inner.publish_gate.lock().unwrap();
        let publisher = {
            let hub = hub.clone();
            std::thread::spawn(move || hub.publish(frame(b"a")).unwrap())
        };

        let late = hub.subscribe().unwrap();
        assert_eq!(hub.subscriber_count(), 2);
        assert_eq!(hub.stats().sequence, 0);
        assert!(hub.latest().is_none());
        drop(late);
        assert_eq!(hub.subscriber_count(), 1);

        drop(gate);
        let receipt = publisher.join().unwrap();
        assert_eq!(receipt.sequence, 1);
        assert_eq!(receipt.delivered, 1);
        assert_eq!(sub.try_recv().unwrap().sequence(), 1);
    }

    #[test]
    fn test_shutdown_during_publish_keeps_sequence() {
        let hub = Hub::new();
        let gate = hub.inner.publish_gate.lock().unwrap();
        let publisher = {
            let hub = hub.clone();
            std::thread::spawn(move || hub.publish(frame(b"a")))
        };

        hub.shutdown();
        drop(gate);
        assert_eq!(publisher.join().unwrap(), Err(HubError::Closed));
        assert_eq!(hub.sequence(), 0);
        assert!(hub.latest().is_none());
    }
}
