//! Broadcast hub for frame-set fan-out
//!
//! The hub owns the latest frame set and the table of connected viewers.
//! Each viewer gets its own bounded queue; publishing never waits on a
//! viewer.
//!
//! # Architecture
//!
//! ```text
//!                                Hub (Arc<HubInner>)
//!                     ┌──────────────────────────────────────┐
//!                     │ Mutex<HubState> {                    │
//!                     │   sequence,                          │
//!                     │   latest: Option<Arc<FrameEvent>>,   │
//!                     │   subscribers: HashMap<id, Queue>,   │
//!                     │ }                                    │
//!                     └──────────────────┬───────────────────┘
//!                                        │ publish(): one critical section
//!         ┌──────────────────────────────┼──────────────────────────────┐
//!         ▼                              ▼                              ▼
//!  SubscriberQueue #1             SubscriberQueue #2             SubscriberQueue #3
//!  (bounded, drop-oldest)         (bounded, drop-oldest)         (bounded, drop-oldest)
//!         │                              │                              │
//!  Subscription::recv()           Subscription::recv()           Subscription::recv()
//! ```
//!
//! # Shared payloads
//!
//! A publish serializes the event once, before taking the state lock, so a
//! large frame never stalls subscribes, evictions or reads. Every queue
//! holds an `Arc` to the same `FrameEvent`, and slot bodies are
//! reference-counted `Bytes`.

pub mod config;
pub mod error;
pub mod event;
pub mod queue;
pub mod store;

pub use config::HubConfig;
pub use error::HubError;
pub use event::{EventKind, FrameEvent};
pub use queue::{PushOutcome, SubscriberQueue};
pub use store::{Hub, HubStats, PublishReceipt, Subscription};
