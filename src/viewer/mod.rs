//! Viewer reconciliation client
//!
//! The viewer side of the relay: one shared event-stream connection per
//! editor session, fanned out to every display node of a given type.
//!
//! ```text
//!  ViewerClient (tokio task)                    host UI loop
//!  ┌─────────────────────────────┐   mpsc    ┌──────────────────────────┐
//!  │ reqwest stream → SseDecoder │ ───────►  │ Reconciler<H>            │
//!  │   → decode_event            │ Viewer-   │   nodes_of_type(..)      │
//!  │ Reconnector (retry timer)   │ Event     │   ViewerNodeState per id │
//!  └─────────────────────────────┘           │   DisplayHost::redraw    │
//!                                            └──────────────────────────┘
//! ```

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod reconcile;
pub mod reconnect;
pub mod sse;
pub mod state;

pub use client::{ViewerClient, ViewerEvent};
pub use config::{LayoutPolicy, ReconnectPolicy, ViewerConfig};
pub use envelope::{decode_event, FrameEnvelope};
pub use error::DecodeError;
pub use reconcile::{DisplayHost, Reconciler};
pub use reconnect::{ConnectionState, Reconnector, RetryDecision};
pub use sse::{SseDecoder, SseMessage};
pub use state::{ApplyOutcome, NodeLayout, NodeStatus, NodeView, Rect, ViewerNodeState};
