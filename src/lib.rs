//! Real-time frame relay
//!
//! Carries freshly rendered image sets from a desktop producer to the display
//! nodes of a graph editor without polling.
//!
//! ```text
//!  producer ──POST──► server::ingest ──► frame::normalize ──► hub::Hub::publish
//!                                                                 │
//!                        ┌────────────────────────────────────────┤ fan-out
//!                        ▼                                        ▼
//!                 server::stream (SSE)                     server::stream (SSE)
//!                        │                                        │
//!                        ▼                                        ▼
//!               viewer::ViewerClient                      viewer::ViewerClient
//!                        │                                        │
//!                        ▼                                        ▼
//!               viewer::Reconciler ──► DisplayHost nodes   (one per editor session)
//! ```
//!
//! Everything is memory-resident and best-effort: the hub keeps only the most
//! recent frame set, slow viewers lose their oldest queued events, and a viewer
//! that loses its connection reconnects and waits for the next frame.

pub mod error;
pub mod frame;
pub mod hub;
pub mod server;
pub mod viewer;

pub use error::{Error, Result};
pub use frame::{normalize, CodecError, FrameSet, RawUpload, SlotName, SlotPayload};
pub use hub::{Hub, HubConfig, HubError, Subscription};
pub use server::{RelayServer, ServerConfig};
pub use viewer::{Reconciler, ViewerClient, ViewerConfig, ViewerEvent};
