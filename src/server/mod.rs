//! HTTP surface: producer ingest, viewer event streams, and the listener
//!
//! Routes (defaults):
//! - `POST /`, `POST /a3d_data` - ingest a frame set
//! - `GET /events`, `GET /a3d_events` - server-sent event stream
//! - `GET /latest` - cached event JSON
//! - `GET /health` - liveness banner

pub mod config;
pub mod ingest;
pub mod listener;
pub mod stream;

pub use config::ServerConfig;
pub use ingest::IngestAck;
pub use listener::{router, AppState, RelayServer};
