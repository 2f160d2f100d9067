//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Default listening port
pub const DEFAULT_PORT: u16 = 8199;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Routes accepting producer uploads (POST)
    pub ingest_paths: Vec<String>,

    /// Routes opening an event stream (GET)
    pub events_paths: Vec<String>,

    /// Route returning the cached event (GET)
    pub latest_path: String,

    /// Route returning a liveness banner (GET)
    pub health_path: String,

    /// Interval between `:heartbeat` comment frames on idle streams
    pub keep_alive_interval: Duration,

    /// Largest accepted upload body
    pub max_body_bytes: usize,

    /// Answer CORS preflights and tag responses for any origin
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            ingest_paths: vec!["/".into(), "/a3d_data".into()],
            events_paths: vec!["/events".into(), "/a3d_events".into()],
            latest_path: "/latest".into(),
            health_path: "/health".into(),
            keep_alive_interval: Duration::from_secs(15),
            max_body_bytes: 64 * 1024 * 1024, // 64MB
            cors_enabled: true,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Replace the ingest routes
    pub fn ingest_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ingest_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the event-stream routes
    pub fn events_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Set keep-alive interval
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Set maximum upload size
    pub fn max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// Disable CORS headers
    pub fn disable_cors(mut self) -> Self {
        self.cors_enabled = false;
        self
    }

    /// Primary event-stream route, for banners and logs
    pub fn primary_events_path(&self) -> &str {
        self.events_paths
            .first()
            .map(String::as_str)
            .unwrap_or("/events")
    }
}
