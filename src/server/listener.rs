//! Relay server listener
//!
//! Builds the axum router around a shared `Hub` and runs it on a TCP
//! listener until shut down.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::error::Result;
use crate::hub::{Hub, HubConfig};
use crate::server::config::ServerConfig;
use crate::server::ingest::ingest;
use crate::server::stream::events;

/// State shared by every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub hub: Hub,
    pub config: Arc<ServerConfig>,
}

/// Build the relay router for a hub
pub fn router(hub: Hub, config: ServerConfig) -> Router {
    let state = AppState {
        hub,
        config: Arc::new(config),
    };
    let config = Arc::clone(&state.config);

    let mut router: Router<AppState> = Router::new();
    for path in &config.ingest_paths {
        router = router.route(path, post(ingest));
    }
    for path in &config.events_paths {
        router = router.route(path, get(events));
    }
    router = router
        .route(&config.latest_path, get(latest))
        .route(&config.health_path, get(health))
        .layer(DefaultBodyLimit::max(config.max_body_bytes));

    if config.cors_enabled {
        router = router.layer(cors_layer());
    }

    router.with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            CONTENT_LENGTH,
            ACCEPT,
            HeaderName::from_static("x-requested-with"),
        ])
        .max_age(Duration::from_secs(86400))
}

/// Cached event JSON, or `204` before the first publish
async fn latest(State(state): State<AppState>) -> Response {
    match state.hub.latest() {
        Some(event) => (
            [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            event.body(),
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Plain-text liveness banner naming the events route
async fn health(State(state): State<AppState>) -> Response {
    let stats = state.hub.stats();
    if stats.closed {
        return (StatusCode::SERVICE_UNAVAILABLE, "Frame relay shutting down").into_response();
    }
    format!(
        "Frame relay active. Events at {} (sequence {}, {} subscribers, {} dropped)",
        state.config.primary_events_path(),
        stats.sequence,
        stats.subscribers,
        stats.dropped_events,
    )
    .into_response()
}

/// Frame relay server
pub struct RelayServer {
    config: ServerConfig,
    hub: Hub,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_hub_config(config, HubConfig::default())
    }

    /// Create a new server with custom hub configuration
    pub fn with_hub_config(config: ServerConfig, hub_config: HubConfig) -> Self {
        Self::with_hub(config, Hub::with_config(hub_config))
    }

    /// Create a server around an existing hub
    pub fn with_hub(config: ServerConfig, hub: Hub) -> Self {
        Self { config, hub }
    }

    /// Get a reference to the hub
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    pub fn router(&self) -> Router {
        router(self.hub.clone(), self.config.clone())
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    ///
    /// The hub is shut down as soon as `shutdown` resolves, which ends every
    /// open event stream so in-flight connections can drain.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            events = self.config.primary_events_path(),
            "Frame relay listening"
        );

        let hub = self.hub.clone();
        let signal = async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
            hub.shutdown();
        };

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await;

        // Also covers the listener failing before any signal
        self.hub.shutdown();
        result?;

        tracing::info!(addr = %addr, "Frame relay stopped");
        Ok(())
    }
}
