//! Frame relay server
//!
//! Run with: cargo run --bin frame-relay -- [OPTIONS]
//!
//! Examples:
//!   frame-relay                              # binds to 0.0.0.0:8199
//!   frame-relay --addr 127.0.0.1 --port 9000
//!   FRAME_RELAY_PORT=8200 frame-relay --queue-capacity 4
//!   ELECTRON_LISTENER_PORT=8200 frame-relay  # read when FRAME_RELAY_PORT is unset
//!
//! ## Publishing
//!
//!   curl -X POST -H 'Content-Type: image/png' --data-binary @render.png http://localhost:8199/
//!   curl -X POST -H 'Content-Type: application/json' \
//!        -d '{"image_base64":"...","metadata":{"seed":7}}' http://localhost:8199/a3d_data
//!
//! ## Viewing
//!
//!   curl -N http://localhost:8199/events
//!   cargo run --example viewer_console -- http://localhost:8199/events

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;

use frame_relay::hub::HubConfig;
use frame_relay::server::config::DEFAULT_PORT;
use frame_relay::{RelayServer, ServerConfig};

/// Port variable read by earlier listener builds
const LEGACY_PORT_ENV: &str = "ELECTRON_LISTENER_PORT";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Interface to bind
    #[arg(long, env = "FRAME_RELAY_ADDR", default_value = "0.0.0.0")]
    addr: IpAddr,

    /// Port for ingest and event streams [default: ELECTRON_LISTENER_PORT, then 8199]
    #[arg(long, env = "FRAME_RELAY_PORT")]
    port: Option<u16>,

    /// Events buffered per viewer before the oldest is dropped
    #[arg(long, default_value_t = 16)]
    queue_capacity: usize,

    /// Do not replay the latest frame set to new viewers
    #[arg(long)]
    no_snapshot: bool,

    /// Seconds between heartbeat comments on idle streams
    #[arg(long, default_value_t = 15)]
    keep_alive_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("frame_relay=info".parse()?),
        )
        .init();

    let legacy_port = std::env::var(LEGACY_PORT_ENV).ok();
    let port = resolve_port(args.port, legacy_port.as_deref());

    let config = ServerConfig::with_addr(SocketAddr::new(args.addr, port))
        .keep_alive_interval(Duration::from_secs(args.keep_alive_secs.max(1)));
    let hub_config = HubConfig::default()
        .queue_capacity(args.queue_capacity)
        .snapshot_on_subscribe(!args.no_snapshot);

    let server = RelayServer::with_hub_config(config, hub_config);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    if let Err(e) = server.run_until(shutdown).await {
        tracing::error!(error = %e, addr = %server.bind_addr(), "Server error");
        return Err(e.into());
    }

    Ok(())
}

/// `--port` / `FRAME_RELAY_PORT`, else the legacy variable, else the default
fn resolve_port(port: Option<u16>, legacy: Option<&str>) -> u16 {
    if let Some(port) = port {
        return port;
    }
    match legacy.map(|v| v.trim().parse::<u16>()) {
        Some(Ok(port)) => port,
        Some(Err(e)) => {
            tracing::warn!(error = %e, var = LEGACY_PORT_ENV, "Ignoring invalid port");
            DEFAULT_PORT
        }
        None => DEFAULT_PORT,
    }
}
