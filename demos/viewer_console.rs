//! Headless viewer that logs every frame it would draw
//!
//! Run with: cargo run --example viewer_console [EVENTS_URL] [NODE_COUNT]
//!
//! Examples:
//!   cargo run --example viewer_console
//!   cargo run --example viewer_console http://127.0.0.1:8199/a3d_events 3
//!
//! Each simulated node prints its status, the main slot geometry and the
//! auxiliary thumbnails. Stop the relay to see the disconnected indicator
//! and the reconnect schedule.

use std::collections::HashSet;

use frame_relay::viewer::config::DEFAULT_NODE_TYPE;
use frame_relay::viewer::{DisplayHost, NodeView, Reconciler, ViewerClient, ViewerConfig, ViewerEvent};

/// A fake graph with `count` listener nodes
struct ConsoleHost {
    count: u32,
    controls: HashSet<u32>,
}

impl DisplayHost for ConsoleHost {
    type NodeId = u32;

    fn nodes_of_type(&self, node_type: &str) -> Vec<u32> {
        if node_type == DEFAULT_NODE_TYPE {
            (1..=self.count).collect()
        } else {
            Vec::new()
        }
    }

    fn has_controls(&self, node: &u32) -> bool {
        self.controls.contains(node)
    }

    fn create_controls(&mut self, node: &u32) {
        println!("[node {}] controls created", node);
        self.controls.insert(*node);
    }

    fn redraw(&mut self, node: &u32, view: &NodeView<'_>) {
        let main = view
            .layout
            .main
            .map(|r| format!("{}x{}", r.width, r.height))
            .unwrap_or_else(|| "-".into());
        let aux: Vec<String> = view
            .layout
            .aux
            .iter()
            .map(|(slot, r)| format!("{}@{},{}", slot, r.x, r.y))
            .collect();

        println!(
            "[node {}] {:?} seq={:?} kind={:?} main={} aux=[{}] node={}x{} prompt={:?}",
            node,
            view.status,
            view.sequence,
            view.kind.map(|k| k.as_str()),
            main,
            aux.join(" "),
            view.layout.width,
            view.layout.height,
            view.metadata.prompt,
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("frame_relay=info".parse()?)
                .add_directive("viewer_console=debug".parse()?),
        )
        .init();

    let config = match args.get(1) {
        Some(url) => ViewerConfig::new(url.as_str()),
        None => ViewerConfig::default(),
    };
    let count = match args.get(2) {
        Some(n) => n.parse()?,
        None => 2,
    };

    println!("Viewing {} with {} node(s)", config.events_url, count);

    let host = ConsoleHost {
        count,
        controls: HashSet::new(),
    };
    let mut reconciler = Reconciler::new(host, &config);
    let (client, mut events) = ViewerClient::new(config);
    let token = client.shutdown_token();
    let handle = client.spawn();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match &event {
                    ViewerEvent::Connecting { attempt } => println!("connecting (attempt {})", attempt),
                    ViewerEvent::Connected => println!("connected"),
                    ViewerEvent::Disconnected { reason } => println!("disconnected: {}", reason),
                    ViewerEvent::RetryScheduled { delay } => println!("retrying in {:?}", delay),
                    ViewerEvent::Frame(_) => {}
                }
                reconciler.handle(event);
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                token.cancel();
                break;
            }
        }
    }

    handle.await??;
    Ok(())
}
