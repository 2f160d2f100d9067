//! End-to-end tests: real listener, reqwest producer, crate viewer client

use std::net::SocketAddr;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use frame_relay::hub::EventKind;
use frame_relay::viewer::{FrameEnvelope, ViewerClient, ViewerConfig, ViewerEvent};
use frame_relay::{Hub, RelayServer, ServerConfig, SlotName};

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    hub: Hub,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<frame_relay::Result<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = RelayServer::new(ServerConfig::with_addr(addr));
        let hub = server.hub().clone();
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            server
                .serve(listener, async move {
                    let _ = rx.await;
                })
                .await
        });

        Self {
            addr,
            hub,
            shutdown: Some(tx),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        timeout(WAIT, self.handle).await.unwrap().unwrap().unwrap();
    }
}

/// Minimal PNG: signature + IHDR
fn png(width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    data.extend_from_slice(&13u32.to_be_bytes());
    data.extend_from_slice(b"IHDR");
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[8, 2, 0, 0, 0]);
    data
}

async fn post_json(url: &str, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap()
}

fn viewer(url: String) -> (mpsc::Receiver<ViewerEvent>, ViewerClient) {
    let config = ViewerConfig::new(url)
        .reconnect_delays(Duration::from_millis(50), Duration::from_millis(100));
    let (client, events) = ViewerClient::new(config);
    (events, client)
}

async fn next_event(events: &mut mpsc::Receiver<ViewerEvent>) -> ViewerEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for viewer event")
        .expect("viewer channel closed")
}

async fn wait_connected(events: &mut mpsc::Receiver<ViewerEvent>) {
    loop {
        if let ViewerEvent::Connected = next_event(events).await {
            return;
        }
    }
}

async fn next_frame(events: &mut mpsc::Receiver<ViewerEvent>) -> FrameEnvelope {
    loop {
        if let ViewerEvent::Frame(envelope) = next_event(events).await {
            return *envelope;
        }
    }
}

#[tokio::test]
async fn test_round_trip_to_subscribed_viewer() {
    let server = TestServer::start().await;
    let (mut events, client) = viewer(server.url("/events"));
    let token = client.shutdown_token();
    let viewer_task = client.spawn();
    wait_connected(&mut events).await;

    let a = png(640, 360);
    let b = png(64, 64);
    let response = post_json(
        &server.url("/"),
        json!({
            "image_base64": STANDARD.encode(&a),
            "depth_image_base64": STANDARD.encode(&b),
            "metadata": { "prompt": "a lighthouse", "seed": "7" },
        }),
    )
    .await;
    assert_eq!(response.status(), 200);
    let ack: Value = response.json().await.unwrap();
    assert_eq!(ack["status"], "success");
    assert_eq!(ack["sequence"], 1);
    assert_eq!(ack["delivered"], 1);

    let envelope = next_frame(&mut events).await;
    assert_eq!(envelope.kind, EventKind::NewImages);
    assert_eq!(envelope.sequence, Some(1));
    assert_eq!(envelope.frame.main().unwrap().data, Bytes::from(a));
    assert_eq!(envelope.frame.slot(SlotName::Depth).unwrap().data, Bytes::from(b));
    assert!(envelope.frame.slot(SlotName::Pose).is_none());
    assert_eq!(envelope.frame.metadata.prompt.as_deref(), Some("a lighthouse"));
    assert_eq!(envelope.frame.metadata.seed, Some(7));

    token.cancel();
    viewer_task.await.unwrap().unwrap();
    server.stop().await;
}

#[tokio::test]
async fn test_late_joiner_gets_latest() {
    let server = TestServer::start().await;

    for width in [10, 20, 30] {
        let response = reqwest::Client::new()
            .post(server.url("/a3d_data"))
            .header("content-type", "image/png")
            .body(png(width, 10))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    let (mut events, client) = viewer(server.url("/a3d_events"));
    let token = client.shutdown_token();
    let viewer_task = client.spawn();

    let envelope = next_frame(&mut events).await;
    assert_eq!(envelope.sequence, Some(3));
    assert_eq!(envelope.frame.main().unwrap().data, Bytes::from(png(30, 10)));

    token.cancel();
    viewer_task.await.unwrap().unwrap();
    server.stop().await;
}

#[tokio::test]
async fn test_missing_main_rejected() {
    let server = TestServer::start().await;

    let response = post_json(
        &server.url("/"),
        json!({ "depth_image_base64": STANDARD.encode(png(4, 4)) }),
    )
    .await;
    assert_eq!(response.status(), 400);
    let err: Value = response.json().await.unwrap();
    assert_eq!(err["code"], "missing_main");

    assert_eq!(server.hub.sequence(), 0);
    let latest = reqwest::get(server.url("/latest")).await.unwrap();
    assert_eq!(latest.status(), 204);

    server.stop().await;
}

#[tokio::test]
async fn test_viewer_disconnect_evicts_subscriber() {
    let server = TestServer::start().await;
    let (mut events, client) = viewer(server.url("/events"));
    let token = client.shutdown_token();
    let viewer_task = client.spawn();
    wait_connected(&mut events).await;
    assert_eq!(server.hub.subscriber_count(), 1);

    token.cancel();
    viewer_task.await.unwrap().unwrap();

    // Eviction happens when the server notices the closed stream
    let mut evicted = false;
    for _ in 0..50 {
        server
            .hub
            .publish(frame_relay::FrameSet::new(frame_relay::SlotPayload::new(
                "text/plain",
                Bytes::from_static(b"tick"),
            )))
            .unwrap();
        if server.hub.subscriber_count() == 0 {
            evicted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(evicted);

    server.stop().await;
}

#[tokio::test]
async fn test_viewer_reconnects_once_per_failure() {
    let server = TestServer::start().await;
    let (mut events, client) = viewer(server.url("/events"));
    let token = client.shutdown_token();
    let viewer_task = client.spawn();
    wait_connected(&mut events).await;

    // Server goes away: the stream ends, then connections are refused
    server.stop().await;

    let mut seen = Vec::new();
    loop {
        let event = next_event(&mut events).await;
        let done = matches!(event, ViewerEvent::Connecting { attempt: 3 });
        seen.push(event);
        if done {
            break;
        }
    }
    token.cancel();
    viewer_task.await.unwrap().unwrap();

    let summary: Vec<String> = seen
        .iter()
        .map(|e| match e {
            ViewerEvent::Connecting { attempt } => format!("connecting {attempt}"),
            ViewerEvent::Connected => "connected".into(),
            ViewerEvent::Frame(_) => "frame".into(),
            ViewerEvent::Disconnected { .. } => "disconnected".into(),
            ViewerEvent::RetryScheduled { delay } => format!("retry {}", delay.as_millis()),
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            "disconnected",
            "retry 50",
            "connecting 2",
            "disconnected",
            "retry 100",
            "connecting 3",
        ]
    );
}
