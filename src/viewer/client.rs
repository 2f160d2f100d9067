//! Viewer streaming client
//!
//! Owns the single shared event-stream connection for an editor session and
//! forwards decoded frames to the host over a channel.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::config::ViewerConfig;
use super::envelope::{decode_event, FrameEnvelope};
use super::reconnect::{Reconnector, RetryDecision};
use super::sse::SseDecoder;
use crate::error::{Result, TransportError};

/// Events from the viewer client
#[derive(Debug)]
pub enum ViewerEvent {
    /// Connection attempt started
    Connecting { attempt: u64 },

    /// Stream open
    Connected,

    /// Decoded frame
    Frame(Box<FrameEnvelope>),

    /// Stream lost
    Disconnected { reason: String },

    /// Next attempt after this delay
    RetryScheduled { delay: Duration },
}

/// Viewer streaming client
///
/// # Example
/// ```no_run
/// use frame_relay::viewer::{ViewerClient, ViewerConfig};
///
/// # async fn example() -> frame_relay::Result<()> {
/// let (client, mut events) = ViewerClient::new(ViewerConfig::new("http://127.0.0.1:8199/events"));
/// let handle = client.spawn();
///
/// while let Some(event) = events.recv().await {
///     println!("Event: {:?}", event);
/// }
/// handle.await.ok();
/// # Ok(())
/// # }
/// ```
pub struct ViewerClient {
    config: ViewerConfig,
    http: reqwest::Client,
    event_tx: mpsc::Sender<ViewerEvent>,
    shutdown: CancellationToken,
}

impl ViewerClient {
    /// Create a new client.
    ///
    /// Returns the client and a receiver for events.
    pub fn new(config: ViewerConfig) -> (Self, mpsc::Receiver<ViewerEvent>) {
        let (tx, rx) = mpsc::channel(config.event_buffer.max(1));

        let client = Self {
            config,
            http: reqwest::Client::new(),
            event_tx: tx,
            shutdown: CancellationToken::new(),
        };

        (client, rx)
    }

    /// Token that stops the client when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run on a background task
    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    /// Connect, stream and reconnect until shut down
    ///
    /// Also stops when the event receiver is dropped.
    pub async fn run(self) -> Result<()> {
        let url = Url::parse(&self.config.events_url)
            .map_err(|e| TransportError::Connect(format!("{}: {e}", self.config.events_url)))?;
        let mut machine = Reconnector::new(self.config.reconnect);

        while let Some(attempt) = machine.begin_attempt() {
            tracing::info!(url = %url, attempt = attempt, "Connecting to event stream");
            if !self.emit(ViewerEvent::Connecting { attempt }).await {
                break;
            }

            let outcome = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                outcome = self.stream_once(&url, &mut machine) => outcome,
            };
            let reason = match outcome {
                Ok(()) => break,
                Err(e) => e,
            };

            tracing::warn!(error = %reason, "Event stream lost");
            if !self
                .emit(ViewerEvent::Disconnected {
                    reason: reason.to_string(),
                })
                .await
            {
                break;
            }

            match machine.on_failure() {
                RetryDecision::Schedule(delay) => {
                    tracing::info!(delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
                    if !self.emit(ViewerEvent::RetryScheduled { delay }).await {
                        break;
                    }
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    machine.on_retry_fired();
                }
                RetryDecision::AlreadyScheduled => {}
                RetryDecision::Stopped => break,
            }
        }

        machine.close();
        tracing::info!(attempts = machine.attempts(), "Viewer client stopped");
        Ok(())
    }

    /// One connection; returns `Ok` only when the host went away
    async fn stream_once(
        &self,
        url: &Url,
        machine: &mut Reconnector,
    ) -> std::result::Result<(), TransportError> {
        let response = self
            .http
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        machine.on_connected();
        tracing::info!(url = %url, "Event stream connected");
        if !self.emit(ViewerEvent::Connected).await {
            return Ok(());
        }

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();

        while let Some(chunk) = body.next().await {
            decoder.push(&chunk?);

            while let Some(message) = decoder.next_message() {
                match decode_event(&message.data) {
                    Ok(envelope) => {
                        tracing::debug!(
                            sequence = envelope.sequence,
                            kind = %envelope.kind,
                            "Event received"
                        );
                        if !self.emit(ViewerEvent::Frame(Box::new(envelope))).await {
                            return Ok(());
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, id = message.id.as_deref(), "Discarding event");
                    }
                }
            }
        }

        Err(TransportError::Closed)
    }

    async fn emit(&self, event: ViewerEvent) -> bool {
        self.event_tx.send(event).await.is_ok()
    }
}
