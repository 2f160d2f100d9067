//! Producer ingest
//!
//! Request body → `RawUpload` → `normalize` → `Hub::publish`. A rejected
//! upload never reaches the hub, so the sequence counter is left untouched.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::frame::{normalize, RawUpload};
use crate::hub::{Hub, HubError, PublishReceipt};
use crate::server::listener::AppState;

/// Success acknowledgement returned to the producer
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IngestAck {
    pub status: &'static str,
    pub message: String,
    pub sequence: u64,
    pub delivered: usize,
}

impl IngestAck {
    pub fn from_receipt(receipt: &PublishReceipt) -> Self {
        Self {
            status: "success",
            message: format!("Data received at {}", receipt.timestamp),
            sequence: receipt.sequence,
            delivered: receipt.delivered,
        }
    }
}

/// `POST` handler for every ingest route
pub async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestAck>> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    tracing::debug!(
        content_type = content_type.as_deref().unwrap_or("-"),
        bytes = body.len(),
        "Upload received"
    );

    // Decoding and encoding large frames is CPU-bound
    let hub = state.hub.clone();
    let receipt = tokio::task::spawn_blocking(move || accept(&hub, content_type.as_deref(), body))
        .await
        .map_err(std::io::Error::other)??;
    Ok(Json(IngestAck::from_receipt(&receipt)))
}

/// Decode, normalize and publish one upload
pub fn accept(hub: &Hub, content_type: Option<&str>, body: Bytes) -> Result<PublishReceipt> {
    let upload = RawUpload::from_body(content_type, body).map_err(|e| {
        tracing::warn!(error = %e, "Rejected upload body");
        e
    })?;

    let frame = normalize(upload).map_err(|e| {
        tracing::warn!(error = %e, code = e.code(), "Rejected frame set");
        e
    })?;

    Ok(hub.publish(frame)?)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Error::Codec(e) => (StatusCode::BAD_REQUEST, e.code()),
            Error::Hub(HubError::Closed) => (StatusCode::SERVICE_UNAVAILABLE, "shutting_down"),
            Error::Transport(_) => (StatusCode::BAD_GATEWAY, "transport"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io"),
        };

        let body = json!({
            "status": "error",
            "code": code,
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
