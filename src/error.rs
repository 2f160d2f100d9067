//! Crate-wide error types
//!
//! Component errors live next to their component (`frame::CodecError`,
//! `hub::HubError`, `viewer::DecodeError`); this module gathers them for
//! callers that drive the whole relay.

use crate::frame::CodecError;
use crate::hub::HubError;

/// Result alias used by the server and viewer runtimes
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Producer payload was rejected
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Hub refused the operation
    #[error("hub error: {0}")]
    Hub(#[from] HubError),

    /// A single viewer or subscriber connection failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Socket-level failure (bind, accept)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure local to one streaming connection
///
/// Never fatal: the server evicts the subscriber, the viewer schedules a
/// reconnect.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Could not reach the events endpoint
    #[error("connection failed: {0}")]
    Connect(String),

    /// Endpoint answered with a non-success status
    #[error("unexpected status {0}")]
    Status(u16),

    /// Stream broke mid-flight (peer reset, read error)
    #[error("stream error: {0}")]
    Stream(String),

    /// Peer closed the stream cleanly
    #[error("stream closed by peer")]
    Closed,
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            TransportError::Connect(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::Status(status.as_u16())
        } else {
            TransportError::Stream(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_wraps() {
        let err: Error = CodecError::MissingMain.into();
        assert!(matches!(err, Error::Codec(CodecError::MissingMain)));
        assert!(err.to_string().contains("main"));
    }

    #[test]
    fn test_transport_error_display() {
        let err = Error::from(TransportError::Status(503));
        assert_eq!(err.to_string(), "transport error: unexpected status 503");
    }
}
