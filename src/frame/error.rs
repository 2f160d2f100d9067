//! Codec error types

use super::image::ImageFormat;
use super::slot::SlotName;

/// Reasons an upload is rejected at ingest
///
/// Nothing is cached or broadcast when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Neither a binary body nor a main-equivalent field was present
    #[error("no main image in upload")]
    MissingMain,

    /// A populated slot was not valid base64 (or not a base64 data URI)
    #[error("slot `{slot}` is not valid base64")]
    BadEncoding { slot: SlotName },

    /// Body claimed to be JSON but did not parse
    #[error("invalid JSON body: {0}")]
    InvalidJson(String),

    /// JSON body parsed but was not an object
    #[error("JSON body must be an object")]
    NotAnObject,

    /// Slot declared an image content type but its header is unreadable
    #[error("slot `{slot}` is not a well-formed image")]
    MalformedImage {
        slot: SlotName,
        format: Option<ImageFormat>,
    },
}

impl CodecError {
    /// Stable machine-readable code for HTTP responses
    pub fn code(&self) -> &'static str {
        match self {
            CodecError::MissingMain => "missing_main",
            CodecError::BadEncoding { .. } => "bad_encoding",
            CodecError::InvalidJson(_) => "invalid_json",
            CodecError::NotAnObject => "not_an_object",
            CodecError::MalformedImage { .. } => "malformed_image",
        }
    }
}
