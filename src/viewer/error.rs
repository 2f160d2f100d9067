//! Event decode errors

use thiserror::Error;

use crate::frame::{CodecError, SlotName};

/// A received event that cannot be applied
///
/// Local to one event: the event is discarded and the stream stays open.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    #[error("event is not a JSON object: {0}")]
    InvalidJson(String),

    #[error("event has no `type` field")]
    MissingType,

    #[error("unknown event type `{0}`")]
    UnknownType(String),

    #[error("slot `{slot}` could not be decoded: {source}")]
    Slot {
        slot: SlotName,
        #[source]
        source: CodecError,
    },
}
