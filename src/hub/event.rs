//! Outbound event encoding
//!
//! One published frame set becomes one `FrameEvent`: the frame plus its JSON
//! wire form, serialized once and shared by every subscriber queue.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::frame::{FrameSet, SlotName};

/// Event `type` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Full slot set with an image main slot
    NewImages,
    /// Legacy single-image shape (`image_base64` only)
    NewImage,
    /// Main slot is not an image
    NewData,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewImages => "new_images",
            EventKind::NewImage => "new_image",
            EventKind::NewData => "new_data",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new_images" => Some(EventKind::NewImages),
            "new_image" => Some(EventKind::NewImage),
            "new_data" => Some(EventKind::NewData),
            _ => None,
        }
    }

    /// Kind emitted by the hub for a frame set
    pub fn for_frame(frame: &FrameSet) -> Self {
        if frame.is_image() {
            EventKind::NewImages
        } else {
            EventKind::NewData
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published frame set ready for the wire
#[derive(Debug, Clone)]
pub struct FrameEvent {
    pub kind: EventKind,
    pub frame: Arc<FrameSet>,
    /// Compact single-line JSON, always UTF-8
    payload: Bytes,
}

impl FrameEvent {
    /// Serialize a published frame set
    pub fn encode(frame: Arc<FrameSet>) -> Self {
        let kind = EventKind::for_frame(&frame);
        let payload = Bytes::from(to_wire(kind, &frame).to_string());
        Self {
            kind,
            frame,
            payload,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.frame.sequence
    }

    pub fn json(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap_or_default()
    }

    /// The JSON as a shared buffer, for response bodies
    pub fn body(&self) -> Bytes {
        self.payload.clone()
    }
}

/// Build the event object; absent slots are explicit nulls
fn to_wire(kind: EventKind, frame: &FrameSet) -> Value {
    let mut obj = Map::new();
    obj.insert("type".into(), Value::from(kind.as_str()));
    obj.insert("sequence".into(), Value::from(frame.sequence));
    obj.insert(
        "timestamp".into(),
        frame.timestamp.map(Value::from).unwrap_or(Value::Null),
    );

    for slot in SlotName::ALL {
        let value = frame
            .slot(slot)
            .map(|payload| payload.to_wire_value(slot))
            .unwrap_or(Value::Null);
        obj.insert(slot.wire_field().into(), value);
    }

    let meta = &frame.metadata;
    obj.insert("prompt".into(), meta.prompt.clone().map(Value::from).unwrap_or(Value::Null));
    obj.insert(
        "negative_prompt".into(),
        meta.negative_prompt.clone().map(Value::from).unwrap_or(Value::Null),
    );
    obj.insert("seed".into(), meta.seed.map(Value::from).unwrap_or(Value::Null));
    obj.insert("metadata".into(), meta.raw.clone().unwrap_or(Value::Null));

    Value::Object(obj)
}
