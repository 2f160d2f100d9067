//! Event envelope decoding
//!
//! Turns one SSE `data` payload back into a frame set. Slot fields are
//! checked one by one; anything absent or null is simply not present.

use serde_json::{Map, Value};

use super::error::DecodeError;
use crate::frame::codec::parse_seed;
use crate::frame::{decode_slot_value, FrameMetadata, FrameSet, SlotName};
use crate::hub::EventKind;

/// A decoded event
#[derive(Debug, Clone)]
pub struct FrameEnvelope {
    pub kind: EventKind,
    /// Hub sequence; legacy producers may omit it
    pub sequence: Option<u64>,
    pub frame: FrameSet,
}

/// Decode one event payload
pub fn decode_event(json: &str) -> Result<FrameEnvelope, DecodeError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(DecodeError::InvalidJson("expected an object".into()));
    };

    let type_tag = fields
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?;
    let kind =
        EventKind::parse(type_tag).ok_or_else(|| DecodeError::UnknownType(type_tag.to_owned()))?;

    let main = present(&fields, SlotName::Main)
        .or_else(|| {
            (kind != EventKind::NewImage)
                .then(|| present(&fields, SlotName::Color))
                .flatten()
        })
        .ok_or(DecodeError::Slot {
            slot: SlotName::Main,
            source: crate::frame::CodecError::MissingMain,
        })?;
    let main = decode_slot_value(SlotName::Main, main, None).map_err(|source| DecodeError::Slot {
        slot: SlotName::Main,
        source,
    })?;

    let mut frame = FrameSet::new(main);

    // The legacy shape carries the main image only
    if kind != EventKind::NewImage {
        for slot in SlotName::ALL.into_iter().filter(|s| *s != SlotName::Main) {
            let Some(value) = present(&fields, slot) else {
                continue;
            };
            match decode_slot_value(slot, value, None) {
                Ok(payload) => frame.set_slot(slot, payload),
                Err(e) => tracing::warn!(slot = %slot, error = %e, "Ignoring undecodable slot"),
            }
        }
    }

    let sequence = fields.get("sequence").and_then(Value::as_u64);
    frame.sequence = sequence.unwrap_or(0);
    frame.timestamp = fields.get("timestamp").and_then(Value::as_f64);
    frame.metadata = FrameMetadata {
        raw: fields.get("metadata").filter(|v| !v.is_null()).cloned(),
        prompt: text(&fields, "prompt"),
        negative_prompt: text(&fields, "negative_prompt"),
        seed: fields.get("seed").and_then(parse_seed),
    };

    Ok(FrameEnvelope {
        kind,
        sequence,
        frame,
    })
}

fn present(fields: &Map<String, Value>, slot: SlotName) -> Option<&Value> {
    fields.get(slot.wire_field()).filter(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

fn text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_owned)
}
