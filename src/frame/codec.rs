//! Upload normalization
//!
//! Producers send either a raw binary body (the main image) or a JSON object
//! whose fields map to slots:
//!
//! ```text
//! image_base64            -> main   (required; color_image_base64 stands in when absent)
//! color_image_base64      -> color  (only when image_base64 is also present)
//! depth_image_base64      -> depth
//! openpose_image_base64   -> pose
//! data                    -> data   (JSON value, text, or data URI)
//! metadata                -> passed through; prompt / negative_prompt / seed lifted out
//! content_type            -> explicit MIME type for main (a data URI prefix wins)
//! timestamp               -> producer timestamp (seconds)
//! ```
//!
//! Unknown fields are ignored so newer producers keep working.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde_json::{Map, Value};

use super::error::CodecError;
use super::image::{probe, ImageFormat};
use super::slot::{base_mime, is_image_type, FrameMetadata, FrameSet, SlotName, SlotPayload};

const OCTET_STREAM: &str = "application/octet-stream";

/// A producer upload before normalization
#[derive(Debug, Clone)]
pub enum RawUpload {
    /// Raw body; becomes the main slot
    Binary {
        content_type: Option<String>,
        body: Bytes,
    },
    /// Parsed JSON body
    Json(Value),
}

impl RawUpload {
    /// Classify a request body by its content type
    pub fn from_body(content_type: Option<&str>, body: Bytes) -> Result<Self, CodecError> {
        let is_json = content_type.is_some_and(|ct| base_mime(ct) == "application/json");

        if is_json {
            let value = serde_json::from_slice(&body)
                .map_err(|e| CodecError::InvalidJson(e.to_string()))?;
            Ok(RawUpload::Json(value))
        } else {
            Ok(RawUpload::Binary {
                content_type: content_type.map(str::to_owned),
                body,
            })
        }
    }
}

/// Validate and normalize an upload into a frame set
///
/// The returned frame set has `sequence == 0`; the hub assigns it on publish.
pub fn normalize(raw: RawUpload) -> Result<FrameSet, CodecError> {
    match raw {
        RawUpload::Binary { content_type, body } => normalize_binary(content_type, body),
        RawUpload::Json(value) => normalize_json(value),
    }
}

fn normalize_binary(content_type: Option<String>, body: Bytes) -> Result<FrameSet, CodecError> {
    if body.is_empty() {
        return Err(CodecError::MissingMain);
    }
    let main = finish_payload(SlotName::Main, content_type.as_deref(), body)?;
    Ok(FrameSet::new(main))
}

fn normalize_json(value: Value) -> Result<FrameSet, CodecError> {
    let Value::Object(fields) = value else {
        return Err(CodecError::NotAnObject);
    };

    let explicit_type = fields.get("content_type").and_then(Value::as_str);

    // Main-equivalent field: image_base64, else color_image_base64
    let has_image = is_populated(fields.get(SlotName::Main.wire_field()));
    let main_field = if has_image {
        SlotName::Main.wire_field()
    } else {
        SlotName::Color.wire_field()
    };
    let main_value = fields
        .get(main_field)
        .filter(|v| is_populated(Some(*v)))
        .ok_or(CodecError::MissingMain)?;
    let main = decode_slot_value(SlotName::Main, main_value, explicit_type)?;

    let mut frame = FrameSet::new(main);

    let mut optional = vec![SlotName::Depth, SlotName::Pose, SlotName::Data];
    if has_image {
        optional.insert(0, SlotName::Color);
    }
    for slot in optional {
        let Some(value) = fields.get(slot.wire_field()).filter(|v| is_populated(Some(*v))) else {
            continue;
        };
        match decode_slot_value(slot, value, None) {
            Ok(payload) => frame.set_slot(slot, payload),
            Err(e) => {
                tracing::warn!(slot = %slot, error = %e, "Dropping undecodable slot");
            }
        }
    }

    frame.timestamp = fields.get("timestamp").and_then(Value::as_f64);
    frame.metadata = extract_metadata(&fields);

    Ok(frame)
}

/// Decode one slot field from an upload or an event
///
/// Image slots must be base64 text, optionally data-URI prefixed. The data
/// slot additionally accepts plain text and arbitrary JSON values.
pub fn decode_slot_value(
    slot: SlotName,
    value: &Value,
    explicit_type: Option<&str>,
) -> Result<SlotPayload, CodecError> {
    match value {
        Value::String(text) if slot != SlotName::Data || text.starts_with("data:") => {
            let (uri_type, encoded) = match parse_data_uri(text) {
                Some((mime, payload)) => (Some(mime), payload),
                None if text.starts_with("data:") => {
                    return Err(CodecError::BadEncoding { slot });
                }
                None => (None, text.as_str()),
            };
            let data = decode_base64(encoded).ok_or(CodecError::BadEncoding { slot })?;
            finish_payload(slot, uri_type.or(explicit_type), data)
        }
        Value::String(text) => Ok(SlotPayload::new(
            "text/plain; charset=utf-8",
            Bytes::from(text.clone().into_bytes()),
        )),
        Value::Null => Err(CodecError::BadEncoding { slot }),
        other if slot == SlotName::Data => {
            let body = serde_json::to_vec(other).map_err(|_| CodecError::BadEncoding { slot })?;
            Ok(SlotPayload::new("application/json", Bytes::from(body)))
        }
        _ => Err(CodecError::BadEncoding { slot }),
    }
}

/// Split `data:<mime>;base64,<payload>` into MIME type and payload
///
/// Returns `None` for text that is not a base64 data URI.
pub fn parse_data_uri(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let mime = if mime.is_empty() { OCTET_STREAM } else { mime };
    Some((mime, payload))
}

fn decode_base64(encoded: &str) -> Option<Bytes> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD.decode(compact).ok().map(Bytes::from)
}

/// Attach a content type and, for images, validated dimensions
fn finish_payload(
    slot: SlotName,
    content_type: Option<&str>,
    data: Bytes,
) -> Result<SlotPayload, CodecError> {
    let declared = content_type
        .map(str::trim)
        .filter(|ct| !ct.is_empty() && base_mime(ct) != OCTET_STREAM);

    match declared {
        Some(ct) if is_image_type(ct) => {
            let info = probe(&data).map_err(|e| CodecError::MalformedImage {
                slot,
                format: e.format().or_else(|| format_for_mime(ct)),
            })?;
            Ok(SlotPayload::new(ct, data).with_dimensions(info.dimensions))
        }
        Some(ct) => Ok(SlotPayload::new(ct, data)),
        // Unlabelled: sniff, falling back to opaque bytes
        None => match probe(&data) {
            Ok(info) => Ok(SlotPayload::new(info.format.mime(), data).with_dimensions(info.dimensions)),
            Err(_) => Ok(SlotPayload::new(OCTET_STREAM, data)),
        },
    }
}

fn format_for_mime(content_type: &str) -> Option<ImageFormat> {
    match base_mime(content_type).as_str() {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
        "image/gif" => Some(ImageFormat::Gif),
        "image/webp" => Some(ImageFormat::WebP),
        "image/bmp" => Some(ImageFormat::Bmp),
        _ => None,
    }
}

/// Empty strings and nulls count as absent
fn is_populated(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn extract_metadata(fields: &Map<String, Value>) -> FrameMetadata {
    let raw = fields.get("metadata").filter(|v| !v.is_null()).cloned();
    let bag = raw.as_ref().and_then(Value::as_object);

    let text = |key: &str| {
        bag.and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .map(str::to_owned)
    };

    FrameMetadata {
        prompt: text("prompt"),
        negative_prompt: text("negative_prompt"),
        seed: bag.and_then(|m| m.get("seed")).and_then(parse_seed),
        raw,
    }
}

/// Seeds arrive as integers, floats, or numeric strings
pub(crate) fn parse_seed(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    }
}
