//! Frame set and slot types
//!
//! A `FrameSet` groups the payloads one producer render emits. Each payload
//! sits in a named slot; only `main` is mandatory.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde_json::Value;

use super::image::Dimensions;

/// Named position within a frame set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotName {
    /// Primary render; drives display layout
    Main,
    /// Colour pass, carried separately only when a distinct main image exists
    Color,
    /// Depth map
    Depth,
    /// Pose (OpenPose skeleton) map
    Pose,
    /// Non-image payload
    Data,
}

impl SlotName {
    /// All slots in wire order
    pub const ALL: [SlotName; 5] = [
        SlotName::Main,
        SlotName::Color,
        SlotName::Depth,
        SlotName::Pose,
        SlotName::Data,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotName::Main => "main",
            SlotName::Color => "color",
            SlotName::Depth => "depth",
            SlotName::Pose => "pose",
            SlotName::Data => "data",
        }
    }

    /// JSON field carrying this slot in uploads and events
    pub fn wire_field(&self) -> &'static str {
        match self {
            SlotName::Main => "image_base64",
            SlotName::Color => "color_image_base64",
            SlotName::Depth => "depth_image_base64",
            SlotName::Pose => "openpose_image_base64",
            SlotName::Data => "data",
        }
    }

    /// Image slots rendered beside the main image at a fixed size
    pub fn is_auxiliary(&self) -> bool {
        matches!(self, SlotName::Color | SlotName::Depth | SlotName::Pose)
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SlotName::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s)
            .ok_or(())
    }
}

/// One slot's payload
///
/// Cheap to clone: the body is reference-counted `Bytes`.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotPayload {
    /// MIME type, from the data URI, the request, or sniffed magic bytes
    pub content_type: String,
    /// Raw payload bytes, exactly as uploaded after base64 decoding
    pub data: Bytes,
    /// Pixel size when the payload is a probed image
    pub dimensions: Option<Dimensions>,
}

impl SlotPayload {
    pub fn new(content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            content_type: content_type.into(),
            data,
            dimensions: None,
        }
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn is_image(&self) -> bool {
        is_image_type(&self.content_type)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `data:<mime>;base64,<payload>`
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            STANDARD.encode(&self.data)
        )
    }

    /// Encode for an event field
    ///
    /// The data slot keeps JSON and text bodies readable; everything else
    /// travels as a data URI.
    pub fn to_wire_value(&self, slot: SlotName) -> Value {
        if slot == SlotName::Data {
            let mime = base_mime(&self.content_type);
            if mime == "application/json" {
                if let Ok(value) = serde_json::from_slice::<Value>(&self.data) {
                    return value;
                }
            } else if mime.starts_with("text/") {
                if let Ok(text) = std::str::from_utf8(&self.data) {
                    return Value::String(text.to_owned());
                }
            }
        }
        Value::String(self.to_data_uri())
    }
}

/// Producer metadata carried alongside the images
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameMetadata {
    /// Opaque `metadata` value, passed through unvalidated
    pub raw: Option<Value>,
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub seed: Option<i64>,
}

/// The unit of distribution
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSet {
    /// Populated slots; always contains `Main` once normalized
    pub slots: BTreeMap<SlotName, SlotPayload>,
    /// Hub-assigned, monotonically increasing; 0 until published
    pub sequence: u64,
    /// Seconds since the Unix epoch; advisory
    pub timestamp: Option<f64>,
    pub metadata: FrameMetadata,
}

impl FrameSet {
    /// Create a frame set holding only a main slot
    pub fn new(main: SlotPayload) -> Self {
        let mut slots = BTreeMap::new();
        slots.insert(SlotName::Main, main);
        Self {
            slots,
            sequence: 0,
            timestamp: None,
            metadata: FrameMetadata::default(),
        }
    }

    pub fn main(&self) -> Option<&SlotPayload> {
        self.slots.get(&SlotName::Main)
    }

    pub fn slot(&self, name: SlotName) -> Option<&SlotPayload> {
        self.slots.get(&name)
    }

    /// Insert or replace a slot
    pub fn set_slot(&mut self, name: SlotName, payload: SlotPayload) {
        self.slots.insert(name, payload);
    }

    /// Whether the main slot is an image (otherwise this is a data frame)
    pub fn is_image(&self) -> bool {
        self.main().is_some_and(SlotPayload::is_image)
    }

    /// Total payload bytes across slots
    pub fn size(&self) -> usize {
        self.slots.values().map(SlotPayload::len).sum()
    }
}

/// `image/png; charset=..` => `image/png`, lowercased
pub(crate) fn base_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub(crate) fn is_image_type(content_type: &str) -> bool {
    base_mime(content_type).starts_with("image/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_name_round_trip_str() {
        for slot in SlotName::ALL {
            assert_eq!(slot.as_str().parse::<SlotName>(), Ok(slot));
        }
        assert!("thumbnail".parse::<SlotName>().is_err());
    }

    #[test]
    fn test_auxiliary_slots() {
        assert!(!SlotName::Main.is_auxiliary());
        assert!(SlotName::Depth.is_auxiliary());
        assert!(SlotName::Pose.is_auxiliary());
        assert!(!SlotName::Data.is_auxiliary());
    }

    #[test]
    fn test_data_uri() {
        let payload = SlotPayload::new("image/png", Bytes::from_static(b"abc"));
        assert_eq!(payload.to_data_uri(), "data:image/png;base64,YWJj");
    }

    #[test]
    fn test_wire_value_for_data_slot() {
        let json = SlotPayload::new("application/json", Bytes::from_static(br#"{"a":1}"#));
        assert_eq!(
            json.to_wire_value(SlotName::Data),
            serde_json::json!({"a": 1})
        );

        let text = SlotPayload::new("text/plain; charset=utf-8", Bytes::from_static(b"hi"));
        assert_eq!(text.to_wire_value(SlotName::Data), Value::String("hi".into()));

        let binary = SlotPayload::new("application/octet-stream", Bytes::from_static(b"abc"));
        assert_eq!(
            binary.to_wire_value(SlotName::Data),
            Value::String("data:application/octet-stream;base64,YWJj".into())
        );
    }

    #[test]
    fn test_image_slots_always_data_uri() {
        let payload = SlotPayload::new("text/plain", Bytes::from_static(b"abc"));
        assert!(payload
            .to_wire_value(SlotName::Depth)
            .as_str()
            .unwrap()
            .starts_with("data:text/plain;base64,"));
    }

    #[test]
    fn test_frame_set_is_image() {
        let frame = FrameSet::new(SlotPayload::new("IMAGE/PNG", Bytes::from_static(b"x")));
        assert!(frame.is_image());

        let frame = FrameSet::new(SlotPayload::new("application/octet-stream", Bytes::new()));
        assert!(!frame.is_image());
    }
}
