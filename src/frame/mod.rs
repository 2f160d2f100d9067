//! Frame sets and their codec
//!
//! This module provides:
//! - `FrameSet`, the unit of distribution (named slots + metadata)
//! - `normalize`, which turns a producer upload into a `FrameSet`
//! - Header-only image probing used to validate the `main` slot and to size
//!   display nodes without decoding pixels
//!
//! Payloads pass through byte-for-byte. Only the container (binary body,
//! base64 text, data URI) is normalized.

pub mod codec;
pub mod error;
pub mod image;
pub mod slot;

pub use codec::{decode_slot_value, normalize, parse_data_uri, RawUpload};
pub use error::CodecError;
pub use image::{probe, Dimensions, ImageFormat, ImageInfo};
pub use slot::{FrameMetadata, FrameSet, SlotName, SlotPayload};
