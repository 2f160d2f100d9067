//! Image header probing
//!
//! Reads just enough of a container header to learn the format and pixel
//! dimensions. Pixel data is never decoded.
//!
//! Supported layouts:
//! ```text
//! PNG   89 50 4E 47 0D 0A 1A 0A | len(4) "IHDR" | width(4 BE) | height(4 BE)
//! GIF   "GIF87a"/"GIF89a"       | width(2 LE)  | height(2 LE)
//! BMP   "BM" ... (offset 18)    | width(4 LE)  | height(4 LE, negative = top-down)
//! WebP  "RIFF" size "WEBP"      | "VP8 " / "VP8L" / "VP8X" chunk
//! JPEG  FF D8 | segments ... | SOFn: len(2) precision(1) height(2 BE) width(2 BE)
//! ```

use bytes::Buf;

/// Recognized image container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
    Bmp,
}

impl ImageFormat {
    /// Detect format from leading magic bytes
    pub fn from_magic(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageFormat::Png)
        } else if data.starts_with(&[0xFF, 0xD8]) {
            Some(ImageFormat::Jpeg)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Some(ImageFormat::WebP)
        } else if data.starts_with(b"BM") {
            Some(ImageFormat::Bmp)
        } else {
            None
        }
    }

    /// Canonical MIME type
    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Bmp => "image/bmp",
        }
    }
}

/// Pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// Result of a successful probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub dimensions: Dimensions,
}

/// Why a probe failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// Magic bytes match no supported format
    #[error("unrecognized image format")]
    Unrecognized,
    /// Header ends before the dimensions
    #[error("truncated {} header", .0.mime())]
    Truncated(ImageFormat),
    /// Header is present but inconsistent
    #[error("corrupt {} header", .0.mime())]
    Corrupt(ImageFormat),
}

impl ProbeError {
    /// Format the data claimed to be, if any
    pub fn format(&self) -> Option<ImageFormat> {
        match self {
            ProbeError::Unrecognized => None,
            ProbeError::Truncated(f) | ProbeError::Corrupt(f) => Some(*f),
        }
    }
}

/// Read format and dimensions from an image header
///
/// Zero-sized images are reported as `Corrupt`.
pub fn probe(data: &[u8]) -> Result<ImageInfo, ProbeError> {
    let format = ImageFormat::from_magic(data).ok_or(ProbeError::Unrecognized)?;

    let dimensions = match format {
        ImageFormat::Png => probe_png(data)?,
        ImageFormat::Jpeg => probe_jpeg(data)?,
        ImageFormat::Gif => probe_gif(data)?,
        ImageFormat::WebP => probe_webp(data)?,
        ImageFormat::Bmp => probe_bmp(data)?,
    };

    if dimensions.width == 0 || dimensions.height == 0 {
        return Err(ProbeError::Corrupt(format));
    }

    Ok(ImageInfo { format, dimensions })
}

fn probe_png(data: &[u8]) -> Result<Dimensions, ProbeError> {
    if data.len() < 24 {
        return Err(ProbeError::Truncated(ImageFormat::Png));
    }
    // First chunk must be IHDR
    if &data[12..16] != b"IHDR" {
        return Err(ProbeError::Corrupt(ImageFormat::Png));
    }
    let mut buf = &data[16..24];
    Ok(Dimensions::new(buf.get_u32(), buf.get_u32()))
}

fn probe_gif(data: &[u8]) -> Result<Dimensions, ProbeError> {
    if data.len() < 10 {
        return Err(ProbeError::Truncated(ImageFormat::Gif));
    }
    let mut buf = &data[6..10];
    let width = buf.get_u16_le() as u32;
    let height = buf.get_u16_le() as u32;
    Ok(Dimensions::new(width, height))
}

fn probe_bmp(data: &[u8]) -> Result<Dimensions, ProbeError> {
    if data.len() < 26 {
        return Err(ProbeError::Truncated(ImageFormat::Bmp));
    }
    let mut buf = &data[18..26];
    let width = buf.get_i32_le();
    let height = buf.get_i32_le();
    if width < 0 {
        return Err(ProbeError::Corrupt(ImageFormat::Bmp));
    }
    Ok(Dimensions::new(width.unsigned_abs(), height.unsigned_abs()))
}

fn probe_webp(data: &[u8]) -> Result<Dimensions, ProbeError> {
    const FMT: ImageFormat = ImageFormat::WebP;

    if data.len() < 16 {
        return Err(ProbeError::Truncated(FMT));
    }

    match &data[12..16] {
        // Lossy: frame tag (3) + start code 9D 01 2A + 14-bit sizes
        b"VP8 " => {
            if data.len() < 30 {
                return Err(ProbeError::Truncated(FMT));
            }
            if data[23..26] != [0x9D, 0x01, 0x2A] {
                return Err(ProbeError::Corrupt(FMT));
            }
            let mut buf = &data[26..30];
            let width = (buf.get_u16_le() & 0x3FFF) as u32;
            let height = (buf.get_u16_le() & 0x3FFF) as u32;
            Ok(Dimensions::new(width, height))
        }
        // Lossless: signature 0x2F + 14-bit (size - 1) fields packed LE
        b"VP8L" => {
            if data.len() < 25 {
                return Err(ProbeError::Truncated(FMT));
            }
            if data[20] != 0x2F {
                return Err(ProbeError::Corrupt(FMT));
            }
            let bits = (&data[21..25]).get_u32_le();
            let width = (bits & 0x3FFF) + 1;
            let height = ((bits >> 14) & 0x3FFF) + 1;
            Ok(Dimensions::new(width, height))
        }
        // Extended: 24-bit (canvas size - 1) fields
        b"VP8X" => {
            if data.len() < 30 {
                return Err(ProbeError::Truncated(FMT));
            }
            let width = read_u24_le(&data[24..27]) + 1;
            let height = read_u24_le(&data[27..30]) + 1;
            Ok(Dimensions::new(width, height))
        }
        _ => Err(ProbeError::Corrupt(FMT)),
    }
}

fn probe_jpeg(data: &[u8]) -> Result<Dimensions, ProbeError> {
    const FMT: ImageFormat = ImageFormat::Jpeg;

    let mut pos = 2;
    loop {
        // Skip to the next marker, tolerating fill bytes
        while pos < data.len() && data[pos] != 0xFF {
            pos += 1;
        }
        while pos < data.len() && data[pos] == 0xFF {
            pos += 1;
        }
        let Some(&marker) = data.get(pos) else {
            return Err(ProbeError::Truncated(FMT));
        };
        pos += 1;

        match marker {
            // Standalone markers carry no length
            0x01 | 0xD0..=0xD7 | 0xD8 => continue,
            // Start of scan / end of image before any frame header
            0xDA | 0xD9 => return Err(ProbeError::Corrupt(FMT)),
            _ => {}
        }

        if pos + 2 > data.len() {
            return Err(ProbeError::Truncated(FMT));
        }
        let length = (&data[pos..pos + 2]).get_u16() as usize;
        if length < 2 {
            return Err(ProbeError::Corrupt(FMT));
        }

        if is_sof_marker(marker) {
            if pos + 7 > data.len() {
                return Err(ProbeError::Truncated(FMT));
            }
            let mut buf = &data[pos + 3..pos + 7];
            let height = buf.get_u16() as u32;
            let width = buf.get_u16() as u32;
            return Ok(Dimensions::new(width, height));
        }

        pos += length;
    }
}

/// SOF0..SOF15 excluding DHT (C4), JPG (C8) and DAC (CC)
fn is_sof_marker(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

fn read_u24_le(b: &[u8]) -> u32 {
    b[0] as u32 | (b[1] as u32) << 8 | (b[2] as u32) << 16
}
