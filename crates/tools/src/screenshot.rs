//! Screenshot capture and payload budgeting.
//!
//! A capture is kept as lossless PNG when it already fits the transmission
//! budget. Otherwise it is downscaled to the smaller of the long-side cap and
//! the coordinate-space size, then re-encoded as JPEG down a fixed quality
//! ladder until the base64 form fits. The same input always yields the same
//! output.

use crate::coordinates::Dimensions;
use crate::error::ScreenshotError;
use crate::traits::ScreenshotProvider;
use base64::{engine::general_purpose, Engine as _};
use deskpilot_providers::ContentBlock;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, ImageFormat};
use serde::Serialize;
use tracing::{debug, info};

pub const DEFAULT_MAX_ENCODED_BYTES: usize = 5 * 1024 * 1024;
pub const LONG_SIDE_CAP: u32 = 1568;
pub const QUALITY_LADDER: [u8; 6] = [85, 75, 65, 55, 45, 35];

pub const MEDIA_TYPE_PNG: &str = "image/png";
pub const MEDIA_TYPE_JPEG: &str = "image/jpeg";

/// Length of the base64 encoding of `n` raw bytes.
pub fn base64_len(n: usize) -> usize {
    n.div_ceil(3) * 4
}

/// Largest raw size whose base64 encoding fits in `limit` bytes.
pub fn max_raw_bytes(limit: usize) -> usize {
    limit / 4 * 3
}

/// What a [`ScreenshotProvider`] hands back: PNG bytes plus the two
/// backend-reported sizes.
#[derive(Debug, Clone)]
pub struct RawCapture {
    pub png: Vec<u8>,
    pub capture: Dimensions,
    pub coordinate: Dimensions,
}

/// A screenshot ready for transmission.
#[derive(Debug, Clone, Serialize)]
pub struct CapturedScreenshot {
    /// Size of the transmitted image, the space the model reasons in.
    pub tool: Dimensions,
    pub capture: Dimensions,
    pub coordinate: Dimensions,
    pub media_type: &'static str,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    #[serde(skip)]
    pub base64: String,
    pub base64_len: usize,
}

impl CapturedScreenshot {
    pub fn to_content_block(&self) -> ContentBlock {
        ContentBlock::image(self.media_type, self.base64.clone())
    }
}

#[derive(Debug, Clone)]
pub struct ScreenshotPipeline {
    max_encoded_bytes: usize,
    long_side_cap: u32,
}

impl ScreenshotPipeline {
    pub fn new(max_encoded_bytes: usize) -> Self {
        Self {
            max_encoded_bytes,
            long_side_cap: LONG_SIDE_CAP,
        }
    }

    pub fn max_encoded_bytes(&self) -> usize {
        self.max_encoded_bytes
    }

    pub async fn capture(
        &self,
        provider: &dyn ScreenshotProvider,
    ) -> Result<CapturedScreenshot, ScreenshotError> {
        let raw = provider.capture().await?;
        self.encode(&raw)
    }

    pub fn encode(&self, raw: &RawCapture) -> Result<CapturedScreenshot, ScreenshotError> {
        let png_len = base64_len(raw.png.len());
        if png_len <= self.max_encoded_bytes {
            debug!("Screenshot fits as PNG ({} base64 bytes)", png_len);
            return Ok(CapturedScreenshot {
                tool: raw.capture,
                capture: raw.capture,
                coordinate: raw.coordinate,
                media_type: MEDIA_TYPE_PNG,
                base64: general_purpose::STANDARD.encode(&raw.png),
                bytes: raw.png.clone(),
                base64_len: png_len,
            });
        }

        let decoded = image::load_from_memory_with_format(&raw.png, ImageFormat::Png)
            .map_err(|e| ScreenshotError::Image(e.to_string()))?;
        let source = Dimensions::new(decoded.width(), decoded.height());
        let target = self.target_dimensions(source, raw.coordinate);
        let rgb = if target == source {
            decoded.to_rgb8()
        } else {
            decoded
                .resize_exact(target.width, target.height, FilterType::Triangle)
                .to_rgb8()
        };

        let mut smallest = usize::MAX;
        for quality in QUALITY_LADDER {
            let mut bytes = Vec::new();
            JpegEncoder::new_with_quality(&mut bytes, quality)
                .encode(rgb.as_raw(), target.width, target.height, ColorType::Rgb8)
                .map_err(|e| ScreenshotError::Image(e.to_string()))?;

            let encoded_len = base64_len(bytes.len());
            if encoded_len <= self.max_encoded_bytes {
                info!(
                    "Screenshot re-encoded {}x{} -> {}x{} JPEG q{} ({} base64 bytes)",
                    source.width, source.height, target.width, target.height, quality, encoded_len
                );
                return Ok(CapturedScreenshot {
                    tool: target,
                    capture: raw.capture,
                    coordinate: raw.coordinate,
                    media_type: MEDIA_TYPE_JPEG,
                    base64: general_purpose::STANDARD.encode(&bytes),
                    bytes,
                    base64_len: encoded_len,
                });
            }
            smallest = smallest.min(encoded_len);
        }

        Err(ScreenshotError::SizeExceeded {
            smallest,
            limit: self.max_encoded_bytes,
        })
    }

    /// Aspect-preserving size bounded by both the coordinate-space size and
    /// the long-side cap. Never upscales.
    fn target_dimensions(&self, source: Dimensions, coordinate: Dimensions) -> Dimensions {
        let mut scale = 1.0f64;
        if !coordinate.is_empty() {
            scale = scale
                .min(coordinate.width as f64 / source.width as f64)
                .min(coordinate.height as f64 / source.height as f64);
        }
        let long_side = source.width.max(source.height) as f64;
        scale = scale.min(self.long_side_cap as f64 / long_side);

        if scale >= 1.0 {
            return source;
        }
        Dimensions::new(
            ((source.width as f64 * scale).round() as u32).max(1),
            ((source.height as f64 * scale).round() as u32).max(1),
        )
    }
}

impl Default for ScreenshotPipeline {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENCODED_BYTES)
    }
}
