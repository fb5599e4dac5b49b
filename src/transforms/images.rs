//! Raster image steps: lossless-first recompression and WebP variants.

use super::{Step, StepError};
use crate::build::FileRecord;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, DynamicImage, ImageEncoder, ImageFormat};

/// Image kinds the steps know how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Png,
    Jpeg,
    Svg,
    Other,
}

fn kind_of(record: &FileRecord) -> Kind {
    match record.extension().as_deref() {
        Some("png") => Kind::Png,
        Some("jpg") | Some("jpeg") => Kind::Jpeg,
        Some("svg") => Kind::Svg,
        _ => Kind::Other,
    }
}

fn decode(record: &FileRecord, format: ImageFormat, step: &'static str) -> Result<DynamicImage, StepError> {
    image::load_from_memory_with_format(&record.contents, format).map_err(|e| StepError::new(step, record, e))
}

/// Re-encode PNG and JPEG files to shrink them.
///
/// The re-encoded bytes are only kept when they are smaller than the
/// original. Vector and unknown files pass through untouched.
#[derive(Debug, Clone)]
pub struct OptimizeImages {
    jpeg_quality: u8,
}

impl OptimizeImages {
    /// Create the step with a JPEG quality (1-100).
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality: jpeg_quality.clamp(1, 100) }
    }

    fn encode_png(&self, image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
        let mut out = Vec::new();
        PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive).write_image(
            image.as_bytes(),
            image.width(),
            image.height(),
            image.color(),
        )?;
        Ok(out)
    }

    fn encode_jpeg(&self, image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
        let rgb = image.to_rgb8();
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.jpeg_quality).encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ColorType::Rgb8,
        )?;
        Ok(out)
    }
}

impl Default for OptimizeImages {
    fn default() -> Self {
        Self::new(75)
    }
}

impl Step for OptimizeImages {
    fn name(&self) -> &'static str {
        "imagemin"
    }

    fn apply(&self, mut record: FileRecord) -> Result<Option<FileRecord>, StepError> {
        let encoded = match kind_of(&record) {
            Kind::Png => {
                let image = decode(&record, ImageFormat::Png, self.name())?;
                self.encode_png(&image)
            }
            Kind::Jpeg => {
                let image = decode(&record, ImageFormat::Jpeg, self.name())?;
                self.encode_jpeg(&image)
            }
            Kind::Svg | Kind::Other => return Ok(Some(record)),
        };

        let encoded = encoded.map_err(|e| StepError::new(self.name(), &record, e))?;
        if encoded.len() < record.contents.len() {
            tracing::debug!(
                file = %record.relative.display(),
                before = record.contents.len(),
                after = encoded.len(),
                "recompressed"
            );
            record.contents = encoded;
        }
        Ok(Some(record))
    }
}

/// Encode PNG and JPEG files as lossy WebP.
///
/// Other inputs (SVG included) are dropped from the stream.
#[derive(Debug, Clone)]
pub struct WebpEncode {
    quality: u8,
}

impl WebpEncode {
    /// Create the step with a quality (1-100).
    pub fn new(quality: u8) -> Self {
        Self { quality: quality.clamp(1, 100) }
    }
}

impl Default for WebpEncode {
    fn default() -> Self {
        Self::new(75)
    }
}

impl Step for WebpEncode {
    fn name(&self) -> &'static str {
        "webp"
    }

    fn apply(&self, mut record: FileRecord) -> Result<Option<FileRecord>, StepError> {
        let format = match kind_of(&record) {
            Kind::Png => ImageFormat::Png,
            Kind::Jpeg => ImageFormat::Jpeg,
            Kind::Svg | Kind::Other => {
                tracing::debug!(file = %record.relative.display(), "no raster data, skipping webp");
                return Ok(None);
            }
        };

        let rgba = decode(&record, format, self.name())?.to_rgba8();
        // libwebp rejects images over 16383 px on a side
        let encoded = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
            .encode_simple(false, f32::from(self.quality))
            .map_err(|e| StepError::new(self.name(), &record, format!("{:?}", e)))?;

        record.contents = encoded.to_vec();
        record.set_extension("webp");
        Ok(Some(record))
    }
}
