// src/services/image_processor.rs
use crate::errors::ZenError;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, GenericImageView};

pub const FRAME_WIDTH: u32 = 640;
pub const FRAME_HEIGHT: u32 = 480;
pub const FRAME_QUALITY: u8 = 70;

/// Normalises camera stills before they leave the device.
pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Decodes a still, rejecting anything larger than 4096 on either side.
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, ZenError> {
        let img = image::load_from_memory(data)
            .map_err(|e| ZenError::ImageProcessing(format!("Invalid image format: {}", e)))?;

        let (width, height) = img.dimensions();
        if width > 4096 || height > 4096 {
            return Err(ZenError::ImageProcessing(
                "Image dimensions exceed 4096x4096".to_string(),
            ));
        }

        Ok(img)
    }

    /// Scales a still to exactly 640x480 and re-encodes it as JPEG at
    /// quality 70, the shape the vision endpoint is fed.
    pub fn prepare_frame(&self, data: &[u8]) -> Result<Vec<u8>, ZenError> {
        let frame = self
            .decode(data)?
            .resize_exact(
                FRAME_WIDTH,
                FRAME_HEIGHT,
                image::imageops::FilterType::Triangle,
            )
            .to_rgb8();

        let mut output = Vec::new();
        JpegEncoder::new_with_quality(&mut output, FRAME_QUALITY)
            .encode(frame.as_raw(), FRAME_WIDTH, FRAME_HEIGHT, ColorType::Rgb8)
            .map_err(|e| ZenError::ImageProcessing(format!("Failed to encode frame: {}", e)))?;

        Ok(output)
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}
