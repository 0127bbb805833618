// SPDX-License-Identifier: GPL-3.0-only

//! Async photo encoding
//!
//! Turns either the platform's native JPEG or a raw live frame into the
//! JPEG the caller receives: rotated upright and compressed at the
//! requested quality. High-quality shots that need no rotation reuse the
//! native bytes as-is. All encoding runs on the blocking pool.

use crate::backends::{CameraFrame, CapturedPhoto, SensorRotation};
use crate::pipelines::photo::orientation::apply_rotation;
use image::{DynamicImage, RgbImage};
use tracing::{debug, info};

/// Encoded image data ready for the caller
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// JPEG encoder with a fixed quality
#[derive(Debug, Clone, Copy)]
pub struct PhotoEncoder {
    quality: u8,
    passthrough_threshold: u8,
}

impl PhotoEncoder {
    /// `quality` is clamped to 1-100
    pub fn new(quality: u8, passthrough_threshold: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            passthrough_threshold,
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Whether native bytes can be returned without re-encoding
    pub fn can_pass_through(&self, rotation: SensorRotation) -> bool {
        self.quality >= self.passthrough_threshold && rotation == SensorRotation::None
    }

    /// Finish a photo from the platform photo output
    pub async fn encode_photo(
        &self,
        photo: CapturedPhoto,
        rotation: SensorRotation,
    ) -> Result<EncodedImage, String> {
        if self.can_pass_through(rotation) {
            debug!(size = photo.jpeg.len(), "Reusing native JPEG");
            return Ok(EncodedImage {
                data: photo.jpeg,
                width: photo.width,
                height: photo.height,
            });
        }

        let encoder = *self;
        tokio::task::spawn_blocking(move || {
            let decoded = image::load_from_memory(&photo.jpeg)
                .map_err(|e| format!("Failed to decode native photo: {}", e))?;
            encoder.encode_image(decoded, rotation)
        })
        .await
        .map_err(|e| format!("Encoding task error: {}", e))?
    }

    /// Encode a live frame (sample capture)
    pub async fn encode_frame(
        &self,
        frame: std::sync::Arc<CameraFrame>,
        rotation: SensorRotation,
    ) -> Result<EncodedImage, String> {
        let encoder = *self;
        tokio::task::spawn_blocking(move || {
            let rgb = RgbImage::from_raw(frame.width, frame.height, frame.to_rgb_bytes())
                .ok_or_else(|| "Frame buffer does not match its dimensions".to_string())?;
            encoder.encode_image(DynamicImage::ImageRgb8(rgb), rotation)
        })
        .await
        .map_err(|e| format!("Encoding task error: {}", e))?
    }

    fn encode_image(
        &self,
        image: DynamicImage,
        rotation: SensorRotation,
    ) -> Result<EncodedImage, String> {
        let upright = apply_rotation(image, rotation).to_rgb8();
        let data = Self::encode_jpeg(&upright, self.quality)?;
        info!(
            width = upright.width(),
            height = upright.height(),
            quality = self.quality,
            %rotation,
            size = data.len(),
            "Encoded JPEG"
        );
        Ok(EncodedImage {
            data,
            width: upright.width(),
            height: upright.height(),
        })
    }

    fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, String> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);

        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
        encoder
            .encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| format!("JPEG encoding failed: {}", e))?;

        Ok(buffer)
    }
}
