// SPDX-License-Identifier: GPL-3.0-only

//! Still-image output shared by backends that build photos from frames

use super::types::{BackendError, BackendResult, CameraFrame};
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;

/// Quality the photo output encodes native stills at
pub const NATIVE_JPEG_QUALITY: u8 = 95;

/// Encode a frame the way a platform photo output would (JPEG, sensor orientation)
pub fn encode_still(frame: &CameraFrame) -> BackendResult<Vec<u8>> {
    let rgb = frame.to_rgb_bytes();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, NATIVE_JPEG_QUALITY)
        .encode(&rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
        .map_err(|e| BackendError::Hardware(format!("still encoding failed: {}", e)))?;
    Ok(buffer)
}
