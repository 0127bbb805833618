// SPDX-License-Identifier: GPL-3.0-only

//! Barcode decoding
//!
//! Frames are converted to luma and downscaled before they reach the
//! decoder. Only the first decodable candidate in a frame is reported.

use super::types::{BarcodeFormat, FrameRegion, RawDetection};
use crate::backends::CameraFrame;
use crate::constants::DETECTION_MAX_DIMENSION;
use std::time::Instant;
use tracing::{debug, trace};

/// Decoder for live frames
pub trait BarcodeScanner: Send + Sync {
    /// Symbologies this scanner can decode
    fn supported_formats(&self) -> &[BarcodeFormat];

    /// Decode the first symbol in `frame` matching `formats` (empty = any)
    fn scan(&self, frame: &CameraFrame, formats: &[BarcodeFormat]) -> Option<RawDetection>;
}

/// QR code scanner backed by rqrr
pub struct RqrrScanner {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for RqrrScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl RqrrScanner {
    pub fn new() -> Self {
        Self {
            max_dimension: DETECTION_MAX_DIMENSION,
        }
    }
}

const RQRR_FORMATS: [BarcodeFormat; 1] = [BarcodeFormat::Qr];

impl BarcodeScanner for RqrrScanner {
    fn supported_formats(&self) -> &[BarcodeFormat] {
        &RQRR_FORMATS
    }

    fn scan(&self, frame: &CameraFrame, formats: &[BarcodeFormat]) -> Option<RawDetection> {
        if !formats.is_empty() && !formats.contains(&BarcodeFormat::Qr) {
            return None;
        }
        if frame.width == 0 || frame.height == 0 {
            return None;
        }

        let start = Instant::now();
        let (luma, proc_width, proc_height, scale) = prepare_luma(frame, self.max_dimension);

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            proc_width as usize,
            proc_height as usize,
            |x, y| luma[y * proc_width as usize + x],
        );
        let grids = prepared.detect_grids();
        trace!(
            candidates = grids.len(),
            proc_width,
            proc_height,
            elapsed_ms = start.elapsed().as_millis(),
            "QR grid search complete"
        );

        for grid in grids {
            let content = match grid.decode() {
                Ok((_, content)) => content,
                Err(e) => {
                    debug!(error = ?e, "Failed to decode QR candidate");
                    continue;
                }
            };

            let xs = grid.bounds.iter().map(|p| p.x);
            let ys = grid.bounds.iter().map(|p| p.y);
            let min_x = xs.clone().min().unwrap_or(0).max(0) as f64;
            let max_x = xs.max().unwrap_or(0).max(0) as f64;
            let min_y = ys.clone().min().unwrap_or(0).max(0) as f64;
            let max_y = ys.max().unwrap_or(0).max(0) as f64;

            let region = FrameRegion::from_pixels(
                (min_x * scale) as u32,
                (min_y * scale) as u32,
                ((max_x - min_x) * scale) as u32,
                ((max_y - min_y) * scale) as u32,
                frame.width,
                frame.height,
            );

            debug!(
                content = %content,
                x = region.x,
                y = region.y,
                width = region.width,
                height = region.height,
                elapsed_ms = start.elapsed().as_millis(),
                "Detected QR code"
            );

            return Some(RawDetection {
                value: content,
                format: BarcodeFormat::Qr,
                region,
            });
        }

        None
    }
}

/// Luma plane, downscaled (nearest neighbour) so the longest side fits
fn prepare_luma(frame: &CameraFrame, max_dimension: u32) -> (Vec<u8>, u32, u32, f64) {
    let (width, height) = (frame.width, frame.height);
    let scale = if width > max_dimension || height > max_dimension {
        (width as f64 / max_dimension as f64).max(height as f64 / max_dimension as f64)
    } else {
        1.0
    };
    let proc_width = ((width as f64 / scale) as u32).max(1);
    let proc_height = ((height as f64 / scale) as u32).max(1);

    let mut luma = Vec::with_capacity((proc_width * proc_height) as usize);
    for y in 0..proc_height {
        let src_y = ((y as f64 * scale) as u32).min(height - 1);
        for x in 0..proc_width {
            let src_x = ((x as f64 * scale) as u32).min(width - 1);
            luma.push(frame.luma(src_x, src_y));
        }
    }
    (luma, proc_width, proc_height, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::PixelFormat;

    #[test]
    fn test_blank_frame_has_no_detection() {
        let frame = CameraFrame::new(64, 48, PixelFormat::Gray8, vec![255; 64 * 48]);
        assert!(RqrrScanner::new().scan(&frame, &[]).is_none());
    }

    #[test]
    fn test_unsupported_filter_skips_decode() {
        let frame = CameraFrame::new(8, 8, PixelFormat::Gray8, vec![0; 64]);
        assert!(
            RqrrScanner::new()
                .scan(&frame, &[BarcodeFormat::Ean13])
                .is_none()
        );
    }

    #[test]
    fn test_downscale_keeps_aspect() {
        let frame = CameraFrame::new(400, 200, PixelFormat::Gray8, vec![7; 400 * 200]);
        let (luma, w, h, scale) = prepare_luma(&frame, 100);
        assert_eq!((w, h), (100, 50));
        assert_eq!(luma.len(), 5000);
        assert!((scale - 4.0).abs() < f64::EPSILON);
        assert!(luma.iter().all(|&v| v == 7));
    }
}
