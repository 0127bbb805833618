// SPDX-License-Identifier: GPL-3.0-only

//! Frame-to-display coordinate mapping
//!
//! Detections are found in sensor orientation. The preview shows the frame
//! rotated to the display, mirrored for front cameras, and scaled to fill
//! the render target (cropping the overflowing axis). Boxes go through the
//! same transform so they line up with what the user sees.

use super::types::FrameRegion;
use crate::backends::SensorRotation;
use crate::render::Rect;

/// Everything needed to place a frame region on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayMapping {
    /// Rotation applied to the sensor image for display
    pub rotation: SensorRotation,
    /// Mirror horizontally after rotating (front camera preview)
    pub mirrored: bool,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Render target bounds
    pub bounds: Rect,
    /// Host view offset within the caller's coordinate space
    pub layout_offset: (f64, f64),
}

/// Rotate a normalized region clockwise by `rotation`
pub fn rotate_region(region: FrameRegion, rotation: SensorRotation) -> FrameRegion {
    let FrameRegion {
        x,
        y,
        width: w,
        height: h,
    } = region;
    match rotation {
        SensorRotation::None => region,
        SensorRotation::Rotate90 => FrameRegion::new(1.0 - y - h, x, h, w),
        SensorRotation::Rotate180 => FrameRegion::new(1.0 - x - w, 1.0 - y - h, w, h),
        SensorRotation::Rotate270 => FrameRegion::new(y, 1.0 - x - w, h, w),
    }
}

pub fn mirror_region(region: FrameRegion) -> FrameRegion {
    FrameRegion::new(1.0 - region.x - region.width, region.y, region.width, region.height)
}

impl DisplayMapping {
    /// Map a normalized sensor-space region into caller coordinates
    pub fn map(&self, region: FrameRegion) -> Rect {
        let mut oriented = rotate_region(region, self.rotation);
        if self.mirrored {
            oriented = mirror_region(oriented);
        }

        let (mut content_w, mut content_h) = (self.frame_width as f64, self.frame_height as f64);
        if self.rotation.swaps_dimensions() {
            std::mem::swap(&mut content_w, &mut content_h);
        }
        if content_w <= 0.0 || content_h <= 0.0 || self.bounds.is_empty() {
            return Rect::default();
        }

        // Aspect fill: scale to cover the bounds, center, crop the overflow
        let scale = (self.bounds.width / content_w).max(self.bounds.height / content_h);
        let shown_w = content_w * scale;
        let shown_h = content_h * scale;
        let crop_x = (self.bounds.width - shown_w) / 2.0;
        let crop_y = (self.bounds.height - shown_h) / 2.0;

        let (dx, dy) = self.layout_offset;
        Rect::new(
            oriented.x * shown_w + crop_x + self.bounds.x + dx,
            oriented.y * shown_h + crop_y + self.bounds.y + dy,
            oriented.width * shown_w,
            oriented.height * shown_h,
        )
    }
}
