// SPDX-License-Identifier: GPL-3.0-only

//! Sensor-to-display orientation
//!
//! Sensors are mounted at a fixed angle while the display rotates with the
//! device. Front cameras face the user, so display rotation adds to the
//! sensor angle instead of cancelling it.

use crate::backends::{CameraPosition, SensorRotation};
use image::{DynamicImage, imageops};

/// Clockwise rotation that turns a sensor image upright on the display
pub fn capture_rotation(
    position: CameraPosition,
    sensor: SensorRotation,
    display_degrees: u32,
) -> SensorRotation {
    let sensor = sensor.degrees() as i32;
    let display = (display_degrees % 360) as i32;
    let degrees = match position {
        CameraPosition::Front => sensor + display,
        CameraPosition::Back | CameraPosition::External => sensor - display + 360,
    };
    SensorRotation::from_degrees_int(degrees)
}

/// Rotate an image clockwise
pub fn apply_rotation(image: DynamicImage, rotation: SensorRotation) -> DynamicImage {
    match rotation {
        SensorRotation::None => image,
        SensorRotation::Rotate90 => DynamicImage::ImageRgb8(imageops::rotate90(&image.to_rgb8())),
        SensorRotation::Rotate180 => {
            DynamicImage::ImageRgb8(imageops::rotate180(&image.to_rgb8()))
        }
        SensorRotation::Rotate270 => {
            DynamicImage::ImageRgb8(imageops::rotate270(&image.to_rgb8()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_back_camera_cancels_display_rotation() {
        assert_eq!(
            capture_rotation(CameraPosition::Back, SensorRotation::Rotate90, 0),
            SensorRotation::Rotate90
        );
        assert_eq!(
            capture_rotation(CameraPosition::Back, SensorRotation::Rotate90, 90),
            SensorRotation::None
        );
        assert_eq!(
            capture_rotation(CameraPosition::Back, SensorRotation::Rotate90, 270),
            SensorRotation::Rotate180
        );
    }

    #[test]
    fn test_front_camera_adds_display_rotation() {
        assert_eq!(
            capture_rotation(CameraPosition::Front, SensorRotation::Rotate270, 0),
            SensorRotation::Rotate270
        );
        assert_eq!(
            capture_rotation(CameraPosition::Front, SensorRotation::Rotate270, 90),
            SensorRotation::None
        );
    }

    #[test]
    fn test_quarter_turn_swaps_dimensions() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 2));
        let rotated = apply_rotation(image, SensorRotation::Rotate90);
        assert_eq!((rotated.width(), rotated.height()), (2, 4));
    }
}
