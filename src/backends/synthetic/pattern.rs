// SPDX-License-Identifier: GPL-3.0-only

//! Test-pattern frames for the synthetic camera

use crate::backends::types::{CameraFrame, PixelFormat};

/// Default sensor frame size (landscape, as sensors report it)
pub const PATTERN_WIDTH: u32 = 64;
pub const PATTERN_HEIGHT: u32 = 48;

/// RGBA gradient with a vertical bar that moves with `tick`
pub fn pattern_frame(width: u32, height: u32, tick: u64) -> CameraFrame {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    let bar = (tick % width.max(1) as u64) as u32;
    for y in 0..height {
        for x in 0..width {
            if x == bar {
                data.extend_from_slice(&[255, 255, 255, 255]);
            } else {
                let r = (x * 255 / width.max(1)) as u8;
                let g = (y * 255 / height.max(1)) as u8;
                data.extend_from_slice(&[r, g, 128, 255]);
            }
        }
    }
    CameraFrame::new(width, height, PixelFormat::RGBA, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::still::encode_still;

    #[test]
    fn test_bar_moves_with_tick() {
        let a = pattern_frame(8, 2, 0);
        let b = pattern_frame(8, 2, 3);
        assert_eq!(a.luma(0, 0), 255);
        assert_eq!(b.luma(3, 0), 255);
        assert_ne!(b.luma(0, 0), 255);
    }

    #[test]
    fn test_still_is_decodable_jpeg() {
        let frame = pattern_frame(PATTERN_WIDTH, PATTERN_HEIGHT, 0);
        let jpeg = encode_still(&frame).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), PATTERN_WIDTH);
        assert_eq!(decoded.height(), PATTERN_HEIGHT);
    }
}
