// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use crate::backends::SessionPreset;
use serde::{Deserialize, Serialize};

/// Upper zoom bound regardless of what the device reports
pub const MAX_ZOOM_CAP: f64 = 10.0;

/// Zoom ramp rate (factor doublings per second) for smooth zoom
pub const ZOOM_RAMP_RATE: f64 = 2.0;

/// Default minimum interval between barcode events (ms)
pub const DEFAULT_DETECTION_INTERVAL_MS: u64 = 200;

/// Default wait for an interrupted session before recording gives up (ms)
pub const DEFAULT_RESUME_TIMEOUT_MS: u64 = 2_000;

/// Temp files older than this are considered stale (seconds)
pub const DEFAULT_STALE_FILE_AGE_SECS: u64 = 60 * 60;

/// Photo quality at or above which the native JPEG is reused
pub const DEFAULT_PASSTHROUGH_QUALITY: u8 = 90;

/// Blur overlay duration during the multi-lens upgrade (ms)
pub const DEFAULT_UPGRADE_OVERLAY_MS: u64 = 300;

/// Prefix for every temp file the session creates
pub const TEMP_FILE_PREFIX: &str = "camera-session-";

/// Photo and sample quality used when the caller does not pass one
pub const DEFAULT_PHOTO_QUALITY: u8 = 85;

/// Longest side of frames handed to the barcode decoder
pub const DETECTION_MAX_DIMENSION: u32 = 1280;

/// Video recording quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    /// Small files, SD
    Low,
    /// 720p
    Medium,
    /// 1080p (default)
    #[default]
    High,
    /// Best the hardware offers, up to 4K
    Max,
}

impl VideoQuality {
    /// Get all quality variants for UI iteration
    pub const ALL: [VideoQuality; 4] = [
        VideoQuality::Low,
        VideoQuality::Medium,
        VideoQuality::High,
        VideoQuality::Max,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            VideoQuality::Low => "Low",
            VideoQuality::Medium => "Medium",
            VideoQuality::High => "High",
            VideoQuality::Max => "Max",
        }
    }

    /// Presets to try, best first; the first one the hardware supports wins
    pub fn preset_ladder(&self) -> &'static [SessionPreset] {
        match self {
            VideoQuality::Max => &[
                SessionPreset::Hd3840x2160,
                SessionPreset::Hd1920x1080,
                SessionPreset::Hd1280x720,
                SessionPreset::Vga640x480,
            ],
            VideoQuality::High => &[
                SessionPreset::Hd1920x1080,
                SessionPreset::Hd1280x720,
                SessionPreset::Vga640x480,
            ],
            VideoQuality::Medium => &[SessionPreset::Hd1280x720, SessionPreset::Vga640x480],
            VideoQuality::Low => &[SessionPreset::Vga640x480, SessionPreset::Cif352x288],
        }
    }
}

impl std::str::FromStr for VideoQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(VideoQuality::Low),
            "medium" => Ok(VideoQuality::Medium),
            "high" => Ok(VideoQuality::High),
            "max" | "highest" => Ok(VideoQuality::Max),
            other => Err(format!("unknown video quality '{}'", other)),
        }
    }
}
