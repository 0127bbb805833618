// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::{CameraBackendType, CameraPosition, DeviceType};
use crate::constants::{
    DEFAULT_DETECTION_INTERVAL_MS, DEFAULT_PASSTHROUGH_QUALITY, DEFAULT_RESUME_TIMEOUT_MS,
    DEFAULT_STALE_FILE_AGE_SECS, DEFAULT_UPGRADE_OVERLAY_MS,
};
use crate::pipelines::detection::BarcodeFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming a JSON settings file
pub const CONFIG_ENV: &str = "CAMERA_SESSION_CONFIG";

/// Per-start session parameters
///
/// Created once per `start()` and never mutated; the next `start()`
/// supersedes it entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfiguration {
    /// Explicit device id; takes precedence over position and type preferences
    pub device_id: Option<String>,
    pub position: CameraPosition,
    /// Device types to try in order at the requested position
    pub preferred_device_types: Vec<DeviceType>,
    /// Promote to the multi-lens virtual device in the background after start
    pub use_triple_camera_if_available: bool,
    pub initial_zoom_factor: Option<f64>,
    pub enable_barcode_detection: bool,
    /// Symbology allow-list; empty scans everything supported
    pub barcode_types: Vec<BarcodeFormat>,
}

impl Default for SessionConfiguration {
    fn default() -> Self {
        Self {
            device_id: None,
            position: CameraPosition::Back,
            preferred_device_types: vec![DeviceType::WideAngle],
            use_triple_camera_if_available: false,
            initial_zoom_factor: None,
            enable_barcode_detection: false,
            barcode_types: Vec::new(),
        }
    }
}

impl SessionConfiguration {
    pub fn with_position(position: CameraPosition) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// Process-level tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Camera backend to drive
    pub backend: CameraBackendType,
    /// Directory for temp captures and recordings (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,
    /// Minimum interval between barcode events
    pub detection_interval_ms: u64,
    /// How long recording start waits for an interrupted session to resume
    pub recording_resume_timeout_ms: u64,
    /// Temp files older than this are swept on foreground, except recordings still being written
    pub stale_file_age_secs: u64,
    /// Photo quality at or above which native JPEG bytes pass through
    pub passthrough_quality_threshold: u8,
    /// Blur overlay duration during the multi-lens upgrade
    pub upgrade_overlay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: CameraBackendType::default(),
            temp_dir: None,
            detection_interval_ms: DEFAULT_DETECTION_INTERVAL_MS,
            recording_resume_timeout_ms: DEFAULT_RESUME_TIMEOUT_MS,
            stale_file_age_secs: DEFAULT_STALE_FILE_AGE_SECS,
            passthrough_quality_threshold: DEFAULT_PASSTHROUGH_QUALITY,
            upgrade_overlay_ms: DEFAULT_UPGRADE_OVERLAY_MS,
        }
    }
}

impl Settings {
    /// Load from the file named by `CAMERA_SESSION_CONFIG`, or defaults
    pub fn load() -> Self {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_from(Path::new(&path)),
            None => Self::default(),
        }
    }

    /// Load from a JSON file, falling back to defaults on any error
    pub fn load_from(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read settings, using defaults");
                return Self::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(settings) => {
                info!(path = %path.display(), "Loaded settings");
                settings
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid settings, using defaults");
                Self::default()
            }
        }
    }

    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }

    pub fn recording_resume_timeout(&self) -> Duration {
        Duration::from_millis(self.recording_resume_timeout_ms)
    }

    pub fn stale_file_age(&self) -> Duration {
        Duration::from_secs(self.stale_file_age_secs)
    }

    pub fn upgrade_overlay(&self) -> Duration {
        Duration::from_millis(self.upgrade_overlay_ms)
    }
}
