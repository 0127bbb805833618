// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackendType {
    /// In-process simulated camera stack
    #[default]
    Synthetic,
    /// GStreamer capture (Linux)
    GStreamer,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::Synthetic => write!(f, "synthetic"),
            CameraBackendType::GStreamer => write!(f, "GStreamer"),
        }
    }
}

/// Which side of the device the camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraPosition {
    #[default]
    Back,
    Front,
    /// USB or otherwise detached camera
    External,
}

impl CameraPosition {
    /// Position selected by a flip
    pub fn flipped(self) -> Self {
        match self {
            CameraPosition::Front => CameraPosition::Back,
            CameraPosition::Back | CameraPosition::External => CameraPosition::Front,
        }
    }

    /// Parse a location string ("front", "back", "external")
    pub fn from_location(location: &str) -> Self {
        match location.trim().to_lowercase().as_str() {
            "front" | "user" => CameraPosition::Front,
            "back" | "rear" | "environment" => CameraPosition::Back,
            _ => CameraPosition::External,
        }
    }
}

impl std::fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraPosition::Back => write!(f, "back"),
            CameraPosition::Front => write!(f, "front"),
            CameraPosition::External => write!(f, "external"),
        }
    }
}

/// Physical or virtual lens arrangement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceType {
    WideAngle,
    UltraWide,
    Telephoto,
    DualCamera,
    DualWideCamera,
    /// Virtual device switching between wide, ultra-wide and telephoto
    TripleCamera,
    TrueDepth,
    External,
}

impl DeviceType {
    /// Number of physical lenses behind the device
    pub fn lens_count(&self) -> u8 {
        match self {
            DeviceType::TripleCamera => 3,
            DeviceType::DualCamera | DeviceType::DualWideCamera => 2,
            _ => 1,
        }
    }
}

/// Sensor rotation in degrees (clockwise)
///
/// Camera sensors may be physically mounted at various angles relative to the device.
/// This is common on mobile devices where sensors are rotated 90° or 270° relative
/// to the display orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SensorRotation {
    /// No rotation (sensor is oriented correctly)
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees (upside down)
    Rotate180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl SensorRotation {
    /// Create rotation from an integer degree value (normalised to 0-360).
    pub fn from_degrees_int(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => SensorRotation::Rotate90,
            180 => SensorRotation::Rotate180,
            270 => SensorRotation::Rotate270,
            _ => SensorRotation::None,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 90,
            SensorRotation::Rotate180 => 180,
            SensorRotation::Rotate270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, SensorRotation::Rotate90 | SensorRotation::Rotate270)
    }
}

impl std::fmt::Display for SensorRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Describes one camera visible to the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    /// Stable platform identifier
    pub id: String,
    pub name: String,
    pub position: CameraPosition,
    pub device_type: DeviceType,
    pub has_flash: bool,
    pub has_torch: bool,
    /// Torch supports intermediate intensity levels
    pub continuous_torch: bool,
    pub min_zoom: f64,
    /// Maximum zoom as reported by the device (may be unrealistically large)
    pub max_zoom: f64,
    /// Mounting angle of the sensor relative to the natural display orientation
    pub sensor_orientation: SensorRotation,
    /// Whether this device is bound to the running session
    #[serde(default)]
    pub is_active: bool,
}

impl DeviceDescriptor {
    pub fn lens_count(&self) -> u8 {
        self.device_type.lens_count()
    }
}

/// Zoom range and current factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomFactors {
    pub min: f64,
    pub max: f64,
    pub current: f64,
}

/// Photo flash mode, applied per shot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashMode {
    #[default]
    Off,
    On,
    Auto,
}

impl std::fmt::Display for FlashMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlashMode::Off => write!(f, "off"),
            FlashMode::On => write!(f, "on"),
            FlashMode::Auto => write!(f, "auto"),
        }
    }
}

/// Torch state, applied immediately and kept until changed or session stop
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TorchState {
    pub enabled: bool,
    /// Intensity 0.0 - 1.0 (binary on devices without continuous torch)
    pub level: f32,
}

/// Output stages that can be wired into a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// Full still-photo output
    Photo,
    /// Live frame buffer output used for samples and detection
    FrameSample,
    /// Metadata output carrying barcode detection
    Metadata,
    /// Movie file output
    Movie,
}

impl OutputKind {
    pub fn name(&self) -> &'static str {
        match self {
            OutputKind::Photo => "photo",
            OutputKind::FrameSample => "frame-sample",
            OutputKind::Metadata => "metadata",
            OutputKind::Movie => "movie",
        }
    }
}

/// Session preset, highest quality first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPreset {
    Hd3840x2160,
    Hd1920x1080,
    Hd1280x720,
    Vga640x480,
    Cif352x288,
    /// Default preset the session starts with (photo-oriented)
    Photo,
}

impl SessionPreset {
    /// Frame dimensions for video presets
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            SessionPreset::Hd3840x2160 => Some((3840, 2160)),
            SessionPreset::Hd1920x1080 => Some((1920, 1080)),
            SessionPreset::Hd1280x720 => Some((1280, 720)),
            SessionPreset::Vga640x480 => Some((640, 480)),
            SessionPreset::Cif352x288 => Some((352, 288)),
            SessionPreset::Photo => None,
        }
    }
}

/// Pixel layout of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::RGBA => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// A single frame from the camera, in sensor orientation
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Tightly packed frame without stride padding
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width * format.bytes_per_pixel() as u32,
            data: Arc::from(data),
            format,
            captured_at: Instant::now(),
        }
    }

    /// Luma value of one pixel
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        let offset = y as usize * self.stride as usize + x as usize * self.format.bytes_per_pixel();
        match self.format {
            PixelFormat::Gray8 => self.data.get(offset).copied().unwrap_or(0),
            PixelFormat::RGBA => match self.data.get(offset..offset + 3) {
                Some(px) => {
                    ((px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000) as u8
                }
                None => 0,
            },
        }
    }

    /// Copy RGB pixels without stride padding
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        let width = self.width as usize;
        let height = self.height as usize;
        let stride = self.stride as usize;
        let bpp = self.format.bytes_per_pixel();

        let mut result = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            let row_start = y * stride;
            let row_end = row_start + width * bpp;
            let Some(row) = self.data.get(row_start..row_end) else {
                break;
            };
            match self.format {
                PixelFormat::RGBA => {
                    for px in row.chunks_exact(4) {
                        result.extend_from_slice(&px[..3]);
                    }
                }
                PixelFormat::Gray8 => {
                    for &v in row {
                        result.extend_from_slice(&[v, v, v]);
                    }
                }
            }
        }
        result
    }
}

/// Latest-frame slot shared between the backend and its consumers
///
/// Only the most recent frame is kept; consumers that fall behind skip
/// straight to the newest one.
#[derive(Clone)]
pub struct FrameSink {
    sender: Arc<watch::Sender<Option<Arc<CameraFrame>>>>,
}

/// Receiving side of a [`FrameSink`]
pub type FrameReceiver = watch::Receiver<Option<Arc<CameraFrame>>>;

impl FrameSink {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publish a frame, replacing the previous one
    pub fn deliver(&self, frame: CameraFrame) {
        self.sender.send_replace(Some(Arc::new(frame)));
    }

    /// Drop the stored frame (session torn down)
    pub fn clear(&self) {
        self.sender.send_replace(None);
    }

    pub fn latest(&self) -> Option<Arc<CameraFrame>> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> FrameReceiver {
        self.sender.subscribe()
    }
}

impl Default for FrameSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-shot photo settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotoSettings {
    pub flash: FlashMode,
}

/// Encoded still image produced by the platform photo output
#[derive(Debug, Clone)]
pub struct CapturedPhoto {
    /// Platform-encoded JPEG bytes, in sensor orientation
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub flash_fired: bool,
}

/// Completion callback for photo capture (may run on any thread)
pub type PhotoCompletion = Box<dyn FnOnce(BackendResult<CapturedPhoto>) + Send>;

/// Completion callback for recording stop (may run on any thread)
pub type RecordingCompletion = Box<dyn FnOnce(BackendResult<PathBuf>) + Send>;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Camera device not found
    DeviceNotFound(String),
    /// Session refused an input
    InputRejected(String),
    /// Session refused an output
    OutputRejected(String),
    /// No session exists
    NoSession,
    /// Session is not running
    NotRunning,
    /// Capability not supported by the hardware
    Unsupported(String),
    /// Hardware or driver failure
    Hardware(String),
    /// Movie recorder failure
    Recorder(String),
    /// General I/O error
    IoError(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::InputRejected(msg) => write!(f, "Input rejected: {}", msg),
            BackendError::OutputRejected(msg) => write!(f, "Output rejected: {}", msg),
            BackendError::NoSession => write!(f, "No capture session"),
            BackendError::NotRunning => write!(f, "Capture session not running"),
            BackendError::Unsupported(msg) => write!(f, "Not supported: {}", msg),
            BackendError::Hardware(msg) => write!(f, "Hardware error: {}", msg),
            BackendError::Recorder(msg) => write!(f, "Recorder error: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_rgb_bytes_strips_stride() {
        // 2x2 RGBA frame with 2 bytes of padding per row
        let data: Vec<u8> = vec![
            255, 0, 0, 255, 0, 255, 0, 255, 0, 0, //
            0, 0, 255, 255, 255, 255, 255, 255, 0, 0,
        ];
        let frame = CameraFrame {
            width: 2,
            height: 2,
            data: Arc::from(data),
            format: PixelFormat::RGBA,
            stride: 10,
            captured_at: Instant::now(),
        };

        let rgb = frame.to_rgb_bytes();
        assert_eq!(rgb.len(), 12);
        assert_eq!(&rgb[0..3], &[255, 0, 0]);
        assert_eq!(&rgb[9..12], &[255, 255, 255]);
    }

    #[test]
    fn test_luma_of_gray_and_rgba() {
        let gray = CameraFrame::new(2, 1, PixelFormat::Gray8, vec![10, 200]);
        assert_eq!(gray.luma(1, 0), 200);

        let rgba = CameraFrame::new(1, 1, PixelFormat::RGBA, vec![255, 255, 255, 255]);
        assert_eq!(rgba.luma(0, 0), 255);
    }

    #[test]
    fn test_flip_position() {
        assert_eq!(CameraPosition::Back.flipped(), CameraPosition::Front);
        assert_eq!(CameraPosition::Front.flipped(), CameraPosition::Back);
        assert_eq!(CameraPosition::from_location("rear"), CameraPosition::Back);
    }

    #[test]
    fn test_frame_sink_keeps_latest_only() {
        let sink = FrameSink::new();
        let rx = sink.subscribe();
        sink.deliver(CameraFrame::new(1, 1, PixelFormat::Gray8, vec![1]));
        sink.deliver(CameraFrame::new(1, 1, PixelFormat::Gray8, vec![2]));
        let latest = rx.borrow().clone().unwrap();
        assert_eq!(latest.data[0], 2);
    }
}
