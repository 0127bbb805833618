// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the camera session
//!
//! Every public operation either resolves with a value or rejects with a
//! [`CameraError`]. Each variant carries a human-readable message through
//! `Display` and a stable [`ErrorCode`] that bridges forward to callers.

use crate::backends::BackendError;
use crate::permissions::PermissionKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type alias using CameraError
pub type CameraResult<T> = Result<T, CameraError>;

/// Camera session error taxonomy
#[derive(Debug, Clone, PartialEq)]
pub enum CameraError {
    /// No camera device matched the request
    DeviceUnavailable(String),
    /// The session exists but its hardware pipeline is not running
    SessionNotRunning,
    /// No session has been started
    SessionNotInitialized,
    /// The platform refused to add the camera input
    InputRejected(String),
    /// The platform refused to add an output stage
    OutputRejected(String),
    /// A platform configuration call failed
    ConfigurationFailed(String),
    /// The host view cannot host a preview surface
    RenderTargetUnavailable(String),
    /// The requested flash mode is not supported by the device or output
    UnsupportedFlashMode(String),
    /// The active device has no torch
    TorchUnavailable,
    /// Requested zoom factor lies outside the supported range
    ZoomOutOfRange { requested: f64, min: f64, max: f64 },
    /// A recording is already starting, running or stopping
    RecordingAlreadyInProgress,
    /// There is no recording to stop
    NoRecordingInProgress,
    /// No microphone device exists
    AudioDeviceUnavailable,
    /// The platform refused to add the microphone input
    AudioInputRejected(String),
    /// The underlying recorder failed (message propagated verbatim)
    RecorderError(String),
    /// No preview frame is available to sample
    FrameCaptureError(String),
    /// Photo output failed to produce or encode an image
    PhotoOutputError(String),
    /// The user denied a required permission
    PermissionDenied(PermissionKind),
    /// Temp file creation or write failed
    Storage(String),
    /// The session queue has shut down
    QueueClosed,
}

/// Stable machine-readable error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    DeviceUnavailable,
    SessionNotRunning,
    SessionNotInitialized,
    InputRejected,
    OutputRejected,
    ConfigurationFailed,
    RenderTargetUnavailable,
    UnsupportedFlashMode,
    TorchUnavailable,
    ZoomOutOfRange,
    RecordingAlreadyInProgress,
    NoRecordingInProgress,
    AudioDeviceUnavailable,
    AudioInputRejected,
    RecorderError,
    FrameCaptureError,
    PhotoOutputError,
    PermissionDenied,
    Storage,
    QueueClosed,
}

impl CameraError {
    /// Machine-readable code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            CameraError::DeviceUnavailable(_) => ErrorCode::DeviceUnavailable,
            CameraError::SessionNotRunning => ErrorCode::SessionNotRunning,
            CameraError::SessionNotInitialized => ErrorCode::SessionNotInitialized,
            CameraError::InputRejected(_) => ErrorCode::InputRejected,
            CameraError::OutputRejected(_) => ErrorCode::OutputRejected,
            CameraError::ConfigurationFailed(_) => ErrorCode::ConfigurationFailed,
            CameraError::RenderTargetUnavailable(_) => ErrorCode::RenderTargetUnavailable,
            CameraError::UnsupportedFlashMode(_) => ErrorCode::UnsupportedFlashMode,
            CameraError::TorchUnavailable => ErrorCode::TorchUnavailable,
            CameraError::ZoomOutOfRange { .. } => ErrorCode::ZoomOutOfRange,
            CameraError::RecordingAlreadyInProgress => ErrorCode::RecordingAlreadyInProgress,
            CameraError::NoRecordingInProgress => ErrorCode::NoRecordingInProgress,
            CameraError::AudioDeviceUnavailable => ErrorCode::AudioDeviceUnavailable,
            CameraError::AudioInputRejected(_) => ErrorCode::AudioInputRejected,
            CameraError::RecorderError(_) => ErrorCode::RecorderError,
            CameraError::FrameCaptureError(_) => ErrorCode::FrameCaptureError,
            CameraError::PhotoOutputError(_) => ErrorCode::PhotoOutputError,
            CameraError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            CameraError::Storage(_) => ErrorCode::Storage,
            CameraError::QueueClosed => ErrorCode::QueueClosed,
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::DeviceUnavailable(msg) => write!(f, "Camera device unavailable: {}", msg),
            CameraError::SessionNotRunning => write!(f, "Camera session is not running"),
            CameraError::SessionNotInitialized => write!(f, "Camera session is not initialized"),
            CameraError::InputRejected(msg) => {
                write!(f, "Session rejected the camera input: {}", msg)
            }
            CameraError::OutputRejected(msg) => write!(f, "Session rejected the output: {}", msg),
            CameraError::ConfigurationFailed(msg) => {
                write!(f, "Session configuration failed: {}", msg)
            }
            CameraError::RenderTargetUnavailable(msg) => {
                write!(f, "Preview cannot be attached to the host view: {}", msg)
            }
            CameraError::UnsupportedFlashMode(mode) => {
                write!(f, "Flash mode '{}' is not supported by this device", mode)
            }
            CameraError::TorchUnavailable => write!(f, "Torch is not available on this device"),
            CameraError::ZoomOutOfRange { requested, min, max } => write!(
                f,
                "Zoom factor {} is out of range ({} - {})",
                requested, min, max
            ),
            CameraError::RecordingAlreadyInProgress => write!(f, "Recording already in progress"),
            CameraError::NoRecordingInProgress => write!(f, "No recording in progress"),
            CameraError::AudioDeviceUnavailable => write!(f, "No microphone device available"),
            CameraError::AudioInputRejected(msg) => {
                write!(f, "Session rejected the microphone input: {}", msg)
            }
            CameraError::RecorderError(msg) => write!(f, "{}", msg),
            CameraError::FrameCaptureError(msg) => write!(f, "Frame capture failed: {}", msg),
            CameraError::PhotoOutputError(msg) => write!(f, "Photo capture failed: {}", msg),
            CameraError::PermissionDenied(kind) => {
                write!(f, "{} permission was denied", kind.display_name())
            }
            CameraError::Storage(msg) => write!(f, "Storage error: {}", msg),
            CameraError::QueueClosed => write!(f, "Camera session queue has shut down"),
        }
    }
}

impl std::error::Error for CameraError {}

impl From<BackendError> for CameraError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::DeviceNotFound(msg) => CameraError::DeviceUnavailable(msg),
            BackendError::InputRejected(msg) => CameraError::InputRejected(msg),
            BackendError::OutputRejected(msg) => CameraError::OutputRejected(msg),
            BackendError::NotRunning => CameraError::SessionNotRunning,
            BackendError::NoSession => CameraError::SessionNotInitialized,
            BackendError::Unsupported(msg) | BackendError::Hardware(msg) => {
                CameraError::ConfigurationFailed(msg)
            }
            BackendError::Recorder(msg) => CameraError::RecorderError(msg),
            BackendError::IoError(msg) => CameraError::Storage(msg),
        }
    }
}

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        CameraError::Storage(err.to_string())
    }
}
