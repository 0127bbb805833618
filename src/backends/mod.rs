// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! A backend is the platform camera stack the session manager drives. It
//! exposes the capture-session primitives (configuration transactions,
//! input/output wiring, running state) and leaves all policy to the
//! session layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   SessionManager    │  ← Public async API
//! └──────────┬──────────┘
//!            │ session queue (one thread)
//!            ▼
//! ┌─────────────────────┐
//! │    SessionCore      │  ← Policy, state machine, invariants
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraBackend Trait │  ← Platform primitives
//! └──────────┬──────────┘
//!            │
//!       ┌────┴──────┐
//!       ▼           ▼
//! ┌──────────┐ ┌──────────┐
//! │Synthetic │ │GStreamer │
//! └──────────┘ └──────────┘
//! ```
//!
//! All methods are called from the session queue only, so implementations
//! never see two configuration calls at once. Completion callbacks may be
//! invoked from any thread.

pub mod frame_loop;
#[cfg(feature = "gstreamer")]
pub mod gstreamer;
pub mod still;
pub mod synthetic;
pub mod torch;
pub mod types;

pub use types::*;

use std::path::Path;
use tokio::sync::watch;

/// Platform capture-session primitives
pub trait CameraBackend: Send {
    // ===== Metadata =====

    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Enumerate cameras visible to the platform, independent of session state
    fn enumerate_devices(&self) -> Vec<DeviceDescriptor>;

    /// Whether a microphone device exists
    fn has_microphone(&self) -> bool;

    // ===== Session lifecycle =====

    /// Create the capture session object (no inputs, no outputs, not running)
    fn create_session(&mut self) -> BackendResult<()>;

    /// Tear the session down, releasing every input and output
    fn destroy_session(&mut self);

    fn has_session(&self) -> bool;

    /// Open a configuration transaction; changes apply atomically on commit
    fn begin_configuration(&mut self);

    /// Commit the open configuration transaction
    fn commit_configuration(&mut self) -> BackendResult<()>;

    // ===== Wiring =====

    /// Bind a camera as session input
    fn add_input(&mut self, device: &DeviceDescriptor) -> BackendResult<()>;

    /// Unbind the camera input with this id
    fn remove_input(&mut self, device_id: &str);

    /// Attach the default microphone
    fn add_audio_input(&mut self) -> BackendResult<()>;

    fn remove_audio_input(&mut self);

    fn add_output(&mut self, kind: OutputKind) -> BackendResult<()>;

    fn remove_output(&mut self, kind: OutputKind);

    fn has_output(&self, kind: OutputKind) -> bool;

    fn session_preset(&self) -> SessionPreset;

    fn supports_preset(&self, preset: SessionPreset) -> bool;

    fn set_session_preset(&mut self, preset: SessionPreset) -> BackendResult<()>;

    // ===== Running state =====

    /// Start the hardware pipeline; frames flow to `sink` while running
    fn start_running(&mut self, sink: FrameSink) -> BackendResult<()>;

    /// Stop the hardware pipeline without tearing the session down
    fn stop_running(&mut self);

    fn is_running(&self) -> bool;

    /// Running-state notifications, including platform-initiated interruptions
    fn running_state(&self) -> watch::Receiver<bool>;

    // ===== Device controls =====

    /// Set the zoom factor; `ramp_rate` requests a smooth transition
    fn set_zoom(&mut self, factor: f64, ramp_rate: Option<f64>) -> BackendResult<()>;

    fn zoom(&self) -> f64;

    /// Flash modes the photo output supports for the bound device
    fn supported_flash_modes(&self) -> Vec<FlashMode>;

    /// Set torch intensity, `None` turns it off
    fn set_torch(&mut self, level: Option<f32>) -> BackendResult<()>;

    // ===== Capture =====

    /// Take a still photo; `done` may run on any thread
    fn capture_photo(&mut self, settings: PhotoSettings, done: PhotoCompletion);

    /// Begin writing the movie output to `path`
    fn start_recording(&mut self, path: &Path) -> BackendResult<()>;

    /// Finalize the movie file; `done` may run on any thread
    fn stop_recording(&mut self, done: RecordingCompletion);
}

/// Create a backend of the given type
pub fn get_backend_for_type(backend_type: CameraBackendType) -> BackendResult<Box<dyn CameraBackend>> {
    match backend_type {
        CameraBackendType::Synthetic => Ok(Box::new(synthetic::SyntheticBackend::new())),
        #[cfg(feature = "gstreamer")]
        CameraBackendType::GStreamer => Ok(Box::new(gstreamer::GStreamerBackend::new()?)),
        #[cfg(not(feature = "gstreamer"))]
        CameraBackendType::GStreamer => Err(BackendError::Unsupported(
            "built without the gstreamer feature".to_string(),
        )),
    }
}
