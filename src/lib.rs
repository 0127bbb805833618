// SPDX-License-Identifier: GPL-3.0-only

//! Camera Session - lifecycle manager for a device camera
//!
//! This library owns one camera session on behalf of a host UI: it wires
//! inputs and outputs, keeps the preview attached to a render target, and
//! runs the photo, recording and barcode pipelines against the live session.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`session`]: Public manager, session queue and device policy
//! - [`backends`]: Camera backend abstraction (synthetic, GStreamer)
//! - [`pipelines`]: Photo, video and detection pipelines
//! - [`render`]: Preview host abstraction
//! - [`storage`]: Temp-file registry
//! - [`permissions`]: Camera and microphone permission gate
//! - [`config`]: Session configuration and runtime settings
//!
//! # Example
//!
//! ```ignore
//! // Typically driven by a host UI, or from the command line:
//! // camera-session photo --output shot.jpg
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod permissions;
pub mod pipelines;
pub mod render;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use backends::{CameraPosition, DeviceDescriptor, DeviceType, FlashMode, TorchState, ZoomFactors};
pub use config::{SessionConfiguration, Settings};
pub use constants::VideoQuality;
pub use errors::{CameraError, CameraResult, ErrorCode};
pub use pipelines::detection::{BarcodeEvent, BarcodeFormat};
pub use pipelines::photo::{CapturedImage, ImagePayload};
pub use session::{LoggingDelegate, SessionDelegate, SessionManager, SessionManagerBuilder};
