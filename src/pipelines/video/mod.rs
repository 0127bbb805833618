// SPDX-License-Identifier: GPL-3.0-only

//! Video recording pipeline
//!
//! Recording runs against the live session without interrupting preview.
//! The session preset is raised for the requested quality while recording
//! and restored afterwards; the microphone is only attached for recordings
//! that asked for audio.

pub mod recording;

pub use recording::{ActiveRecording, RecordingPhase, RecordingState, negotiate_preset};
