// SPDX-License-Identifier: GPL-3.0-only

//! Recording state machine
//!
//! ```text
//! Idle ──start──▶ Starting ──wired──▶ Recording ──stop──▶ Stopping ──finalized──▶ Idle
//!                    │                                                  ▲
//!                    └──────────────── failed / timed out ──────────────┘
//! ```
//!
//! Only one recording can exist at a time. A start while anything other
//! than `Idle` is rejected; a stop is only accepted in `Recording`.

use crate::backends::{CameraBackend, SessionPreset};
use crate::constants::VideoQuality;
use crate::errors::{CameraError, CameraResult};
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

/// A recording in progress
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRecording {
    /// Movie file being written
    pub path: PathBuf,
    pub with_audio: bool,
    /// Preset to restore when recording ends
    pub previous_preset: SessionPreset,
    /// Session generation the recording belongs to
    pub generation: u64,
    pub started_at: Instant,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RecordingPhase {
    #[default]
    Idle,
    Starting,
    Recording(ActiveRecording),
    Stopping(ActiveRecording),
}

/// Recording state owned by the session queue
#[derive(Debug, Default)]
pub struct RecordingState {
    phase: RecordingPhase,
}

impl RecordingState {
    pub fn phase(&self) -> &RecordingPhase {
        &self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == RecordingPhase::Idle
    }

    /// Idle → Starting
    pub fn begin_start(&mut self) -> CameraResult<()> {
        match self.phase {
            RecordingPhase::Idle => {
                self.phase = RecordingPhase::Starting;
                Ok(())
            }
            _ => Err(CameraError::RecordingAlreadyInProgress),
        }
    }

    /// Starting → Recording
    pub fn started(&mut self, active: ActiveRecording) {
        debug!(path = %active.path.display(), "Recording phase: recording");
        self.phase = RecordingPhase::Recording(active);
    }

    /// Starting → Idle
    pub fn abandon_start(&mut self) {
        if self.phase == RecordingPhase::Starting {
            self.phase = RecordingPhase::Idle;
        }
    }

    /// Recording → Stopping
    pub fn begin_stop(&mut self) -> CameraResult<ActiveRecording> {
        match std::mem::take(&mut self.phase) {
            RecordingPhase::Recording(active) => {
                self.phase = RecordingPhase::Stopping(active.clone());
                Ok(active)
            }
            other => {
                self.phase = other;
                Err(CameraError::NoRecordingInProgress)
            }
        }
    }

    /// Stopping → Idle; returns the finished recording if it was this one
    pub fn finish(&mut self, generation: u64) -> Option<ActiveRecording> {
        match &self.phase {
            RecordingPhase::Stopping(active) if active.generation == generation => {
                let active = active.clone();
                self.phase = RecordingPhase::Idle;
                Some(active)
            }
            _ => None,
        }
    }

    /// Drop whatever is in flight (session teardown)
    pub fn reset(&mut self) -> Option<ActiveRecording> {
        match std::mem::take(&mut self.phase) {
            RecordingPhase::Recording(active) | RecordingPhase::Stopping(active) => Some(active),
            RecordingPhase::Idle | RecordingPhase::Starting => None,
        }
    }
}

/// First preset of the quality ladder the hardware supports
pub fn negotiate_preset(backend: &dyn CameraBackend, quality: VideoQuality) -> Option<SessionPreset> {
    quality
        .preset_ladder()
        .iter()
        .copied()
        .find(|preset| backend.supports_preset(*preset))
}
