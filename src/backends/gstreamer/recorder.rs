// SPDX-License-Identifier: GPL-3.0-only

//! Movie recorder: a second pipewiresrc pipeline muxing H.264 (and AAC) into MP4

use super::super::types::*;
use super::enumeration::source_target;
use gstreamer as gst;
use gstreamer::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Frame size used when the session preset carries no dimensions
const FALLBACK_DIMENSIONS: (u32, u32) = (1280, 720);

/// How long finalization may wait for end-of-stream
const EOS_TIMEOUT_SECS: u64 = 5;

/// How long to watch for immediate start errors
const START_CHECK_MS: u64 = 500;

/// Build the launch description for one recording
fn launch_description(device_id: &str, preset: SessionPreset, with_audio: bool) -> String {
    let (width, height) = preset.dimensions().unwrap_or(FALLBACK_DIMENSIONS);
    let mut launch = format!(
        "pipewiresrc {}do-timestamp=true ! queue ! decodebin ! videoconvert ! videoscale ! \
         video/x-raw,width={},height={} ! \
         x264enc tune=zerolatency speed-preset=veryfast ! h264parse ! \
         mp4mux name=mux ! filesink name=out",
        source_target(device_id),
        width,
        height
    );
    if with_audio {
        launch.push_str(" pulsesrc ! queue ! audioconvert ! audioresample ! avenc_aac ! mux.");
    }
    launch
}

/// In-flight movie file
pub struct MovieRecorder {
    pipeline: gst::Pipeline,
    path: PathBuf,
}

impl MovieRecorder {
    /// Start writing `path` from the camera `device_id`
    pub fn start(
        device_id: &str,
        preset: SessionPreset,
        with_audio: bool,
        path: &Path,
    ) -> BackendResult<Self> {
        let launch = launch_description(device_id, preset, with_audio);
        info!(pipeline = %launch, path = %path.display(), "Creating recording pipeline");

        let pipeline = gst::parse::launch(&launch)
            .map_err(|e| BackendError::Recorder(format!("Failed to parse pipeline: {}", e)))?
            .dynamic_cast::<gst::Pipeline>()
            .map_err(|_| BackendError::Recorder("Failed to cast to pipeline".to_string()))?;
        let filesink = pipeline
            .by_name("out")
            .ok_or_else(|| BackendError::Recorder("Failed to get filesink".to_string()))?;
        filesink.set_property("location", path.to_string_lossy().to_string());

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| BackendError::Recorder(format!("Failed to start recording: {}", e)))?;

        // Check for immediate errors
        let bus = pipeline
            .bus()
            .ok_or_else(|| BackendError::Recorder("No bus available".to_string()))?;
        if let Some(msg) = bus.timed_pop_filtered(
            gst::ClockTime::from_mseconds(START_CHECK_MS),
            &[gst::MessageType::Error],
        ) && let gst::MessageView::Error(err) = msg.view()
        {
            error!(
                error = %err.error(),
                debug = ?err.debug(),
                source = ?err.src().map(|s| s.name()),
                "GStreamer error during recording start"
            );
            let _ = pipeline.set_state(gst::State::Null);
            return Err(BackendError::Recorder(err.error().to_string()));
        }

        Ok(Self {
            pipeline,
            path: path.to_path_buf(),
        })
    }

    /// Send EOS and finalize on a worker thread; `done` gets the file path
    pub fn finish(self, done: RecordingCompletion) {
        info!("Stopping video recording");
        if !self.pipeline.send_event(gst::event::Eos::new()) {
            warn!("Failed to send EOS event to pipeline");
        }

        std::thread::spawn(move || {
            let result = self.wait_for_eos();
            if let Err(e) = self.pipeline.set_state(gst::State::Null) {
                debug!(error = %e, "Recorder state change had issues");
            }
            match result {
                Ok(()) => {
                    info!(path = %self.path.display(), "Recording saved");
                    done(Ok(self.path.clone()));
                }
                Err(e) => done(Err(e)),
            }
        });
    }

    fn wait_for_eos(&self) -> BackendResult<()> {
        let bus = self
            .pipeline
            .bus()
            .ok_or_else(|| BackendError::Recorder("No bus available".to_string()))?;
        let msg = bus.timed_pop_filtered(
            gst::ClockTime::from_seconds(EOS_TIMEOUT_SECS),
            &[gst::MessageType::Eos, gst::MessageType::Error],
        );
        match msg.as_ref().map(|m| m.view()) {
            Some(gst::MessageView::Eos(_)) => Ok(()),
            Some(gst::MessageView::Error(err)) => {
                Err(BackendError::Recorder(err.error().to_string()))
            }
            _ => {
                warn!("Timed out waiting for end of stream, file may be truncated");
                Ok(())
            }
        }
    }
}

impl Drop for MovieRecorder {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}
