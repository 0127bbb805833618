// SPDX-License-Identifier: GPL-3.0-only

//! Preview pipeline: pipewiresrc to an RGBA appsink feeding the frame sink

use super::super::types::*;
use super::enumeration::source_target;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Timeout for the pipeline to reach PLAYING or NULL
const STATE_TIMEOUT_SECS: u64 = 5;

/// Frames between performance log lines
const FRAME_LOG_INTERVAL: u64 = 300;

/// Running preview pipeline for one camera
pub struct PreviewPipeline {
    pipeline: gst::Pipeline,
    appsink: AppSink,
    stop_signal: Arc<AtomicBool>,
    bus_thread: Option<JoinHandle<()>>,
}

impl PreviewPipeline {
    /// Build and start the pipeline; frames are delivered to `sink`
    ///
    /// A pipeline error reported on the bus flips `running` to false, which
    /// the session treats as a platform interruption.
    pub fn start(
        device: &DeviceDescriptor,
        sink: FrameSink,
        running: Arc<watch::Sender<bool>>,
    ) -> BackendResult<Self> {
        let launch = format!(
            "pipewiresrc {}do-timestamp=true ! \
             queue max-size-buffers=2 leaky=downstream ! \
             decodebin ! videoconvert ! video/x-raw,format=RGBA ! \
             appsink name=sink max-buffers=2 drop=true sync=false",
            source_target(&device.id)
        );
        info!(device = %device.id, pipeline = %launch, "Creating preview pipeline");

        let pipeline = gst::parse::launch(&launch)
            .map_err(|e| BackendError::Hardware(format!("Failed to parse pipeline: {}", e)))?
            .dynamic_cast::<gst::Pipeline>()
            .map_err(|_| BackendError::Hardware("Failed to cast to pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| BackendError::Hardware("Failed to get appsink".to_string()))?
            .dynamic_cast::<AppSink>()
            .map_err(|_| BackendError::Hardware("Failed to cast appsink".to_string()))?;
        appsink.set_property("enable-last-sample", false);

        let frame_counter = Arc::new(AtomicU64::new(0));
        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let frame_start = Instant::now();
                    let frame_num = frame_counter.fetch_add(1, Ordering::Relaxed);

                    let sample = appsink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                    if buffer.flags().contains(gst::BufferFlags::CORRUPTED) {
                        if frame_num % 30 == 0 {
                            warn!(frame = frame_num, "Buffer marked as corrupted, skipping frame");
                        }
                        return Ok(gst::FlowSuccess::Ok);
                    }
                    let caps = sample.caps().ok_or(gst::FlowError::Error)?;
                    let video_info =
                        VideoInfo::from_caps(caps).map_err(|_| gst::FlowError::Error)?;
                    let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;

                    sink.deliver(CameraFrame {
                        width: video_info.width(),
                        height: video_info.height(),
                        data: Arc::from(map.as_slice()),
                        format: PixelFormat::RGBA,
                        stride: video_info.stride()[0] as u32,
                        captured_at: frame_start,
                    });

                    if frame_num % FRAME_LOG_INTERVAL == 0 {
                        debug!(
                            frame = frame_num,
                            width = video_info.width(),
                            height = video_info.height(),
                            copy_us = frame_start.elapsed().as_micros(),
                            "Preview frame"
                        );
                    }
                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        pipeline.set_state(gst::State::Playing).map_err(|e| {
            BackendError::Hardware(format!("Failed to start pipeline: {}", e))
        })?;
        let (result, state, pending) =
            pipeline.state(gst::ClockTime::from_seconds(STATE_TIMEOUT_SECS));
        debug!(?result, ?state, ?pending, "Preview pipeline state");
        let accepted = (result.is_ok() && state == gst::State::Playing)
            || (matches!(result, Ok(gst::StateChangeSuccess::Async))
                && pending == gst::State::Playing);
        if !accepted {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(BackendError::Hardware(format!(
                "Pipeline failed to start (state: {:?}, result: {:?})",
                state, result
            )));
        }

        let stop_signal = Arc::new(AtomicBool::new(false));
        let bus_thread = Self::watch_bus(&pipeline, Arc::clone(&stop_signal), running);

        info!(device = %device.id, "Preview pipeline running");
        Ok(Self {
            pipeline,
            appsink,
            stop_signal,
            bus_thread,
        })
    }

    /// Report pipeline errors as interruptions
    fn watch_bus(
        pipeline: &gst::Pipeline,
        stop: Arc<AtomicBool>,
        running: Arc<watch::Sender<bool>>,
    ) -> Option<JoinHandle<()>> {
        let bus = pipeline.bus()?;
        let spawned = std::thread::Builder::new()
            .name("preview-bus".to_string())
            .spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    let Some(msg) = bus.timed_pop_filtered(
                        gst::ClockTime::from_mseconds(200),
                        &[gst::MessageType::Error, gst::MessageType::Eos],
                    ) else {
                        continue;
                    };
                    match msg.view() {
                        gst::MessageView::Error(err) => {
                            error!(
                                error = %err.error(),
                                debug = ?err.debug(),
                                source = ?err.src().map(|s| s.name()),
                                "Preview pipeline error"
                            );
                        }
                        _ => warn!("Preview pipeline reached end of stream"),
                    }
                    running.send_replace(false);
                    break;
                }
            });
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "Failed to spawn preview bus watcher");
                None
            }
        }
    }

    /// Stop the pipeline and release the camera
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            debug!(error = %e, "Pipeline state change had issues");
        }
        let _ = self
            .pipeline
            .state(gst::ClockTime::from_seconds(STATE_TIMEOUT_SECS));
        if let Some(handle) = self.bus_thread.take()
            && handle.join().is_err()
        {
            warn!("Preview bus watcher panicked");
        }
        info!("Preview pipeline stopped");
    }
}

impl Drop for PreviewPipeline {
    fn drop(&mut self) {
        if self.bus_thread.is_some() {
            self.shutdown();
        }
    }
}
