// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer/PipeWire camera backend
//!
//! The session graph is bookkeeping over two pipelines: a preview pipeline
//! that runs while the session runs, and a movie pipeline that exists only
//! while a recording is in flight. Input changes made inside a
//! configuration transaction restart the preview on commit.
//!
//! Cameras are fixed-focal-length on this platform, so zoom is pinned at
//! 1.0. Torch and flash drive the sysfs LEDs found at start-up.

mod enumeration;
mod pipeline;
mod recorder;

use super::CameraBackend;
use super::still::encode_still;
use super::torch::{self, SYSFS_LEDS, TorchLed};
use super::types::*;
use gstreamer as gst;
use pipeline::PreviewPipeline;
use recorder::MovieRecorder;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Time the LEDs stay lit before the frame is grabbed for a flash shot
const FLASH_SETTLE: Duration = Duration::from_millis(150);

/// Presets the preview pipeline can negotiate
const SUPPORTED_PRESETS: &[SessionPreset] = &[
    SessionPreset::Hd1920x1080,
    SessionPreset::Hd1280x720,
    SessionPreset::Vga640x480,
    SessionPreset::Photo,
];

/// Session graph while a session exists
struct Graph {
    input: Option<DeviceDescriptor>,
    outputs: HashSet<OutputKind>,
    audio: bool,
    preset: SessionPreset,
    in_transaction: bool,
    /// Input changed inside the open transaction
    input_dirty: bool,
    recorder: Option<MovieRecorder>,
}

/// Camera backend on top of PipeWire via GStreamer
pub struct GStreamerBackend {
    leds: Vec<TorchLed>,
    running: Arc<watch::Sender<bool>>,
    graph: Option<Graph>,
    preview: Option<PreviewPipeline>,
    sink: Option<FrameSink>,
    torch_level: Option<f32>,
}

impl GStreamerBackend {
    pub fn new() -> BackendResult<Self> {
        gst::init().map_err(|e| BackendError::Hardware(format!("GStreamer init failed: {}", e)))?;
        let leds = TorchLed::discover(Path::new(SYSFS_LEDS));
        info!(leds = leds.len(), "GStreamer backend initialized");
        let (running, _) = watch::channel(false);
        Ok(Self {
            leds,
            running: Arc::new(running),
            graph: None,
            preview: None,
            sink: None,
            torch_level: None,
        })
    }

    fn graph(&mut self) -> BackendResult<&mut Graph> {
        self.graph.as_mut().ok_or(BackendError::NoSession)
    }

    fn current_device(&self) -> Option<&DeviceDescriptor> {
        self.graph.as_ref().and_then(|g| g.input.as_ref())
    }

    fn start_preview(&mut self) -> BackendResult<()> {
        let (Some(device), Some(sink)) = (self.current_device().cloned(), self.sink.clone()) else {
            return Err(BackendError::NoSession);
        };
        let preview = PreviewPipeline::start(&device, sink, Arc::clone(&self.running))?;
        self.preview = Some(preview);
        self.running.send_replace(true);
        Ok(())
    }

    fn stop_preview(&mut self) {
        if let Some(preview) = self.preview.take() {
            preview.stop();
        }
        self.running.send_replace(false);
    }

    fn switch_torch(&mut self, level: Option<f32>) -> BackendResult<()> {
        torch::apply(&self.leds, level)?;
        self.torch_level = level;
        Ok(())
    }
}

impl CameraBackend for GStreamerBackend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::GStreamer
    }

    fn enumerate_devices(&self) -> Vec<DeviceDescriptor> {
        let continuous = self.leds.iter().any(|led| led.is_continuous());
        enumeration::enumerate_cameras(!self.leds.is_empty(), continuous)
    }

    fn has_microphone(&self) -> bool {
        enumeration::has_microphone()
    }

    fn create_session(&mut self) -> BackendResult<()> {
        if self.graph.is_none() {
            self.graph = Some(Graph {
                input: None,
                outputs: HashSet::new(),
                audio: false,
                preset: SessionPreset::Photo,
                in_transaction: false,
                input_dirty: false,
                recorder: None,
            });
            info!("Capture session created");
        }
        Ok(())
    }

    fn destroy_session(&mut self) {
        self.stop_running();
        if self.torch_level.is_some()
            && let Err(e) = self.switch_torch(None)
        {
            warn!(error = %e, "Failed to switch torch off");
        }
        if let Some(graph) = self.graph.take()
            && graph.recorder.is_some()
        {
            debug!("Dropping unfinished recording");
        }
        info!("Capture session destroyed");
    }

    fn has_session(&self) -> bool {
        self.graph.is_some()
    }

    fn begin_configuration(&mut self) {
        if let Some(graph) = self.graph.as_mut() {
            graph.in_transaction = true;
        }
    }

    fn commit_configuration(&mut self) -> BackendResult<()> {
        let graph = self.graph()?;
        graph.in_transaction = false;
        let restart = std::mem::take(&mut graph.input_dirty) && self.preview.is_some();
        if restart {
            debug!("Input changed, restarting preview");
            if self.current_device().is_none() {
                self.stop_preview();
                return Ok(());
            }
            // Running state stays true across the swap
            if let Some(preview) = self.preview.take() {
                preview.stop();
            }
            if let Err(e) = self.start_preview() {
                self.running.send_replace(false);
                return Err(e);
            }
        }
        Ok(())
    }

    fn add_input(&mut self, device: &DeviceDescriptor) -> BackendResult<()> {
        let graph = self.graph()?;
        if graph.input.is_some() {
            return Err(BackendError::InputRejected(format!(
                "{}: session already has a camera input",
                device.id
            )));
        }
        graph.input = Some(device.clone());
        graph.input_dirty = true;
        if !graph.in_transaction {
            self.commit_configuration()?;
        }
        Ok(())
    }

    fn remove_input(&mut self, device_id: &str) {
        let Some(graph) = self.graph.as_mut() else {
            return;
        };
        if graph.input.as_ref().is_some_and(|d| d.id == device_id) {
            graph.input = None;
            graph.input_dirty = true;
            if !graph.in_transaction && self.preview.is_some() {
                self.stop_preview();
            }
        }
    }

    fn add_audio_input(&mut self) -> BackendResult<()> {
        self.graph()?;
        if !self.has_microphone() {
            return Err(BackendError::DeviceNotFound("microphone".to_string()));
        }
        self.graph()?.audio = true;
        Ok(())
    }

    fn remove_audio_input(&mut self) {
        if let Some(graph) = self.graph.as_mut() {
            graph.audio = false;
        }
    }

    fn add_output(&mut self, kind: OutputKind) -> BackendResult<()> {
        self.graph()?.outputs.insert(kind);
        Ok(())
    }

    fn remove_output(&mut self, kind: OutputKind) {
        if let Some(graph) = self.graph.as_mut() {
            graph.outputs.remove(&kind);
        }
    }

    fn has_output(&self, kind: OutputKind) -> bool {
        self.graph
            .as_ref()
            .is_some_and(|g| g.outputs.contains(&kind))
    }

    fn session_preset(&self) -> SessionPreset {
        self.graph
            .as_ref()
            .map(|g| g.preset)
            .unwrap_or(SessionPreset::Photo)
    }

    fn supports_preset(&self, preset: SessionPreset) -> bool {
        SUPPORTED_PRESETS.contains(&preset)
    }

    fn set_session_preset(&mut self, preset: SessionPreset) -> BackendResult<()> {
        if !self.supports_preset(preset) {
            return Err(BackendError::Unsupported(format!("preset {:?}", preset)));
        }
        self.graph()?.preset = preset;
        Ok(())
    }

    fn start_running(&mut self, sink: FrameSink) -> BackendResult<()> {
        self.graph()?;
        self.sink = Some(sink);
        if self.preview.is_none() {
            self.start_preview()?;
        } else {
            self.running.send_replace(true);
        }
        Ok(())
    }

    fn stop_running(&mut self) {
        self.stop_preview();
        self.sink = None;
    }

    fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    fn running_state(&self) -> watch::Receiver<bool> {
        self.running.subscribe()
    }

    fn set_zoom(&mut self, factor: f64, _ramp_rate: Option<f64>) -> BackendResult<()> {
        if self.current_device().is_none() {
            return Err(BackendError::NoSession);
        }
        if (factor - 1.0).abs() > f64::EPSILON {
            return Err(BackendError::Unsupported(format!("zoom {:.2}x", factor)));
        }
        Ok(())
    }

    fn zoom(&self) -> f64 {
        1.0
    }

    fn supported_flash_modes(&self) -> Vec<FlashMode> {
        match self.current_device() {
            Some(device) if device.has_flash && self.has_output(OutputKind::Photo) => {
                vec![FlashMode::Off, FlashMode::On]
            }
            _ => vec![FlashMode::Off],
        }
    }

    fn set_torch(&mut self, level: Option<f32>) -> BackendResult<()> {
        let device = self.current_device().ok_or(BackendError::NoSession)?;
        if !device.has_torch || self.leds.is_empty() {
            return Err(BackendError::Unsupported("torch".to_string()));
        }
        self.switch_torch(level)
    }

    fn capture_photo(&mut self, settings: PhotoSettings, done: PhotoCompletion) {
        if self.graph.is_none() {
            done(Err(BackendError::NoSession));
            return;
        }
        if !self.is_running() {
            done(Err(BackendError::NotRunning));
            return;
        }
        let Some(sink) = self.sink.clone() else {
            done(Err(BackendError::NotRunning));
            return;
        };
        if !self.has_output(OutputKind::Photo) {
            done(Err(BackendError::OutputRejected("photo output missing".to_string())));
            return;
        }

        let flash = settings.flash == FlashMode::On && !self.leds.is_empty();
        let leds = self.leds.clone();
        let restore = self.torch_level;

        std::thread::spawn(move || {
            if flash {
                if let Err(e) = torch::apply(&leds, Some(1.0)) {
                    warn!(error = %e, "Flash failed to fire");
                }
                std::thread::sleep(FLASH_SETTLE);
            }
            let frame = sink.latest();
            if flash && let Err(e) = torch::apply(&leds, restore) {
                warn!(error = %e, "Failed to restore torch after flash");
            }

            let Some(frame) = frame else {
                done(Err(BackendError::Hardware("no frame available".to_string())));
                return;
            };
            let result = encode_still(&frame).map(|jpeg| CapturedPhoto {
                jpeg,
                width: frame.width,
                height: frame.height,
                flash_fired: flash,
            });
            done(result);
        });
    }

    fn start_recording(&mut self, path: &Path) -> BackendResult<()> {
        if !self.is_running() {
            return Err(BackendError::NotRunning);
        }
        if !self.has_output(OutputKind::Movie) {
            return Err(BackendError::OutputRejected("movie output missing".to_string()));
        }
        let graph = self.graph()?;
        if graph.recorder.is_some() {
            return Err(BackendError::Recorder("recorder busy".to_string()));
        }
        let device_id = graph
            .input
            .as_ref()
            .map(|d| d.id.clone())
            .ok_or(BackendError::NoSession)?;
        let recorder = MovieRecorder::start(&device_id, graph.preset, graph.audio, path)?;
        graph.recorder = Some(recorder);
        info!(path = %path.display(), "Recording started");
        Ok(())
    }

    fn stop_recording(&mut self, done: RecordingCompletion) {
        match self.graph.as_mut().and_then(|g| g.recorder.take()) {
            Some(recorder) => recorder.finish(done),
            None => done(Err(BackendError::Recorder("recorder is idle".to_string()))),
        }
    }
}
