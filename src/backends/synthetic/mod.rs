// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic camera stack
//!
//! An in-process camera platform with several simulated devices. It obeys
//! the same rules a native capture session does (transactions, rejected
//! outputs, asynchronous photo and recorder completions, platform-initiated
//! interruptions) and exposes a [`SyntheticHandle`] so hosts and tests can
//! push frames, inject faults and observe the session graph.

mod pattern;

pub use pattern::{PATTERN_HEIGHT, PATTERN_WIDTH, pattern_frame};

use super::frame_loop::{FrameLoopController, LoopAction};
use super::still::encode_still;
use super::types::*;
use super::CameraBackend;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Injected failures
#[derive(Debug, Default)]
struct Faults {
    reject_input: bool,
    reject_outputs: HashSet<OutputKind>,
    reject_audio_input: bool,
    photo_error: Option<String>,
    recorder_error: Option<String>,
}

/// Observations about the session graph
#[derive(Debug, Default)]
struct Stats {
    /// Camera input count at every committed transaction
    committed_input_counts: Vec<usize>,
    last_ramp_rate: Option<f64>,
    torch_level: Option<f32>,
    preset_history: Vec<SessionPreset>,
}

/// State shared between the backend and its handles
struct Shared {
    devices: Mutex<Vec<DeviceDescriptor>>,
    has_microphone: AtomicBool,
    running_tx: watch::Sender<bool>,
    /// The session asked to run (interruptions do not clear this)
    wants_running: AtomicBool,
    sink: Mutex<Option<FrameSink>>,
    frame_ticks: AtomicUsize,
    sessions_created: AtomicUsize,
    active_input: Mutex<Option<String>>,
    audio_attached: AtomicBool,
    outputs: Mutex<HashSet<OutputKind>>,
    faults: Mutex<Faults>,
    stats: Mutex<Stats>,
    photo_latency: Mutex<Duration>,
    recorder_latency: Mutex<Duration>,
    frame_interval: Mutex<Option<Duration>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    fn is_running(&self) -> bool {
        *self.running_tx.borrow()
    }

    fn set_running(&self, running: bool) {
        self.running_tx.send_replace(running);
    }

    fn deliver(&self, frame: CameraFrame) -> bool {
        if !self.is_running() {
            return false;
        }
        match lock(&self.sink).as_ref() {
            Some(sink) => {
                sink.deliver(frame);
                true
            }
            None => false,
        }
    }
}

/// The default simulated device set
pub fn default_devices() -> Vec<DeviceDescriptor> {
    let device = |id: &str,
                  name: &str,
                  position: CameraPosition,
                  device_type: DeviceType,
                  flash: bool,
                  max_zoom: f64| {
        DeviceDescriptor {
            id: id.to_string(),
            name: name.to_string(),
            position,
            device_type,
            has_flash: flash,
            has_torch: flash,
            continuous_torch: flash,
            min_zoom: 1.0,
            max_zoom,
            sensor_orientation: if position == CameraPosition::Front {
                SensorRotation::Rotate270
            } else {
                SensorRotation::Rotate90
            },
            is_active: false,
        }
    };

    vec![
        device(
            "synthetic:back-wide",
            "Back Camera",
            CameraPosition::Back,
            DeviceType::WideAngle,
            true,
            16.0,
        ),
        device(
            "synthetic:back-ultrawide",
            "Back Ultra Wide Camera",
            CameraPosition::Back,
            DeviceType::UltraWide,
            false,
            4.0,
        ),
        device(
            "synthetic:back-triple",
            "Back Triple Camera",
            CameraPosition::Back,
            DeviceType::TripleCamera,
            true,
            123.75,
        ),
        device(
            "synthetic:front",
            "Front Camera",
            CameraPosition::Front,
            DeviceType::WideAngle,
            false,
            4.0,
        ),
    ]
}

/// In-flight movie file
struct ActiveMovie {
    path: PathBuf,
    started: Instant,
    with_audio: bool,
}

/// Session graph while a session exists
struct Graph {
    input: Vec<DeviceDescriptor>,
    preset: SessionPreset,
    zoom: f64,
    in_transaction: bool,
    movie: Option<ActiveMovie>,
}

/// Synthetic camera backend
pub struct SyntheticBackend {
    shared: Arc<Shared>,
    graph: Option<Graph>,
    frame_loop: Option<FrameLoopController>,
}

impl SyntheticBackend {
    /// Create a backend with the default device set
    pub fn new() -> Self {
        Self::with_devices(default_devices())
    }

    pub fn with_devices(devices: Vec<DeviceDescriptor>) -> Self {
        let (running_tx, _) = watch::channel(false);
        let shared = Shared {
            devices: Mutex::new(devices),
            has_microphone: AtomicBool::new(true),
            running_tx,
            wants_running: AtomicBool::new(false),
            sink: Mutex::new(None),
            frame_ticks: AtomicUsize::new(0),
            sessions_created: AtomicUsize::new(0),
            active_input: Mutex::new(None),
            audio_attached: AtomicBool::new(false),
            outputs: Mutex::new(HashSet::new()),
            faults: Mutex::new(Faults::default()),
            stats: Mutex::new(Stats::default()),
            photo_latency: Mutex::new(Duration::from_millis(10)),
            recorder_latency: Mutex::new(Duration::from_millis(10)),
            frame_interval: Mutex::new(None),
        };
        Self {
            shared: Arc::new(shared),
            graph: None,
            frame_loop: None,
        }
    }

    /// Handle for pushing frames, injecting faults and inspecting the graph
    pub fn handle(&self) -> SyntheticHandle {
        SyntheticHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn graph(&mut self) -> BackendResult<&mut Graph> {
        self.graph.as_mut().ok_or(BackendError::NoSession)
    }

    fn record_commit(&self) {
        let count = self.graph.as_ref().map(|g| g.input.len()).unwrap_or(0);
        lock(&self.shared.stats).committed_input_counts.push(count);
    }

    fn current_device(&self) -> Option<&DeviceDescriptor> {
        self.graph.as_ref().and_then(|g| g.input.first())
    }

    fn start_frame_loop(&mut self) {
        let Some(interval) = *lock(&self.shared.frame_interval) else {
            return;
        };
        let shared = Arc::clone(&self.shared);
        self.frame_loop = Some(FrameLoopController::start(
            "synthetic-frames",
            interval,
            move |_| {
                if !shared.wants_running.load(Ordering::SeqCst) {
                    return LoopAction::Stop;
                }
                let tick = shared.frame_ticks.fetch_add(1, Ordering::Relaxed) as u64;
                shared.deliver(pattern_frame(PATTERN_WIDTH, PATTERN_HEIGHT, tick));
                LoopAction::Continue
            },
        ));
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for SyntheticBackend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Synthetic
    }

    fn enumerate_devices(&self) -> Vec<DeviceDescriptor> {
        lock(&self.shared.devices).clone()
    }

    fn has_microphone(&self) -> bool {
        self.shared.has_microphone.load(Ordering::SeqCst)
    }

    fn create_session(&mut self) -> BackendResult<()> {
        if self.graph.is_some() {
            return Ok(());
        }
        self.shared.sessions_created.fetch_add(1, Ordering::SeqCst);
        self.graph = Some(Graph {
            input: Vec::new(),
            preset: SessionPreset::Photo,
            zoom: 1.0,
            in_transaction: false,
            movie: None,
        });
        info!("Synthetic capture session created");
        Ok(())
    }

    fn destroy_session(&mut self) {
        self.stop_running();
        if let Some(graph) = self.graph.take()
            && let Some(movie) = graph.movie
        {
            debug!(path = %movie.path.display(), "Dropping unfinished synthetic movie");
        }
        *lock(&self.shared.active_input) = None;
        lock(&self.shared.outputs).clear();
        self.shared.audio_attached.store(false, Ordering::SeqCst);
        lock(&self.shared.stats).torch_level = None;
        info!("Synthetic capture session destroyed");
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
        self.record_commit();
        Ok(())
    }

    fn add_input(&mut self, device: &DeviceDescriptor) -> BackendResult<()> {
        if lock(&self.shared.faults).reject_input {
            return Err(BackendError::InputRejected(device.id.clone()));
        }
        let graph = self.graph()?;
        graph.input.push(device.clone());
        graph.zoom = device.min_zoom.max(1.0);
        let outside_transaction = !graph.in_transaction;
        *lock(&self.shared.active_input) = Some(device.id.clone());
        if outside_transaction {
            self.record_commit();
        }
        Ok(())
    }

    fn remove_input(&mut self, device_id: &str) {
        let Some(graph) = self.graph.as_mut() else {
            return;
        };
        graph.input.retain(|d| d.id != device_id);
        let outside_transaction = !graph.in_transaction;
        let next = graph.input.first().map(|d| d.id.clone());
        *lock(&self.shared.active_input) = next;
        if outside_transaction {
            self.record_commit();
        }
    }

    fn add_audio_input(&mut self) -> BackendResult<()> {
        self.graph()?;
        if !self.has_microphone() {
            return Err(BackendError::DeviceNotFound("microphone".to_string()));
        }
        if lock(&self.shared.faults).reject_audio_input {
            return Err(BackendError::InputRejected("microphone".to_string()));
        }
        self.shared.audio_attached.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn remove_audio_input(&mut self) {
        self.shared.audio_attached.store(false, Ordering::SeqCst);
    }

    fn add_output(&mut self, kind: OutputKind) -> BackendResult<()> {
        self.graph()?;
        if lock(&self.shared.faults).reject_outputs.contains(&kind) {
            return Err(BackendError::OutputRejected(kind.name().to_string()));
        }
        lock(&self.shared.outputs).insert(kind);
        Ok(())
    }

    fn remove_output(&mut self, kind: OutputKind) {
        lock(&self.shared.outputs).remove(&kind);
    }

    fn has_output(&self, kind: OutputKind) -> bool {
        lock(&self.shared.outputs).contains(&kind)
    }

    fn session_preset(&self) -> SessionPreset {
        self.graph
            .as_ref()
            .map(|g| g.preset)
            .unwrap_or(SessionPreset::Photo)
    }

    fn supports_preset(&self, preset: SessionPreset) -> bool {
        preset != SessionPreset::Hd3840x2160
    }

    fn set_session_preset(&mut self, preset: SessionPreset) -> BackendResult<()> {
        if !self.supports_preset(preset) {
            return Err(BackendError::Unsupported(format!("preset {:?}", preset)));
        }
        self.graph()?.preset = preset;
        lock(&self.shared.stats).preset_history.push(preset);
        Ok(())
    }

    fn start_running(&mut self, sink: FrameSink) -> BackendResult<()> {
        self.graph()?;
        if self.has_output(OutputKind::Metadata) {
            // Mirrors hardware that wedges when metadata is armed before start
            return Err(BackendError::Hardware(
                "session start wedged: metadata output armed before start".to_string(),
            ));
        }
        *lock(&self.shared.sink) = Some(sink);
        self.shared.wants_running.store(true, Ordering::SeqCst);
        self.shared.set_running(true);
        if self.frame_loop.is_none() {
            self.start_frame_loop();
        }
        debug!("Synthetic session running");
        Ok(())
    }

    fn stop_running(&mut self) {
        self.shared.wants_running.store(false, Ordering::SeqCst);
        self.shared.set_running(false);
        if let Some(mut frame_loop) = self.frame_loop.take() {
            frame_loop.stop();
        }
        *lock(&self.shared.sink) = None;
    }

    fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    fn running_state(&self) -> watch::Receiver<bool> {
        self.shared.running_tx.subscribe()
    }

    fn set_zoom(&mut self, factor: f64, ramp_rate: Option<f64>) -> BackendResult<()> {
        let graph = self.graph()?;
        if graph.input.is_empty() {
            return Err(BackendError::NoSession);
        }
        graph.zoom = factor;
        lock(&self.shared.stats).last_ramp_rate = ramp_rate;
        Ok(())
    }

    fn zoom(&self) -> f64 {
        self.graph.as_ref().map(|g| g.zoom).unwrap_or(1.0)
    }

    fn supported_flash_modes(&self) -> Vec<FlashMode> {
        match self.current_device() {
            Some(device) if device.has_flash && self.has_output(OutputKind::Photo) => {
                vec![FlashMode::Off, FlashMode::On, FlashMode::Auto]
            }
            _ => vec![FlashMode::Off],
        }
    }

    fn set_torch(&mut self, level: Option<f32>) -> BackendResult<()> {
        let device = self
            .current_device()
            .ok_or(BackendError::NoSession)?
            .clone();
        if !device.has_torch {
            return Err(BackendError::Unsupported("torch".to_string()));
        }
        let applied = level.map(|l| {
            if device.continuous_torch {
                l.clamp(0.0, 1.0)
            } else {
                1.0
            }
        });
        lock(&self.shared.stats).torch_level = applied;
        Ok(())
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
        if !self.has_output(OutputKind::Photo) {
            done(Err(BackendError::OutputRejected("photo output missing".to_string())));
            return;
        }

        let shared = Arc::clone(&self.shared);
        let latency = *lock(&shared.photo_latency);
        let fault = lock(&shared.faults).photo_error.take();
        let source = lock(&shared.sink).as_ref().and_then(|sink| sink.latest());

        std::thread::spawn(move || {
            std::thread::sleep(latency);
            if let Some(msg) = fault {
                done(Err(BackendError::Hardware(msg)));
                return;
            }
            let frame = match source {
                Some(frame) => (*frame).clone(),
                None => pattern_frame(PATTERN_WIDTH, PATTERN_HEIGHT, 0),
            };
            let result = encode_still(&frame).map(|jpeg| CapturedPhoto {
                jpeg,
                width: frame.width,
                height: frame.height,
                flash_fired: settings.flash == FlashMode::On,
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
        let with_audio = self.shared.audio_attached.load(Ordering::SeqCst);
        let graph = self.graph()?;
        if graph.movie.is_some() {
            return Err(BackendError::Recorder("recorder busy".to_string()));
        }

        let mut file = std::fs::File::create(path)?;
        writeln!(file, "synthetic-movie preset={:?} audio={}", graph.preset, with_audio)?;
        graph.movie = Some(ActiveMovie {
            path: path.to_path_buf(),
            started: Instant::now(),
            with_audio,
        });
        info!(path = %path.display(), with_audio, "Synthetic recording started");
        Ok(())
    }

    fn stop_recording(&mut self, done: RecordingCompletion) {
        let movie = self.graph.as_mut().and_then(|g| g.movie.take());
        let Some(movie) = movie else {
            done(Err(BackendError::Recorder("recorder is idle".to_string())));
            return;
        };

        let latency = *lock(&self.shared.recorder_latency);
        let fault = lock(&self.shared.faults).recorder_error.take();

        std::thread::spawn(move || {
            std::thread::sleep(latency);
            if let Some(msg) = fault {
                done(Err(BackendError::Recorder(msg)));
                return;
            }
            let finalize = std::fs::OpenOptions::new()
                .append(true)
                .open(&movie.path)
                .and_then(|mut file| {
                    writeln!(
                        file,
                        "duration_ms={} audio={}",
                        movie.started.elapsed().as_millis(),
                        movie.with_audio
                    )
                });
            match finalize {
                Ok(()) => done(Ok(movie.path)),
                Err(e) => {
                    warn!(error = %e, "Failed to finalize synthetic movie");
                    done(Err(BackendError::Recorder(e.to_string())));
                }
            }
        });
    }
}

/// Control and inspection handle for a [`SyntheticBackend`]
#[derive(Clone)]
pub struct SyntheticHandle {
    shared: Arc<Shared>,
}

impl SyntheticHandle {
    /// Deliver a frame as if the sensor produced it; ignored while not running
    pub fn push_frame(&self, frame: CameraFrame) -> bool {
        self.shared.deliver(frame)
    }

    /// Generate pattern frames automatically at this interval while running
    pub fn set_frame_interval(&self, interval: Option<Duration>) {
        *lock(&self.shared.frame_interval) = interval;
    }

    /// Platform-initiated stop (e.g. audio route change)
    pub fn interrupt(&self) {
        info!("Synthetic session interrupted");
        self.shared.set_running(false);
    }

    /// End an interruption; no-op if the session no longer wants to run
    pub fn resume(&self) {
        if self.shared.wants_running.load(Ordering::SeqCst) {
            info!("Synthetic session resumed");
            self.shared.set_running(true);
        }
    }

    /// Interrupt now and resume after `duration` on a background thread
    pub fn interrupt_for(&self, duration: Duration) {
        self.interrupt();
        let handle = self.clone();
        std::thread::spawn(move || {
            std::thread::sleep(duration);
            handle.resume();
        });
    }

    pub fn set_devices(&self, devices: Vec<DeviceDescriptor>) {
        *lock(&self.shared.devices) = devices;
    }

    pub fn set_microphone(&self, present: bool) {
        self.shared.has_microphone.store(present, Ordering::SeqCst);
    }

    pub fn reject_input(&self, reject: bool) {
        lock(&self.shared.faults).reject_input = reject;
    }

    pub fn reject_output(&self, kind: OutputKind) {
        lock(&self.shared.faults).reject_outputs.insert(kind);
    }

    pub fn reject_audio_input(&self, reject: bool) {
        lock(&self.shared.faults).reject_audio_input = reject;
    }

    /// Fail the next photo capture with this hardware error
    pub fn fail_next_photo(&self, msg: &str) {
        lock(&self.shared.faults).photo_error = Some(msg.to_string());
    }

    /// Fail the next recorder finalization with this error
    pub fn fail_next_recording(&self, msg: &str) {
        lock(&self.shared.faults).recorder_error = Some(msg.to_string());
    }

    pub fn set_photo_latency(&self, latency: Duration) {
        *lock(&self.shared.photo_latency) = latency;
    }

    pub fn set_recorder_latency(&self, latency: Duration) {
        *lock(&self.shared.recorder_latency) = latency;
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn sessions_created(&self) -> usize {
        self.shared.sessions_created.load(Ordering::SeqCst)
    }

    /// Camera input count observed at every committed configuration
    pub fn committed_input_counts(&self) -> Vec<usize> {
        lock(&self.shared.stats).committed_input_counts.clone()
    }

    pub fn active_input(&self) -> Option<String> {
        lock(&self.shared.active_input).clone()
    }

    pub fn audio_attached(&self) -> bool {
        self.shared.audio_attached.load(Ordering::SeqCst)
    }

    pub fn has_output(&self, kind: OutputKind) -> bool {
        lock(&self.shared.outputs).contains(&kind)
    }

    pub fn last_ramp_rate(&self) -> Option<f64> {
        lock(&self.shared.stats).last_ramp_rate
    }

    pub fn torch_level(&self) -> Option<f32> {
        lock(&self.shared.stats).torch_level
    }

    /// Every preset the session was switched to, in order
    pub fn preset_history(&self) -> Vec<SessionPreset> {
        lock(&self.shared.stats).preset_history.clone()
    }
}
