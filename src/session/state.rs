// SPDX-License-Identifier: GPL-3.0-only

//! Queue-owned session state
//!
//! [`SessionCore`] is only ever touched from the session queue thread. It
//! holds the backend, the active device, request- and session-scoped
//! controls and the recording state machine, and it enforces the wiring
//! rules: exactly one camera input, metadata armed only after the session
//! runs, and every input change inside one configuration transaction.

use super::SessionDelegate;
use super::device_selection::{best_multi_lens, resolve_device, select_for_position};
use super::queue::QueueHandle;
use crate::backends::{
    BackendError, BackendResult, CameraBackend, CameraFrame, CapturedPhoto, DeviceDescriptor,
    FlashMode, FrameSink, OutputKind, PhotoSettings, SensorRotation, SessionPreset, TorchState,
    ZoomFactors,
};
use crate::config::{SessionConfiguration, Settings};
use crate::constants::{MAX_ZOOM_CAP, VideoQuality, ZOOM_RAMP_RATE};
use crate::errors::{CameraError, CameraResult};
use crate::pipelines::detection::{
    BarcodeScanner, DetectionContext, DetectionSettings, spawn_detection,
};
use crate::pipelines::photo::orientation::capture_rotation;
use crate::pipelines::video::{ActiveRecording, RecordingPhase, RecordingState, negotiate_preset};
use crate::render::RenderTarget;
use crate::storage::{TempFileKind, TempFileRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Collaborators the core is built from
pub(crate) struct CoreDeps {
    pub backend: Box<dyn CameraBackend>,
    pub settings: Settings,
    pub runtime: Handle,
    pub queue: QueueHandle,
    pub generation: Arc<AtomicU64>,
    pub registry: Arc<TempFileRegistry>,
    pub delegate: Arc<dyn SessionDelegate>,
    pub scanner: Arc<dyn BarcodeScanner>,
}

/// A photo the hardware is working on
pub(crate) struct PhotoJob {
    pub completion: oneshot::Receiver<BackendResult<CapturedPhoto>>,
    pub rotation: SensorRotation,
    pub generation: u64,
}

/// A live frame picked for a sample capture
pub(crate) struct SampleJob {
    pub frame: Arc<CameraFrame>,
    pub rotation: SensorRotation,
    pub generation: u64,
}

/// Outcome of one recording start attempt
pub(crate) enum StartAttempt {
    Started,
    /// The session is interrupted; wait on this for it to run again
    NotRunning(watch::Receiver<bool>),
}

pub(crate) struct SessionCore {
    backend: Box<dyn CameraBackend>,
    settings: Settings,
    runtime: Handle,
    queue: QueueHandle,
    generation: Arc<AtomicU64>,
    registry: Arc<TempFileRegistry>,
    delegate: Arc<dyn SessionDelegate>,
    scanner: Arc<dyn BarcodeScanner>,
    frames: FrameSink,
    active: watch::Sender<Option<DeviceDescriptor>>,
    config: Option<SessionConfiguration>,
    target: Option<Arc<dyn RenderTarget>>,
    flash_mode: FlashMode,
    torch: TorchState,
    recording: RecordingState,
    detection: Option<JoinHandle<()>>,
    /// Stopped by a background transition, to be resumed on foreground
    paused: bool,
}

fn same_target(a: &Arc<dyn RenderTarget>, b: &Arc<dyn RenderTarget>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Usable zoom range of a device
pub(crate) fn zoom_range(device: &DeviceDescriptor) -> (f64, f64) {
    (device.min_zoom, device.max_zoom.min(MAX_ZOOM_CAP))
}

impl SessionCore {
    pub(crate) fn new(deps: CoreDeps) -> Self {
        let (active, _) = watch::channel(None);
        Self {
            backend: deps.backend,
            settings: deps.settings,
            runtime: deps.runtime,
            queue: deps.queue,
            generation: deps.generation,
            registry: deps.registry,
            delegate: deps.delegate,
            scanner: deps.scanner,
            frames: FrameSink::new(),
            active,
            config: None,
            target: None,
            flash_mode: FlashMode::Off,
            torch: TorchState::default(),
            recording: RecordingState::default(),
            detection: None,
            paused: false,
        }
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub(crate) fn has_session(&self) -> bool {
        self.backend.has_session()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.backend.has_session() && self.backend.is_running()
    }

    pub(crate) fn active_device(&self) -> Option<DeviceDescriptor> {
        self.active.borrow().clone()
    }

    /// Device bound to the live session
    fn bound_device(&self) -> CameraResult<DeviceDescriptor> {
        if !self.backend.has_session() {
            return Err(CameraError::SessionNotInitialized);
        }
        self.active_device().ok_or(CameraError::SessionNotInitialized)
    }

    fn display_rotation(&self) -> u32 {
        self.target
            .as_ref()
            .map(|t| t.display_rotation())
            .unwrap_or(0)
    }

    // ===== Start / stop =====

    pub(crate) fn start(
        &mut self,
        config: SessionConfiguration,
        target: Arc<dyn RenderTarget>,
    ) -> CameraResult<()> {
        let fresh = !self.backend.has_session();
        let result = self.start_inner(&config, &target, fresh);
        match &result {
            Ok(()) => {
                self.config = Some(config);
                if self
                    .config
                    .as_ref()
                    .is_some_and(|c| c.use_triple_camera_if_available)
                {
                    self.spawn_lens_upgrade();
                }
            }
            Err(e) => {
                warn!(error = %e, fresh, "Session start failed");
                if fresh {
                    self.stop();
                }
            }
        }
        result
    }

    fn start_inner(
        &mut self,
        config: &SessionConfiguration,
        target: &Arc<dyn RenderTarget>,
        fresh: bool,
    ) -> CameraResult<()> {
        let devices = self.backend.enumerate_devices();
        let device = resolve_device(&devices, config)?;

        if fresh {
            self.backend.create_session()?;
            info!(backend = %self.backend.backend_type(), "Capture session created");
        } else {
            debug!("Reusing existing capture session");
        }

        self.switch_device(&device)?;

        for kind in [OutputKind::Photo, OutputKind::FrameSample] {
            if !self.backend.has_output(kind) {
                self.backend.add_output(kind)?;
            }
        }

        if let Some(factor) = config.initial_zoom_factor {
            let (min, max) = zoom_range(&device);
            if (min..=max).contains(&factor) {
                if let Err(e) = self.backend.set_zoom(factor, None) {
                    warn!(error = %e, factor, "Failed to apply initial zoom");
                }
            } else {
                warn!(factor, min, max, "Initial zoom out of range, ignoring");
            }
        }

        self.attach_target(target)?;

        if !self.backend.is_running() {
            // Metadata must not be armed while the pipeline starts
            let had_metadata = self.backend.has_output(OutputKind::Metadata);
            if had_metadata {
                self.backend.remove_output(OutputKind::Metadata);
            }
            self.backend.start_running(self.frames.clone())?;
            if had_metadata && !config.enable_barcode_detection {
                debug!("Dropping metadata output from previous configuration");
            }
        }
        self.paused = false;
        info!(device = %device.id, position = %device.position, "Camera session running");

        if config.enable_barcode_detection {
            self.arm_detection(config)?;
        } else {
            self.disarm_detection();
        }
        Ok(())
    }

    fn attach_target(&mut self, target: &Arc<dyn RenderTarget>) -> CameraResult<()> {
        if let Some(current) = &self.target {
            if same_target(current, target) {
                return Ok(());
            }
            current.detach_preview();
            current.set_transparent(false);
            self.target = None;
        }
        target
            .attach_preview(self.frames.subscribe())
            .map_err(CameraError::RenderTargetUnavailable)?;
        target.set_transparent(true);
        self.target = Some(Arc::clone(target));
        Ok(())
    }

    /// Tear the session down; no-op when there is none
    pub(crate) fn stop(&mut self) {
        if !self.backend.has_session() && self.target.is_none() {
            return;
        }
        let ended = self.generation.fetch_add(1, Ordering::SeqCst);
        info!(generation = ended, "Stopping camera session");

        self.disarm_detection();
        self.abort_recording();

        if self.torch.enabled
            && let Err(e) = self.backend.set_torch(None)
        {
            debug!(error = %e, "Failed to switch torch off during stop");
        }
        self.torch = TorchState::default();

        if self.backend.has_session() {
            self.backend.stop_running();
            self.backend.begin_configuration();
            for kind in [
                OutputKind::Metadata,
                OutputKind::Movie,
                OutputKind::FrameSample,
                OutputKind::Photo,
            ] {
                self.backend.remove_output(kind);
            }
            self.backend.remove_audio_input();
            if let Some(device) = self.active_device() {
                self.backend.remove_input(&device.id);
            }
            if let Err(e) = self.backend.commit_configuration() {
                debug!(error = %e, "Teardown commit failed");
            }
            self.backend.destroy_session();
        }

        self.active.send_replace(None);
        self.frames.clear();

        if let Some(target) = self.target.take() {
            target.detach_preview();
            target.set_transparent(false);
            target.hide_blur_overlay();
        }

        self.config = None;
        self.flash_mode = FlashMode::Off;
        self.paused = false;
        self.registry.cleanup_session_files(ended);
    }

    fn abort_recording(&mut self) {
        let was_recording = matches!(self.recording.phase(), RecordingPhase::Recording(_));
        let Some(active) = self.recording.reset() else {
            return;
        };
        if !was_recording {
            // Already finalizing; its completion finds the session gone
            return;
        }
        warn!(path = %active.path.display(), "Aborting recording for session stop");
        let registry = Arc::clone(&self.registry);
        self.backend.stop_recording(Box::new(move |result| {
            if let Err(e) = &result {
                debug!(error = %e, "Aborted recording finished with error");
            }
            registry.discard(&active.path);
        }));
    }

    // ===== Devices =====

    pub(crate) fn available_devices(&self) -> Vec<DeviceDescriptor> {
        let active_id = self.active_device().map(|d| d.id);
        self.backend
            .enumerate_devices()
            .into_iter()
            .map(|mut d| {
                d.is_active = active_id.as_deref() == Some(d.id.as_str());
                d
            })
            .collect()
    }

    /// Swap the single camera input inside one configuration transaction
    fn swap_input(&mut self, next: &DeviceDescriptor) -> CameraResult<()> {
        let previous = self.active_device();
        if previous.as_ref().is_some_and(|d| d.id == next.id) {
            return Ok(());
        }

        self.backend.begin_configuration();
        if let Some(prev) = &previous {
            self.backend.remove_input(&prev.id);
        }
        if let Err(e) = self.backend.add_input(next) {
            if let Some(prev) = &previous
                && let Err(restore) = self.backend.add_input(prev)
            {
                error!(device = %prev.id, error = %restore, "Failed to restore previous input");
            }
            if let Err(commit) = self.backend.commit_configuration() {
                warn!(error = %commit, "Rollback commit failed");
            }
            return Err(e.into());
        }
        self.backend.commit_configuration()?;

        let mut bound = next.clone();
        bound.is_active = true;
        self.active.send_replace(Some(bound));
        info!(device = %next.id, name = %next.name, "Camera input bound");
        Ok(())
    }

    /// Bind `next`, resetting controls that do not carry over
    fn switch_device(&mut self, next: &DeviceDescriptor) -> CameraResult<()> {
        if self
            .active_device()
            .is_some_and(|current| current.id == next.id)
        {
            return Ok(());
        }
        if self.torch.enabled {
            if let Err(e) = self.backend.set_torch(None) {
                debug!(error = %e, "Failed to switch torch off before device change");
            }
            self.torch = TorchState::default();
        }
        self.swap_input(next)?;
        if !next.has_flash && self.flash_mode != FlashMode::Off {
            debug!(device = %next.id, "Device has no flash, resetting flash mode");
            self.flash_mode = FlashMode::Off;
        }
        Ok(())
    }

    pub(crate) fn flip(&mut self) -> CameraResult<DeviceDescriptor> {
        let current = self.bound_device()?;
        let position = current.position.flipped();
        let preferred = self
            .config
            .as_ref()
            .map(|c| c.preferred_device_types.clone())
            .unwrap_or_default();
        let devices = self.backend.enumerate_devices();
        let next = select_for_position(&devices, position, &preferred)
            .ok_or_else(|| CameraError::DeviceUnavailable(format!("no {} camera", position)))?;

        self.switch_device(&next)?;
        info!(from = %current.id, to = %next.id, "Camera flipped");
        Ok(next)
    }

    // ===== Multi-lens upgrade =====

    fn spawn_lens_upgrade(&self) {
        let generation = self.generation();
        let counter = Arc::clone(&self.generation);
        let queue = self.queue.clone();
        let target = self.target.clone();
        let overlay = self.settings.upgrade_overlay();

        self.runtime.spawn(async move {
            let candidate = queue
                .call(move |core| core.upgrade_candidate(generation))
                .await;
            let Ok(Some(candidate)) = candidate else {
                debug!("No multi-lens device to upgrade to");
                return;
            };

            if let Some(target) = &target {
                target.show_blur_overlay();
            }
            match queue
                .call(move |core| core.apply_upgrade(generation, candidate))
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "Multi-lens upgrade failed, keeping device"),
                Err(e) => debug!(error = %e, "Multi-lens upgrade abandoned"),
            }

            tokio::time::sleep(overlay).await;
            if counter.load(Ordering::SeqCst) == generation
                && let Some(target) = &target
            {
                target.hide_blur_overlay();
            }
        });
    }

    fn upgrade_candidate(&self, generation: u64) -> Option<DeviceDescriptor> {
        if self.generation() != generation || !self.backend.has_session() {
            return None;
        }
        let current = self.active_device()?;
        best_multi_lens(&self.backend.enumerate_devices(), current.position)
            .filter(|candidate| candidate.id != current.id)
    }

    fn apply_upgrade(&mut self, generation: u64, candidate: DeviceDescriptor) -> CameraResult<()> {
        if self.generation() != generation || !self.backend.has_session() {
            debug!("Session changed before multi-lens upgrade, skipping");
            return Ok(());
        }
        let zoom_before = self.backend.zoom();
        self.switch_device(&candidate)?;

        let (min, max) = zoom_range(&candidate);
        if (min..=max).contains(&zoom_before) {
            if let Err(e) = self.backend.set_zoom(zoom_before, None) {
                debug!(error = %e, "Failed to carry zoom over to upgraded device");
            }
        }
        info!(device = %candidate.id, zoom = self.backend.zoom(), "Upgraded to multi-lens camera");
        Ok(())
    }

    // ===== Detection =====

    fn arm_detection(&mut self, config: &SessionConfiguration) -> CameraResult<()> {
        self.disarm_detection();
        let Some(target) = self.target.clone() else {
            return Err(CameraError::SessionNotInitialized);
        };
        self.backend.add_output(OutputKind::Metadata)?;

        let handle = spawn_detection(
            &self.runtime,
            self.frames.subscribe(),
            DetectionSettings {
                formats: config.barcode_types.clone(),
                interval: self.settings.detection_interval(),
            },
            DetectionContext {
                generation: Arc::clone(&self.generation),
                armed_generation: self.generation(),
                device: self.active.subscribe(),
                target,
                delegate: Arc::clone(&self.delegate),
                scanner: Arc::clone(&self.scanner),
            },
        );
        self.detection = Some(handle);
        Ok(())
    }

    fn disarm_detection(&mut self) {
        if let Some(handle) = self.detection.take() {
            handle.abort();
        }
        if self.backend.has_output(OutputKind::Metadata) {
            self.backend.remove_output(OutputKind::Metadata);
        }
    }

    // ===== Zoom =====

    pub(crate) fn zoom(&self) -> CameraResult<ZoomFactors> {
        let device = self.bound_device()?;
        let (min, max) = zoom_range(&device);
        Ok(ZoomFactors {
            min,
            max,
            current: self.backend.zoom(),
        })
    }

    pub(crate) fn set_zoom(&mut self, factor: f64, ramp: bool) -> CameraResult<()> {
        let device = self.bound_device()?;
        let (min, max) = zoom_range(&device);
        if !(min..=max).contains(&factor) {
            return Err(CameraError::ZoomOutOfRange {
                requested: factor,
                min,
                max,
            });
        }
        self.backend
            .set_zoom(factor, ramp.then_some(ZOOM_RAMP_RATE))?;
        debug!(factor, ramp, "Zoom set");
        Ok(())
    }

    // ===== Flash / torch =====

    pub(crate) fn flash_mode(&self) -> FlashMode {
        self.flash_mode
    }

    pub(crate) fn supported_flash_modes(&self) -> Vec<FlashMode> {
        let mut modes = self.backend.supported_flash_modes();
        if !modes.contains(&FlashMode::Off) {
            modes.insert(0, FlashMode::Off);
        }
        modes
    }

    pub(crate) fn set_flash_mode(&mut self, mode: FlashMode) -> CameraResult<()> {
        if mode != FlashMode::Off && !self.supported_flash_modes().contains(&mode) {
            return Err(CameraError::UnsupportedFlashMode(mode.to_string()));
        }
        self.flash_mode = mode;
        debug!(%mode, "Flash mode set");
        Ok(())
    }

    pub(crate) fn is_torch_available(&self) -> bool {
        self.backend.has_session() && self.active_device().is_some_and(|d| d.has_torch)
    }

    pub(crate) fn torch(&self) -> TorchState {
        self.torch
    }

    pub(crate) fn set_torch(&mut self, enabled: bool, level: Option<f32>) -> CameraResult<()> {
        let device = self
            .bound_device()
            .map_err(|_| CameraError::TorchUnavailable)?;
        if !device.has_torch {
            return Err(CameraError::TorchUnavailable);
        }

        let requested = level.unwrap_or(1.0).clamp(0.0, 1.0);
        let on = enabled && requested > 0.0;
        self.backend
            .set_torch(on.then_some(requested))
            .map_err(|e| match e {
                BackendError::Unsupported(_) => CameraError::TorchUnavailable,
                other => other.into(),
            })?;

        self.torch = if on {
            TorchState {
                enabled: true,
                level: if device.continuous_torch { requested } else { 1.0 },
            }
        } else {
            TorchState::default()
        };
        debug!(enabled = on, level = self.torch.level, "Torch set");
        Ok(())
    }

    // ===== Capture =====

    pub(crate) fn begin_photo(&mut self) -> CameraResult<PhotoJob> {
        let device = self.bound_device()?;
        if !self.backend.is_running() {
            return Err(CameraError::SessionNotRunning);
        }
        if !self.backend.has_output(OutputKind::Photo) {
            return Err(CameraError::PhotoOutputError(
                "photo output is not configured".to_string(),
            ));
        }

        let flash = if self.supported_flash_modes().contains(&self.flash_mode) {
            self.flash_mode
        } else {
            FlashMode::Off
        };
        let rotation = capture_rotation(
            device.position,
            device.sensor_orientation,
            self.display_rotation(),
        );

        let (tx, completion) = oneshot::channel();
        self.backend.capture_photo(
            PhotoSettings { flash },
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        debug!(%flash, %rotation, "Photo capture requested");
        Ok(PhotoJob {
            completion,
            rotation,
            generation: self.generation(),
        })
    }

    pub(crate) fn begin_sample(&self) -> CameraResult<SampleJob> {
        let device = self.bound_device()?;
        if !self.backend.is_running() {
            return Err(CameraError::SessionNotRunning);
        }
        let frame = self.frames.latest().ok_or_else(|| {
            CameraError::FrameCaptureError("no preview frame available".to_string())
        })?;
        Ok(SampleJob {
            frame,
            rotation: capture_rotation(
                device.position,
                device.sensor_orientation,
                self.display_rotation(),
            ),
            generation: self.generation(),
        })
    }

    // ===== Recording =====

    pub(crate) fn is_recording(&self) -> bool {
        !self.recording.is_idle()
    }

    /// Idle → Starting, before any permission prompt
    pub(crate) fn claim_recording(&mut self) -> CameraResult<()> {
        if !self.backend.has_session() {
            return Err(CameraError::SessionNotInitialized);
        }
        self.recording.begin_start()
    }

    pub(crate) fn abandon_recording(&mut self) {
        self.recording.abandon_start();
    }

    pub(crate) fn try_start_recording(
        &mut self,
        enable_audio: bool,
        quality: VideoQuality,
        final_attempt: bool,
    ) -> CameraResult<StartAttempt> {
        if *self.recording.phase() != RecordingPhase::Starting {
            // The session was stopped while we waited
            return Err(CameraError::SessionNotRunning);
        }
        if !self.backend.has_session() {
            self.recording.abandon_start();
            return Err(CameraError::SessionNotInitialized);
        }
        if !self.backend.is_running() {
            if final_attempt {
                self.recording.abandon_start();
                return Err(CameraError::SessionNotRunning);
            }
            return Ok(StartAttempt::NotRunning(self.backend.running_state()));
        }

        match self.wire_recording(enable_audio, quality) {
            Ok(active) => {
                info!(
                    path = %active.path.display(),
                    with_audio = active.with_audio,
                    quality = quality.display_name(),
                    "Recording started"
                );
                self.recording.started(active);
                Ok(StartAttempt::Started)
            }
            Err(e) => {
                warn!(error = %e, "Recording start failed");
                self.recording.abandon_start();
                Err(e)
            }
        }
    }

    fn wire_recording(
        &mut self,
        enable_audio: bool,
        quality: VideoQuality,
    ) -> CameraResult<ActiveRecording> {
        let previous_preset = self.backend.session_preset();
        let preset = negotiate_preset(self.backend.as_ref(), quality);
        if preset.is_none() {
            warn!(quality = quality.display_name(), "No supported preset, keeping current");
        }

        self.backend.begin_configuration();
        let wired = self.wire_recording_stages(enable_audio, preset);
        let committed = self.backend.commit_configuration();
        if let Err(e) = wired.and(committed.map_err(CameraError::from)) {
            self.unwire_recording(previous_preset);
            return Err(e);
        }

        let generation = self.generation();
        let path = self.registry.allocate(TempFileKind::Video, generation);
        self.registry.set_in_flight(&path, true);
        if let Err(e) = self.backend.start_recording(&path) {
            self.registry.discard(&path);
            self.unwire_recording(previous_preset);
            return Err(e.into());
        }

        Ok(ActiveRecording {
            path,
            with_audio: enable_audio,
            previous_preset,
            generation,
            started_at: std::time::Instant::now(),
        })
    }

    fn wire_recording_stages(
        &mut self,
        enable_audio: bool,
        preset: Option<SessionPreset>,
    ) -> CameraResult<()> {
        if let Some(preset) = preset
            && self.backend.session_preset() != preset
        {
            self.backend.set_session_preset(preset)?;
        }
        if enable_audio {
            if !self.backend.has_microphone() {
                return Err(CameraError::AudioDeviceUnavailable);
            }
            self.backend.add_audio_input().map_err(|e| match e {
                BackendError::DeviceNotFound(_) => CameraError::AudioDeviceUnavailable,
                other => CameraError::AudioInputRejected(other.to_string()),
            })?;
        }
        self.backend.add_output(OutputKind::Movie)?;
        Ok(())
    }

    /// Detach recording stages and restore the preset
    fn unwire_recording(&mut self, previous_preset: SessionPreset) {
        if !self.backend.has_session() {
            return;
        }
        self.backend.begin_configuration();
        self.backend.remove_output(OutputKind::Movie);
        self.backend.remove_audio_input();
        if self.backend.session_preset() != previous_preset
            && let Err(e) = self.backend.set_session_preset(previous_preset)
        {
            warn!(error = %e, ?previous_preset, "Failed to restore session preset");
        }
        if let Err(e) = self.backend.commit_configuration() {
            warn!(error = %e, "Failed to commit recording teardown");
        }
    }

    /// Recording → Stopping; the reply is sent once the recorder finalizes
    pub(crate) fn begin_stop_recording(&mut self, reply: oneshot::Sender<CameraResult<PathBuf>>) {
        let active = match self.recording.begin_stop() {
            Ok(active) => active,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };
        debug!(path = %active.path.display(), "Finalizing recording");

        let queue = self.queue.clone();
        let generation = active.generation;
        self.backend.stop_recording(Box::new(move |result| {
            // The recorder may call back from any thread; re-enter the queue
            let delivered =
                queue.submit(move |core| core.finish_recording(generation, result, reply));
            if !delivered {
                warn!("Recorder finished after the session queue shut down");
            }
        }));
    }

    fn finish_recording(
        &mut self,
        generation: u64,
        result: BackendResult<PathBuf>,
        reply: oneshot::Sender<CameraResult<PathBuf>>,
    ) {
        let Some(active) = self.recording.finish(generation) else {
            if let Ok(path) = &result {
                self.registry.discard(path);
            }
            let _ = reply.send(Err(CameraError::SessionNotRunning));
            return;
        };

        self.unwire_recording(active.previous_preset);
        self.registry.set_in_flight(&active.path, false);

        let outcome = match result {
            Ok(path) => {
                self.registry.mark_handed_off(&path);
                info!(
                    path = %path.display(),
                    duration_ms = active.started_at.elapsed().as_millis(),
                    "Recording finished"
                );
                Ok(path)
            }
            Err(e) => {
                warn!(error = %e, "Recorder failed to finalize");
                self.registry.discard(&active.path);
                Err(CameraError::from(e))
            }
        };
        let _ = reply.send(outcome);
    }

    // ===== App lifecycle =====

    pub(crate) fn pause(&mut self) {
        if self.is_running() {
            self.backend.stop_running();
            self.paused = true;
            info!("Camera session paused");
        }
    }

    /// Resume a paused session if it still has a render target
    pub(crate) fn resume(&mut self) -> CameraResult<bool> {
        if !self.paused {
            return Ok(false);
        }
        if !self.backend.has_session() || self.target.is_none() {
            self.paused = false;
            return Ok(false);
        }

        let rearm = self.backend.has_output(OutputKind::Metadata);
        if rearm {
            self.backend.remove_output(OutputKind::Metadata);
        }
        self.backend.start_running(self.frames.clone())?;
        self.paused = false;
        if rearm {
            self.backend.add_output(OutputKind::Metadata)?;
        }
        info!("Camera session resumed");
        Ok(true)
    }
}
