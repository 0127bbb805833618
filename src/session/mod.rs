// SPDX-License-Identifier: GPL-3.0-only

//! Camera session manager
//!
//! [`SessionManager`] is the single entry point hosts talk to. Every
//! operation is async: configuration work is serialized onto the session
//! queue, while permission prompts, photo encoding and file writes run on
//! the async runtime and its blocking pool.
//!
//! # Example
//!
//! ```no_run
//! use camera_session::render::{HeadlessRenderTarget, Rect};
//! use camera_session::{SessionConfiguration, SessionManager};
//!
//! # async fn run() -> Result<(), camera_session::CameraError> {
//! let manager = SessionManager::builder().build()?;
//! let target = HeadlessRenderTarget::shared(Rect::new(0.0, 0.0, 390.0, 844.0));
//! manager.start(SessionConfiguration::default(), target).await?;
//! let photo = manager.capture(85, false).await?;
//! println!("{}x{}", photo.width, photo.height);
//! manager.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod device_selection;
mod queue;
mod state;

use self::queue::QueueHandle;
use self::state::{CoreDeps, SessionCore, StartAttempt};
use crate::backends::{
    BackendError, CameraBackend, DeviceDescriptor, FlashMode, TorchState, ZoomFactors,
    get_backend_for_type,
};
use crate::config::{SessionConfiguration, Settings};
use crate::constants::VideoQuality;
use crate::errors::{CameraError, CameraResult};
use crate::permissions::{
    self, MemoryPermissions, PermissionKind, PermissionProvider, PermissionStatus,
};
use crate::pipelines::detection::{BarcodeEvent, BarcodeScanner, RqrrScanner};
use crate::pipelines::photo::{self, CapturedImage, PhotoEncoder};
use crate::render::RenderTarget;
use crate::storage::{TempFileKind, TempFileRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Receives session events
pub trait SessionDelegate: Send + Sync {
    /// A barcode was decoded in the live preview
    fn barcode_detected(&self, event: BarcodeEvent);
}

/// Delegate that only logs events
pub struct LoggingDelegate;

impl SessionDelegate for LoggingDelegate {
    fn barcode_detected(&self, event: BarcodeEvent) {
        info!(value = %event.value, format = ?event.format, "barcodeDetected");
    }
}

impl SessionDelegate for mpsc::UnboundedSender<BarcodeEvent> {
    fn barcode_detected(&self, event: BarcodeEvent) {
        if self.send(event).is_err() {
            debug!("Barcode event receiver dropped");
        }
    }
}

/// Builder for [`SessionManager`]
#[derive(Default)]
pub struct SessionManagerBuilder {
    backend: Option<Box<dyn CameraBackend>>,
    settings: Option<Settings>,
    permissions: Option<Arc<dyn PermissionProvider>>,
    delegate: Option<Arc<dyn SessionDelegate>>,
    scanner: Option<Arc<dyn BarcodeScanner>>,
    temp_files: Option<Arc<TempFileRegistry>>,
}

impl SessionManagerBuilder {
    /// Camera backend; defaults to the one named in the settings
    pub fn backend(mut self, backend: Box<dyn CameraBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Permission provider; defaults to everything granted
    pub fn permissions(mut self, permissions: Arc<dyn PermissionProvider>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn delegate(mut self, delegate: Arc<dyn SessionDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn scanner(mut self, scanner: Arc<dyn BarcodeScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    /// Temp-file registry; defaults to the process-wide one
    pub fn temp_files(mut self, registry: Arc<TempFileRegistry>) -> Self {
        self.temp_files = Some(registry);
        self
    }

    /// Spawn the session queue; must be called inside a tokio runtime
    pub fn build(self) -> CameraResult<SessionManager> {
        let runtime = Handle::try_current().map_err(|e| {
            CameraError::ConfigurationFailed(format!("no async runtime available: {}", e))
        })?;
        let settings = self.settings.unwrap_or_default();
        let backend = match self.backend {
            Some(backend) => backend,
            None => get_backend_for_type(settings.backend)?,
        };
        let registry = self.temp_files.unwrap_or_else(|| match &settings.temp_dir {
            Some(dir) => Arc::new(TempFileRegistry::new(dir)),
            None => TempFileRegistry::global(),
        });
        let permissions = self
            .permissions
            .unwrap_or_else(|| Arc::new(MemoryPermissions::granted()));
        let generation = Arc::new(AtomicU64::new(0));

        info!(
            backend = %backend.backend_type(),
            temp_dir = %registry.dir().display(),
            "Creating camera session manager"
        );

        let (queue, rx) = QueueHandle::channel();
        let core = SessionCore::new(CoreDeps {
            backend,
            settings: settings.clone(),
            runtime,
            queue: queue.clone(),
            generation: Arc::clone(&generation),
            registry: Arc::clone(&registry),
            delegate: self.delegate.unwrap_or_else(|| Arc::new(LoggingDelegate)),
            scanner: self.scanner.unwrap_or_else(|| Arc::new(RqrrScanner::new())),
        });
        queue::spawn(core, rx).map_err(|e| {
            CameraError::ConfigurationFailed(format!("failed to spawn session queue: {}", e))
        })?;

        Ok(SessionManager {
            queue,
            generation,
            settings,
            permissions,
            registry,
        })
    }
}

/// Owns one camera session and exposes its operations
pub struct SessionManager {
    queue: QueueHandle,
    generation: Arc<AtomicU64>,
    settings: Settings,
    permissions: Arc<dyn PermissionProvider>,
    registry: Arc<TempFileRegistry>,
}

impl SessionManager {
    pub fn builder() -> SessionManagerBuilder {
        SessionManagerBuilder::default()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn temp_files(&self) -> &Arc<TempFileRegistry> {
        &self.registry
    }

    // ===== Lifecycle =====

    /// Start (or reconfigure) the session and attach the preview to `target`
    pub async fn start(
        &self,
        config: SessionConfiguration,
        target: Arc<dyn RenderTarget>,
    ) -> CameraResult<()> {
        if !permissions::ensure(self.permissions.as_ref(), PermissionKind::Camera).await {
            warn!("Camera permission denied");
            return Err(CameraError::PermissionDenied(PermissionKind::Camera));
        }
        info!(
            position = %config.position,
            device_id = ?config.device_id,
            detection = config.enable_barcode_detection,
            "Starting camera session"
        );
        self.queue.call(move |core| core.start(config, target)).await?
    }

    /// Stop the session and release everything; safe to repeat
    pub async fn stop(&self) -> CameraResult<()> {
        self.queue.call(|core| core.stop()).await
    }

    pub async fn is_running(&self) -> CameraResult<bool> {
        self.queue.call(|core| core.is_running()).await
    }

    // ===== Devices =====

    /// Every camera the platform lists, with the bound one marked active
    pub async fn get_available_devices(&self) -> CameraResult<Vec<DeviceDescriptor>> {
        self.queue.call(|core| core.available_devices()).await
    }

    pub async fn active_device(&self) -> CameraResult<Option<DeviceDescriptor>> {
        self.queue.call(|core| core.active_device()).await
    }

    /// Switch between front and back cameras
    pub async fn flip_camera(&self) -> CameraResult<DeviceDescriptor> {
        self.queue.call(|core| core.flip()).await?
    }

    // ===== Zoom =====

    pub async fn get_zoom(&self) -> CameraResult<ZoomFactors> {
        self.queue.call(|core| core.zoom()).await?
    }

    /// Set zoom, ramping smoothly when `ramp` is true
    pub async fn set_zoom(&self, factor: f64, ramp: bool) -> CameraResult<()> {
        self.queue.call(move |core| core.set_zoom(factor, ramp)).await?
    }

    // ===== Flash / torch =====

    pub async fn get_flash_mode(&self) -> CameraResult<FlashMode> {
        self.queue.call(|core| core.flash_mode()).await
    }

    pub async fn get_supported_flash_modes(&self) -> CameraResult<Vec<FlashMode>> {
        self.queue.call(|core| core.supported_flash_modes()).await
    }

    pub async fn set_flash_mode(&self, mode: FlashMode) -> CameraResult<()> {
        self.queue.call(move |core| core.set_flash_mode(mode)).await?
    }

    pub async fn is_torch_available(&self) -> CameraResult<bool> {
        self.queue.call(|core| core.is_torch_available()).await
    }

    pub async fn get_torch_mode(&self) -> CameraResult<TorchState> {
        self.queue.call(|core| core.torch()).await
    }

    /// Switch the torch; `level` defaults to full intensity
    pub async fn set_torch_mode(&self, enabled: bool, level: Option<f32>) -> CameraResult<()> {
        self.queue
            .call(move |core| core.set_torch(enabled, level))
            .await?
    }

    // ===== Capture =====

    /// Take a full-resolution photo, returned as JPEG bytes or a temp file
    pub async fn capture(&self, quality: u8, save_to_file: bool) -> CameraResult<CapturedImage> {
        let job = self.queue.call(|core| core.begin_photo()).await??;
        let captured = job
            .completion
            .await
            .map_err(|_| CameraError::PhotoOutputError("capture was abandoned".to_string()))?
            .map_err(photo_error)?;
        debug!(
            width = captured.width,
            height = captured.height,
            flash_fired = captured.flash_fired,
            "Photo received from output"
        );

        let encoder = PhotoEncoder::new(quality, self.settings.passthrough_quality_threshold);
        let encoded = encoder
            .encode_photo(captured, job.rotation)
            .await
            .map_err(CameraError::PhotoOutputError)?;

        photo::deliver(
            encoded,
            save_to_file,
            TempFileKind::Photo,
            Arc::clone(&self.registry),
            Arc::clone(&self.generation),
            job.generation,
        )
        .await
    }

    /// Grab the latest preview frame without triggering the photo output
    pub async fn capture_sample(
        &self,
        quality: u8,
        save_to_file: bool,
    ) -> CameraResult<CapturedImage> {
        let job = self.queue.call(|core| core.begin_sample()).await??;
        let encoded = PhotoEncoder::new(quality, self.settings.passthrough_quality_threshold)
            .encode_frame(job.frame, job.rotation)
            .await
            .map_err(CameraError::FrameCaptureError)?;

        photo::deliver(
            encoded,
            save_to_file,
            TempFileKind::Sample,
            Arc::clone(&self.registry),
            Arc::clone(&self.generation),
            job.generation,
        )
        .await
    }

    // ===== Recording =====

    pub async fn is_recording(&self) -> CameraResult<bool> {
        self.queue.call(|core| core.is_recording()).await
    }

    /// Start recording the live session to a movie file
    ///
    /// If the session is momentarily interrupted, waits up to the configured
    /// resume timeout for it to run again before giving up.
    pub async fn start_recording(
        &self,
        enable_audio: bool,
        quality: VideoQuality,
    ) -> CameraResult<()> {
        self.queue.call(|core| core.claim_recording()).await??;

        if enable_audio
            && !permissions::ensure(self.permissions.as_ref(), PermissionKind::Microphone).await
        {
            warn!("Microphone permission denied");
            self.queue.call(|core| core.abandon_recording()).await?;
            return Err(CameraError::PermissionDenied(PermissionKind::Microphone));
        }

        let attempt = self
            .queue
            .call(move |core| core.try_start_recording(enable_audio, quality, false))
            .await??;
        let StartAttempt::NotRunning(mut running) = attempt else {
            return Ok(());
        };

        let timeout = self.settings.recording_resume_timeout();
        info!(
            timeout_ms = timeout.as_millis(),
            "Session interrupted, waiting for it to resume before recording"
        );
        let resumed = matches!(
            tokio::time::timeout(timeout, running.wait_for(|running| *running)).await,
            Ok(Ok(_))
        );
        if !resumed {
            warn!("Session did not resume in time, recording not started");
            self.queue.call(|core| core.abandon_recording()).await?;
            return Err(CameraError::SessionNotRunning);
        }

        match self
            .queue
            .call(move |core| core.try_start_recording(enable_audio, quality, true))
            .await??
        {
            StartAttempt::Started => Ok(()),
            StartAttempt::NotRunning(_) => Err(CameraError::SessionNotRunning),
        }
    }

    /// Finalize the recording and hand over the movie file
    pub async fn stop_recording(&self) -> CameraResult<PathBuf> {
        let (reply, finished) = oneshot::channel();
        self.queue
            .call(move |core| core.begin_stop_recording(reply))
            .await?;
        finished.await.map_err(|_| CameraError::QueueClosed)?
    }

    // ===== Permissions =====

    pub fn check_permissions(&self) -> PermissionStatus {
        PermissionStatus {
            camera: self.permissions.check(PermissionKind::Camera),
            microphone: self.permissions.check(PermissionKind::Microphone),
        }
    }

    /// Prompt for `kinds` (all when `None`) and report the resulting states
    pub async fn request_permissions(&self, kinds: Option<&[PermissionKind]>) -> PermissionStatus {
        for kind in kinds.unwrap_or(&PermissionKind::ALL) {
            let state = self.permissions.request(*kind).await;
            debug!(?kind, ?state, "Permission requested");
        }
        self.check_permissions()
    }

    // ===== App lifecycle hooks =====

    /// The host app moved to the background
    pub async fn on_enter_background(&self) {
        if let Err(e) = self.queue.call(|core| core.pause()).await {
            warn!(error = %e, "Failed to pause session");
        }
    }

    /// The host app returned to the foreground
    pub async fn on_enter_foreground(&self) {
        match self.queue.call(|core| core.resume()).await {
            Ok(Ok(resumed)) => debug!(resumed, "Foreground transition handled"),
            Ok(Err(e)) | Err(e) => warn!(error = %e, "Failed to resume session"),
        }

        let registry = Arc::clone(&self.registry);
        let max_age = self.settings.stale_file_age();
        if let Err(e) =
            tokio::task::spawn_blocking(move || registry.cleanup_stale_files(max_age)).await
        {
            warn!(error = %e, "Stale temp file sweep failed");
        }
    }

    /// The host process is terminating
    pub async fn on_terminate(&self) {
        if let Err(e) = self.stop().await {
            warn!(error = %e, "Failed to stop session on terminate");
        }
        let registry = Arc::clone(&self.registry);
        if let Err(e) = tokio::task::spawn_blocking(move || registry.cleanup_all()).await {
            warn!(error = %e, "Temp file cleanup failed");
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.queue.shutdown();
    }
}

fn photo_error(err: BackendError) -> CameraError {
    match err {
        BackendError::NotRunning => CameraError::SessionNotRunning,
        BackendError::NoSession => CameraError::SessionNotInitialized,
        BackendError::Hardware(msg) => CameraError::PhotoOutputError(msg),
        other => CameraError::PhotoOutputError(other.to_string()),
    }
}
