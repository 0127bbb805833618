// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the session manager on the synthetic camera

use camera_session::backends::synthetic::{SyntheticBackend, SyntheticHandle, pattern_frame};
use camera_session::backends::{DeviceType, OutputKind, SessionPreset};
use camera_session::permissions::{MemoryPermissions, PermissionKind, PermissionState};
use camera_session::render::{HeadlessRenderTarget, Rect};
use camera_session::storage::TempFileRegistry;
use camera_session::{
    CameraError, CameraPosition, FlashMode, SessionConfiguration, SessionManager, Settings,
    VideoQuality,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    manager: SessionManager,
    camera: SyntheticHandle,
    target: Arc<HeadlessRenderTarget>,
    dir: TempDir,
}

fn test_settings() -> Settings {
    Settings {
        detection_interval_ms: 50,
        recording_resume_timeout_ms: 300,
        upgrade_overlay_ms: 50,
        ..Settings::default()
    }
}

fn harness_with(backend: SyntheticBackend, permissions: MemoryPermissions) -> Harness {
    harness_configured(backend, permissions, test_settings())
}

fn harness_configured(
    backend: SyntheticBackend,
    permissions: MemoryPermissions,
    settings: Settings,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let camera = backend.handle();
    let manager = SessionManager::builder()
        .backend(Box::new(backend))
        .settings(settings)
        .permissions(Arc::new(permissions))
        .temp_files(Arc::new(TempFileRegistry::new(dir.path())))
        .build()
        .unwrap();
    Harness {
        manager,
        camera,
        target: HeadlessRenderTarget::shared(Rect::new(0.0, 0.0, 390.0, 844.0)),
        dir,
    }
}

fn harness() -> Harness {
    harness_with(SyntheticBackend::new(), MemoryPermissions::granted())
}

impl Harness {
    async fn start(&self, config: SessionConfiguration) {
        self.manager.start(config, self.target.clone()).await.unwrap();
    }

    fn temp_file_count(&self) -> usize {
        std::fs::read_dir(self.dir.path()).unwrap().count()
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_binds_back_wide_camera() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;

    assert!(h.manager.is_running().await.unwrap());
    let active = h.manager.active_device().await.unwrap().unwrap();
    assert_eq!(active.id, "synthetic:back-wide");
    assert!(active.is_active);
    assert!(h.target.is_attached());
    assert!(h.target.is_transparent());
    assert!(h.camera.has_output(OutputKind::Photo));
    assert!(h.camera.has_output(OutputKind::FrameSample));
    assert!(!h.camera.has_output(OutputKind::Metadata));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_available_devices_mark_active() {
    let h = harness();
    let before = h.manager.get_available_devices().await.unwrap();
    assert_eq!(before.len(), 4);
    assert!(before.iter().all(|d| !d.is_active));

    h.start(SessionConfiguration::with_position(CameraPosition::Front)).await;
    let after = h.manager.get_available_devices().await.unwrap();
    let active: Vec<_> = after.iter().filter(|d| d.is_active).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "synthetic:front");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_errors() {
    let h = harness();
    let err = h
        .manager
        .start(
            SessionConfiguration {
                device_id: Some("nope".to_string()),
                ..SessionConfiguration::default()
            },
            h.target.clone(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CameraError::DeviceUnavailable(_)));
    assert!(!h.manager.is_running().await.unwrap());

    h.camera.reject_input(true);
    let err = h
        .manager
        .start(SessionConfiguration::default(), h.target.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, CameraError::InputRejected(_)));
    assert!(h.manager.active_device().await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_refused_preview_tears_down_fresh_session() {
    let h = harness();
    let target = Arc::new(
        HeadlessRenderTarget::new(Rect::new(0.0, 0.0, 100.0, 100.0)).refusing_preview(),
    );
    let err = h
        .manager
        .start(SessionConfiguration::default(), target)
        .await
        .unwrap_err();
    assert!(matches!(err, CameraError::RenderTargetUnavailable(_)));
    assert!(!h.camera.is_running());
    assert!(h.camera.active_input().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_camera_permission_denied() {
    let h = harness_with(
        SyntheticBackend::new(),
        MemoryPermissions::with_states(PermissionState::Denied, PermissionState::Granted),
    );
    let err = h
        .manager
        .start(SessionConfiguration::default(), h.target.clone())
        .await
        .unwrap_err();
    assert_eq!(err, CameraError::PermissionDenied(PermissionKind::Camera));
    assert_eq!(h.camera.sessions_created(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_request_permissions_resolves_prompts() {
    let permissions =
        MemoryPermissions::with_states(PermissionState::Granted, PermissionState::Prompt)
            .prompt_outcome(PermissionState::Denied);
    let h = harness_with(SyntheticBackend::new(), permissions);

    assert_eq!(h.manager.check_permissions().microphone, PermissionState::Prompt);
    let status = h
        .manager
        .request_permissions(Some(&[PermissionKind::Microphone]))
        .await;
    assert_eq!(status.camera, PermissionState::Granted);
    assert_eq!(status.microphone, PermissionState::Denied);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_reuses_session_and_swaps_target() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;

    let second = HeadlessRenderTarget::shared(Rect::new(0.0, 0.0, 200.0, 200.0));
    h.manager
        .start(
            SessionConfiguration::with_position(CameraPosition::Front),
            second.clone(),
        )
        .await
        .unwrap();

    assert_eq!(h.camera.sessions_created(), 1);
    assert!(!h.target.is_attached());
    assert!(!h.target.is_transparent());
    assert!(second.is_attached());
    assert_eq!(h.camera.active_input().as_deref(), Some("synthetic:front"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_never_more_than_one_camera_input() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;
    h.manager.flip_camera().await.unwrap();
    h.manager.flip_camera().await.unwrap();
    h.manager
        .start(
            SessionConfiguration {
                device_id: Some("synthetic:back-ultrawide".to_string()),
                ..SessionConfiguration::default()
            },
            h.target.clone(),
        )
        .await
        .unwrap();
    h.manager.stop().await.unwrap();

    let counts = h.camera.committed_input_counts();
    assert!(!counts.is_empty());
    assert!(counts.iter().all(|&c| c <= 1), "commits: {:?}", counts);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_flip_switches_position() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;

    let front = h.manager.flip_camera().await.unwrap();
    assert_eq!(front.position, CameraPosition::Front);
    let back = h.manager.flip_camera().await.unwrap();
    assert_eq!(back.id, "synthetic:back-wide");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_flip_without_session() {
    let h = harness();
    let err = h.manager.flip_camera().await.unwrap_err();
    assert_eq!(err, CameraError::SessionNotInitialized);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_zoom_range_is_capped() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;

    let zoom = h.manager.get_zoom().await.unwrap();
    assert_eq!(zoom.min, 1.0);
    assert_eq!(zoom.max, 10.0);
    assert_eq!(zoom.current, 1.0);

    let err = h.manager.set_zoom(12.0, false).await.unwrap_err();
    assert!(matches!(err, CameraError::ZoomOutOfRange { max, .. } if max == 10.0));

    h.manager.set_zoom(3.0, true).await.unwrap();
    assert_eq!(h.manager.get_zoom().await.unwrap().current, 3.0);
    assert_eq!(h.camera.last_ramp_rate(), Some(2.0));

    h.manager.set_zoom(2.0, false).await.unwrap();
    assert_eq!(h.camera.last_ramp_rate(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_out_of_range_initial_zoom_is_ignored() {
    let h = harness();
    h.start(SessionConfiguration {
        initial_zoom_factor: Some(50.0),
        ..SessionConfiguration::default()
    })
    .await;
    assert_eq!(h.manager.get_zoom().await.unwrap().current, 1.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_flash_modes_follow_device() {
    let h = harness();
    assert_eq!(
        h.manager.get_supported_flash_modes().await.unwrap(),
        vec![FlashMode::Off]
    );

    h.start(SessionConfiguration::default()).await;
    let modes = h.manager.get_supported_flash_modes().await.unwrap();
    assert_eq!(modes, vec![FlashMode::Off, FlashMode::On, FlashMode::Auto]);
    h.manager.set_flash_mode(FlashMode::On).await.unwrap();

    // Front camera has no flash, mode resets
    h.manager.flip_camera().await.unwrap();
    assert_eq!(h.manager.get_flash_mode().await.unwrap(), FlashMode::Off);
    let err = h.manager.set_flash_mode(FlashMode::Auto).await.unwrap_err();
    assert!(matches!(err, CameraError::UnsupportedFlashMode(_)));
    h.manager.set_flash_mode(FlashMode::Off).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_torch_levels_and_reset_on_flip() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;
    assert!(h.manager.is_torch_available().await.unwrap());

    h.manager.set_torch_mode(true, Some(0.5)).await.unwrap();
    let torch = h.manager.get_torch_mode().await.unwrap();
    assert!(torch.enabled);
    assert_eq!(torch.level, 0.5);
    assert_eq!(h.camera.torch_level(), Some(0.5));

    h.manager.set_torch_mode(true, Some(0.0)).await.unwrap();
    assert!(!h.manager.get_torch_mode().await.unwrap().enabled);

    h.manager.set_torch_mode(true, None).await.unwrap();
    assert_eq!(h.camera.torch_level(), Some(1.0));

    h.manager.flip_camera().await.unwrap();
    assert!(!h.manager.get_torch_mode().await.unwrap().enabled);
    assert_eq!(h.camera.torch_level(), None);
    assert!(!h.manager.is_torch_available().await.unwrap());
    let err = h.manager.set_torch_mode(true, None).await.unwrap_err();
    assert_eq!(err, CameraError::TorchUnavailable);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_capture_returns_upright_jpeg() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;
    h.camera.push_frame(pattern_frame(64, 48, 1));

    // Back sensor is mounted at 90°, portrait display
    let photo = h.manager.capture(80, false).await.unwrap();
    assert_eq!((photo.width, photo.height), (48, 64));
    let bytes = photo.bytes().unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_capture_passthrough_when_upright() {
    let h = harness();
    let target = Arc::new(
        HeadlessRenderTarget::new(Rect::new(0.0, 0.0, 844.0, 390.0)).with_display_rotation(90),
    );
    h.manager
        .start(SessionConfiguration::default(), target)
        .await
        .unwrap();
    h.camera.push_frame(pattern_frame(64, 48, 1));

    let photo = h.manager.capture(95, false).await.unwrap();
    assert_eq!((photo.width, photo.height), (64, 48));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_capture_to_file_survives_stop() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;

    let photo = h.manager.capture(85, true).await.unwrap();
    let path = photo.path().unwrap().clone();
    assert!(path.starts_with(h.dir.path()));
    assert!(path.exists());

    h.manager.stop().await.unwrap();
    assert!(path.exists(), "handed-off files belong to the caller");

    h.manager.on_terminate().await;
    assert!(!path.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_capture_errors() {
    let h = harness();
    let err = h.manager.capture(85, false).await.unwrap_err();
    assert_eq!(err, CameraError::SessionNotInitialized);

    h.start(SessionConfiguration::default()).await;
    h.camera.fail_next_photo("sensor timeout");
    let err = h.manager.capture(85, false).await.unwrap_err();
    assert_eq!(err, CameraError::PhotoOutputError("sensor timeout".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_capture_discarded_when_session_stops() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;
    h.camera.set_photo_latency(Duration::from_millis(200));

    let manager = &h.manager;
    let (photo, stopped) = tokio::join!(manager.capture(85, true), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.stop().await
    });
    stopped.unwrap();
    assert_eq!(photo.unwrap_err(), CameraError::SessionNotRunning);
    assert_eq!(h.temp_file_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sample_uses_latest_frame() {
    let h = harness();
    h.start(SessionConfiguration::with_position(CameraPosition::Front)).await;

    let err = h.manager.capture_sample(85, false).await.unwrap_err();
    assert!(matches!(err, CameraError::FrameCaptureError(_)));

    assert!(h.camera.push_frame(pattern_frame(32, 16, 0)));
    let sample = h.manager.capture_sample(85, true).await.unwrap();
    // Front sensor at 270°
    assert_eq!((sample.width, sample.height), (16, 32));
    assert!(sample.path().unwrap().exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sample_requires_running_session() {
    let h = harness();
    let err = h.manager.capture_sample(85, false).await.unwrap_err();
    assert_eq!(err, CameraError::SessionNotInitialized);

    h.start(SessionConfiguration::default()).await;
    h.camera.push_frame(pattern_frame(8, 8, 0));
    h.camera.interrupt();
    let err = h.manager.capture_sample(85, false).await.unwrap_err();
    assert_eq!(err, CameraError::SessionNotRunning);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_recording_lifecycle_restores_preset() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;

    h.manager
        .start_recording(false, VideoQuality::High)
        .await
        .unwrap();
    assert!(h.manager.is_recording().await.unwrap());
    assert!(h.camera.has_output(OutputKind::Movie));

    let err = h
        .manager
        .start_recording(false, VideoQuality::High)
        .await
        .unwrap_err();
    assert_eq!(err, CameraError::RecordingAlreadyInProgress);

    let path = h.manager.stop_recording().await.unwrap();
    assert!(path.exists());
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("preset=Hd1920x1080"));
    assert!(!h.manager.is_recording().await.unwrap());
    assert!(!h.camera.has_output(OutputKind::Movie));
    assert_eq!(
        h.camera.preset_history(),
        vec![SessionPreset::Hd1920x1080, SessionPreset::Photo]
    );

    let err = h.manager.stop_recording().await.unwrap_err();
    assert_eq!(err, CameraError::NoRecordingInProgress);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_max_quality_falls_back_to_supported_preset() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;
    h.manager.start_recording(false, VideoQuality::Max).await.unwrap();
    assert_eq!(h.camera.preset_history()[0], SessionPreset::Hd1920x1080);
    h.manager.stop_recording().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_recording_with_audio() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;

    h.manager.start_recording(true, VideoQuality::Low).await.unwrap();
    assert!(h.camera.audio_attached());
    let path = h.manager.stop_recording().await.unwrap();
    assert!(std::fs::read_to_string(path).unwrap().contains("audio=true"));
    assert!(!h.camera.audio_attached());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_recording_audio_failures() {
    let h = harness_with(
        SyntheticBackend::new(),
        MemoryPermissions::with_states(PermissionState::Granted, PermissionState::Denied),
    );
    h.start(SessionConfiguration::default()).await;

    let err = h
        .manager
        .start_recording(true, VideoQuality::High)
        .await
        .unwrap_err();
    assert_eq!(err, CameraError::PermissionDenied(PermissionKind::Microphone));
    assert!(!h.manager.is_recording().await.unwrap());
    assert_eq!(h.temp_file_count(), 0);
    assert!(!h.camera.has_output(OutputKind::Movie));

    // Without audio the same session still records
    h.manager
        .start_recording(false, VideoQuality::High)
        .await
        .unwrap();
    h.manager.stop_recording().await.unwrap();

    let h = harness();
    h.start(SessionConfiguration::default()).await;
    h.camera.set_microphone(false);
    let err = h
        .manager
        .start_recording(true, VideoQuality::High)
        .await
        .unwrap_err();
    assert_eq!(err, CameraError::AudioDeviceUnavailable);
    assert!(!h.manager.is_recording().await.unwrap());
    assert!(!h.camera.has_output(OutputKind::Movie));

    h.camera.set_microphone(true);
    h.camera.reject_audio_input(true);
    let err = h
        .manager
        .start_recording(true, VideoQuality::High)
        .await
        .unwrap_err();
    assert!(matches!(err, CameraError::AudioInputRejected(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_movie_output_rejected() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;
    h.camera.reject_output(OutputKind::Movie);

    let err = h
        .manager
        .start_recording(false, VideoQuality::Medium)
        .await
        .unwrap_err();
    assert!(matches!(err, CameraError::OutputRejected(_)));
    assert!(!h.manager.is_recording().await.unwrap());
    assert_eq!(h.camera.preset_history().last(), Some(&SessionPreset::Photo));
    assert_eq!(h.temp_file_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_recording_waits_for_interruption_to_end() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;

    h.camera.interrupt_for(Duration::from_millis(100));
    h.manager
        .start_recording(false, VideoQuality::High)
        .await
        .unwrap();
    assert!(h.manager.is_recording().await.unwrap());
    h.manager.stop_recording().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overlapping_starts_record_once() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;

    // The first start sits in Starting until the interruption ends
    h.camera.interrupt_for(Duration::from_millis(150));
    let (first, second) = tokio::join!(
        h.manager.start_recording(false, VideoQuality::High),
        h.manager.start_recording(false, VideoQuality::High),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| r.as_ref().err() == Some(&CameraError::RecordingAlreadyInProgress))
    );
    assert!(h.manager.is_recording().await.unwrap());
    assert_eq!(h.temp_file_count(), 1);

    h.manager.stop_recording().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_recording_gives_up_when_interruption_lasts() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;

    h.camera.interrupt();
    let err = h
        .manager
        .start_recording(false, VideoQuality::High)
        .await
        .unwrap_err();
    assert_eq!(err, CameraError::SessionNotRunning);
    assert!(!h.manager.is_recording().await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_recorder_error_is_verbatim() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;
    h.manager
        .start_recording(false, VideoQuality::High)
        .await
        .unwrap();

    h.camera.fail_next_recording("disk full");
    let err = h.manager.stop_recording().await.unwrap_err();
    assert_eq!(err, CameraError::RecorderError("disk full".to_string()));
    assert_eq!(err.to_string(), "disk full");
    assert!(!h.manager.is_recording().await.unwrap());
    assert_eq!(h.temp_file_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_during_recording_cleans_up() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;
    h.manager.set_torch_mode(true, None).await.unwrap();
    h.manager
        .start_recording(true, VideoQuality::High)
        .await
        .unwrap();
    assert_eq!(h.temp_file_count(), 1);

    h.manager.stop().await.unwrap();
    h.manager.stop().await.unwrap();

    assert!(!h.manager.is_running().await.unwrap());
    assert!(!h.manager.is_recording().await.unwrap());
    assert!(h.manager.active_device().await.unwrap().is_none());
    assert!(!h.target.is_attached());
    assert!(!h.target.is_transparent());
    assert_eq!(h.camera.torch_level(), None);
    assert!(!h.camera.audio_attached());
    assert!(wait_until(|| h.temp_file_count() == 0).await);

    let err = h.manager.stop_recording().await.unwrap_err();
    assert_eq!(err, CameraError::NoRecordingInProgress);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pending_stop_recording_fails_when_session_stops() {
    let h = harness();
    h.start(SessionConfiguration::default()).await;
    h.manager
        .start_recording(false, VideoQuality::High)
        .await
        .unwrap();
    h.camera.set_recorder_latency(Duration::from_millis(200));

    let manager = &h.manager;
    let (finished, stopped) = tokio::join!(manager.stop_recording(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.stop().await
    });
    stopped.unwrap();
    assert_eq!(finished.unwrap_err(), CameraError::SessionNotRunning);
    assert!(wait_until(|| h.temp_file_count() == 0).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_triple_camera_upgrade_keeps_zoom() {
    let h = harness();
    h.start(SessionConfiguration {
        use_triple_camera_if_available: true,
        initial_zoom_factor: Some(2.0),
        ..SessionConfiguration::default()
    })
    .await;

    let camera = h.camera.clone();
    assert!(
        wait_until(|| camera.active_input().as_deref() == Some("synthetic:back-triple")).await
    );
    let active = h.manager.active_device().await.unwrap().unwrap();
    assert_eq!(active.device_type, DeviceType::TripleCamera);
    assert_eq!(h.manager.get_zoom().await.unwrap().current, 2.0);

    assert_eq!(h.target.blur_shown_count(), 1);
    let target = h.target.clone();
    assert!(wait_until(|| !target.is_blur_visible()).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_background_and_foreground() {
    let h = harness();
    h.start(SessionConfiguration {
        enable_barcode_detection: true,
        ..SessionConfiguration::default()
    })
    .await;
    assert!(h.camera.has_output(OutputKind::Metadata));

    h.manager.on_enter_background().await;
    assert!(!h.manager.is_running().await.unwrap());

    h.manager.on_enter_foreground().await;
    assert!(h.manager.is_running().await.unwrap());
    assert!(h.camera.has_output(OutputKind::Metadata));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_foreground_without_session_only_sweeps() {
    let h = harness();
    h.manager.on_enter_foreground().await;
    assert!(!h.manager.is_running().await.unwrap());
    assert_eq!(h.camera.sessions_created(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stale_sweep_spares_young_files() {
    let h = harness();
    let stray = h.dir.path().join("camera-session-photo-stray.jpg");
    std::fs::write(&stray, b"old").unwrap();
    h.manager.on_enter_foreground().await;
    assert!(Path::new(&stray).exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stale_sweep_spares_recording_in_progress() {
    let h = harness_configured(
        SyntheticBackend::new(),
        MemoryPermissions::granted(),
        Settings {
            stale_file_age_secs: 1,
            ..test_settings()
        },
    );
    h.start(SessionConfiguration::default()).await;
    h.manager
        .start_recording(false, VideoQuality::High)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1200)).await;
    h.manager.on_enter_background().await;
    h.manager.on_enter_foreground().await;
    assert_eq!(h.temp_file_count(), 1);

    let path = h.manager.stop_recording().await.unwrap();
    assert!(path.exists());
    assert!(std::fs::read_to_string(&path).unwrap().contains("duration_ms="));
}

#[test]
fn test_build_requires_runtime() {
    let err = SessionManager::builder()
        .backend(Box::new(SyntheticBackend::new()))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, CameraError::ConfigurationFailed(_)));
}
