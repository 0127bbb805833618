// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for camera operations
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Taking photos and preview samples
//! - Recording videos
//! - Scanning barcodes

use camera_session::backends::synthetic::SyntheticBackend;
use camera_session::backends::{CameraBackend, CameraBackendType, get_backend_for_type};
use camera_session::render::{HeadlessRenderTarget, Rect};
use camera_session::{
    BarcodeEvent, CameraPosition, FlashMode, SessionConfiguration, SessionManager, Settings,
    VideoQuality,
};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Which camera the command should open
pub struct Selection {
    pub position: CameraPosition,
    pub device_id: Option<String>,
}

impl Selection {
    fn configuration(&self) -> SessionConfiguration {
        SessionConfiguration {
            device_id: self.device_id.clone(),
            ..SessionConfiguration::with_position(self.position)
        }
    }
}

/// Preview size of the headless render target
const PREVIEW_BOUNDS: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 1280.0,
    height: 720.0,
};

/// Frame rate the synthetic camera produces for CLI use
const SYNTHETIC_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// How long to wait for the first preview frame
const WARMUP_TIMEOUT: Duration = Duration::from_secs(5);

fn create_backend(settings: &Settings) -> Result<Box<dyn CameraBackend>, Box<dyn std::error::Error>> {
    match settings.backend {
        CameraBackendType::Synthetic => {
            let backend = SyntheticBackend::new();
            backend
                .handle()
                .set_frame_interval(Some(SYNTHETIC_FRAME_INTERVAL));
            Ok(Box::new(backend))
        }
        other => Ok(get_backend_for_type(other)?),
    }
}

fn build_manager(
    settings: Settings,
    events: Option<mpsc::UnboundedSender<BarcodeEvent>>,
) -> Result<SessionManager, Box<dyn std::error::Error>> {
    let backend = create_backend(&settings)?;
    let mut builder = SessionManager::builder().backend(backend).settings(settings);
    if let Some(events) = events {
        builder = builder.delegate(Arc::new(events));
    }
    Ok(builder.build()?)
}

/// List all available cameras
pub async fn list_cameras(settings: Settings) -> CliResult {
    let manager = build_manager(settings, None)?;
    let cameras = manager.get_available_devices().await?;

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for camera in &cameras {
        println!("  {} ({})", camera.name, camera.id);
        println!(
            "      Position: {}, lenses: {}, zoom: {}x-{}x",
            camera.position,
            camera.lens_count(),
            camera.min_zoom,
            camera.max_zoom
        );
        let mut features = Vec::new();
        if camera.has_flash {
            features.push("flash");
        }
        if camera.has_torch {
            features.push(if camera.continuous_torch {
                "dimmable torch"
            } else {
                "torch"
            });
        }
        if !features.is_empty() {
            println!("      Features: {}", features.join(", "));
        }
        println!();
    }

    Ok(())
}

/// Take a photo using the selected camera
pub async fn take_photo(
    settings: Settings,
    selection: Selection,
    quality: u8,
    flash: FlashMode,
    output: Option<PathBuf>,
) -> CliResult {
    let manager = build_manager(settings, None)?;
    let target = HeadlessRenderTarget::shared(PREVIEW_BOUNDS);
    manager.start(selection.configuration(), target.clone()).await?;
    print_active_camera(&manager).await?;

    wait_for_preview(&target).await?;
    if flash != FlashMode::Off {
        manager.set_flash_mode(flash).await?;
    }

    println!("Capturing...");
    let result = manager.capture(quality, false).await;
    manager.stop().await?;
    let photo = result?;

    let path = resolve_output(output, default_photo_dir(), "photo", "jpg")?;
    std::fs::write(&path, photo.bytes().unwrap_or_default())?;
    println!("Photo saved: {} ({}x{})", path.display(), photo.width, photo.height);
    Ok(())
}

/// Save the current preview frame
pub async fn take_sample(
    settings: Settings,
    selection: Selection,
    quality: u8,
    output: Option<PathBuf>,
) -> CliResult {
    let manager = build_manager(settings, None)?;
    let target = HeadlessRenderTarget::shared(PREVIEW_BOUNDS);
    manager.start(selection.configuration(), target.clone()).await?;
    print_active_camera(&manager).await?;

    wait_for_preview(&target).await?;
    let result = manager.capture_sample(quality, false).await;
    manager.stop().await?;
    let sample = result?;

    let path = resolve_output(output, default_photo_dir(), "sample", "jpg")?;
    std::fs::write(&path, sample.bytes().unwrap_or_default())?;
    println!("Sample saved: {} ({}x{})", path.display(), sample.width, sample.height);
    Ok(())
}

/// Record a video using the selected camera
pub async fn record_video(
    settings: Settings,
    selection: Selection,
    duration: u64,
    output: Option<PathBuf>,
    enable_audio: bool,
    quality: VideoQuality,
) -> CliResult {
    let manager = build_manager(settings, None)?;
    let target = HeadlessRenderTarget::shared(PREVIEW_BOUNDS);
    manager.start(selection.configuration(), target.clone()).await?;
    print_active_camera(&manager).await?;
    wait_for_preview(&target).await?;

    let output_path = resolve_output(output, default_video_dir(), "video", "mp4")?;
    println!("Output: {}", output_path.display());
    println!("Duration: {} seconds", duration);
    println!("Quality: {}", quality.display_name());
    if enable_audio {
        println!("Audio: enabled");
    }

    println!();
    println!("Recording... (press Ctrl+C to stop early)");
    manager.start_recording(enable_audio, quality).await?;

    let stop_flag = ctrl_c_flag()?;
    let start = Instant::now();
    let target_duration = Duration::from_secs(duration);

    while start.elapsed() < target_duration {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }

        let elapsed = start.elapsed().as_secs();
        print!("\rRecording: {:02}:{:02}", elapsed / 60, elapsed % 60);
        std::io::Write::flush(&mut std::io::stdout())?;

        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    println!();

    let recorded = manager.stop_recording().await;
    manager.stop().await?;
    let recorded = recorded?;

    move_file(&recorded, &output_path)?;
    println!("Video saved: {}", output_path.display());
    Ok(())
}

/// Print barcodes until Ctrl+C or the timeout
pub async fn scan_barcodes(settings: Settings, selection: Selection, timeout: Option<u64>) -> CliResult {
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let manager = build_manager(settings, Some(events_tx))?;
    let target = HeadlessRenderTarget::shared(PREVIEW_BOUNDS);
    let config = SessionConfiguration {
        enable_barcode_detection: true,
        ..selection.configuration()
    };
    manager.start(config, target).await?;
    print_active_camera(&manager).await?;

    println!("Scanning... (press Ctrl+C to stop)");
    let stop_flag = ctrl_c_flag()?;
    let deadline = timeout.map(|secs| Instant::now() + Duration::from_secs(secs));

    loop {
        if stop_flag.load(Ordering::SeqCst) || deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        match tokio::time::timeout(Duration::from_millis(100), events.recv()).await {
            Ok(Some(event)) => println!("{}", serde_json::to_string(&event)?),
            Ok(None) => break,
            Err(_) => {}
        }
    }

    manager.stop().await?;
    Ok(())
}

async fn print_active_camera(manager: &SessionManager) -> CliResult {
    if let Some(device) = manager.active_device().await? {
        println!("Using camera: {} ({})", device.name, device.position);
    }
    Ok(())
}

/// Wait for frames to start flowing (camera warm-up)
async fn wait_for_preview(target: &HeadlessRenderTarget) -> CliResult {
    let Some(mut frames) = target.preview_frames() else {
        return Err("Preview was not attached".into());
    };
    let ready = tokio::time::timeout(WARMUP_TIMEOUT, frames.wait_for(|f| f.is_some())).await;
    if !matches!(ready, Ok(Ok(_))) {
        return Err("Failed to receive frames from camera".into());
    }
    Ok(())
}

fn ctrl_c_flag() -> Result<Arc<AtomicBool>, Box<dyn std::error::Error>> {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;
    Ok(stop_flag)
}

/// Pick the output path, creating parent directories
fn resolve_output(
    output: Option<PathBuf>,
    default_dir: PathBuf,
    prefix: &str,
    extension: &str,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let default_name = format!("{}_{}.{}", prefix, timestamp, extension);

    let path = match output {
        Some(path) if path.is_dir() => path.join(default_name),
        Some(path) => path,
        None => default_dir.join(default_name),
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(path)
}

/// Move a temp file into place, copying across filesystems
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to)?;
    std::fs::remove_file(from)
}

/// Default folder name for saving photos and videos
const DEFAULT_SAVE_FOLDER: &str = "Camera";

/// Get default photo directory
fn default_photo_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}

/// Get default video directory
fn default_video_dir() -> PathBuf {
    dirs::video_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}
