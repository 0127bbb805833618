// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for live barcode detection

use camera_session::backends::synthetic::{
    SyntheticBackend, SyntheticHandle, default_devices, pattern_frame,
};
use camera_session::backends::{CameraFrame, OutputKind, SensorRotation};
use camera_session::pipelines::detection::{BarcodeScanner, FrameRegion, RawDetection};
use camera_session::render::{HeadlessRenderTarget, Rect};
use camera_session::storage::TempFileRegistry;
use camera_session::{BarcodeEvent, BarcodeFormat, SessionConfiguration, SessionManager, Settings};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Finds the same QR code in every frame
struct FixedScanner {
    region: FrameRegion,
    scans: AtomicUsize,
}

impl FixedScanner {
    fn new(region: FrameRegion) -> Arc<Self> {
        Arc::new(Self {
            region,
            scans: AtomicUsize::new(0),
        })
    }

    fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

impl BarcodeScanner for FixedScanner {
    fn supported_formats(&self) -> &[BarcodeFormat] {
        &[BarcodeFormat::Qr]
    }

    fn scan(&self, _frame: &CameraFrame, formats: &[BarcodeFormat]) -> Option<RawDetection> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        if !formats.is_empty() && !formats.contains(&BarcodeFormat::Qr) {
            return None;
        }
        Some(RawDetection {
            value: "https://example.org".to_string(),
            format: BarcodeFormat::Qr,
            region: self.region,
        })
    }
}

struct Rig {
    manager: SessionManager,
    camera: SyntheticHandle,
    scanner: Arc<FixedScanner>,
    events: mpsc::UnboundedReceiver<BarcodeEvent>,
    _dir: tempfile::TempDir,
}

fn rig(interval_ms: u64) -> Rig {
    // Upright sensors keep the expected boxes easy to compute
    let mut devices = default_devices();
    for device in &mut devices {
        device.sensor_orientation = SensorRotation::None;
    }
    let backend = SyntheticBackend::with_devices(devices);
    let camera = backend.handle();
    let scanner = FixedScanner::new(FrameRegion::new(0.1, 0.25, 0.2, 0.5));
    let (tx, events) = mpsc::unbounded_channel();
    let dir = tempfile::tempdir().unwrap();

    let manager = SessionManager::builder()
        .backend(Box::new(backend))
        .settings(Settings {
            detection_interval_ms: interval_ms,
            ..Settings::default()
        })
        .scanner(scanner.clone())
        .delegate(Arc::new(tx))
        .temp_files(Arc::new(TempFileRegistry::new(dir.path())))
        .build()
        .unwrap();

    Rig {
        manager,
        camera,
        scanner,
        events,
        _dir: dir,
    }
}

fn target() -> Arc<HeadlessRenderTarget> {
    Arc::new(
        HeadlessRenderTarget::new(Rect::new(0.0, 0.0, 400.0, 300.0)).with_layout_offset(10.0, 20.0),
    )
}

fn scanning() -> SessionConfiguration {
    SessionConfiguration {
        enable_barcode_detection: true,
        ..SessionConfiguration::default()
    }
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<BarcodeEvent>) -> Option<BarcodeEvent> {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .ok()
        .flatten()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_event_maps_into_caller_coordinates() {
    let mut rig = rig(50);
    rig.manager.start(scanning(), target()).await.unwrap();
    assert!(rig.camera.has_output(OutputKind::Metadata));

    rig.camera.push_frame(pattern_frame(64, 48, 0));
    let event = next_event(&mut rig.events).await.expect("no barcode event");

    assert_eq!(event.value, "https://example.org");
    assert_eq!(event.format, BarcodeFormat::Qr);
    assert!(event.display_value.is_none());
    // 64x48 scales exactly onto 400x300, then shifts by the layout offset
    let rect = event.bounding_rect;
    assert!(approx(rect.x, 50.0), "{:?}", rect);
    assert!(approx(rect.y, 95.0), "{:?}", rect);
    assert!(approx(rect.width, 80.0), "{:?}", rect);
    assert!(approx(rect.height, 150.0), "{:?}", rect);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_front_camera_boxes_are_mirrored() {
    let mut rig = rig(50);
    rig.manager.start(scanning(), target()).await.unwrap();
    rig.manager.flip_camera().await.unwrap();

    rig.camera.push_frame(pattern_frame(64, 48, 0));
    let event = next_event(&mut rig.events).await.expect("no barcode event");
    assert!(approx(event.bounding_rect.x, 290.0), "{:?}", event.bounding_rect);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_events_are_throttled() {
    let mut rig = rig(200);
    rig.manager.start(scanning(), target()).await.unwrap();

    let started = Instant::now();
    let mut tick = 0;
    while started.elapsed() < Duration::from_millis(500) {
        rig.camera.push_frame(pattern_frame(64, 48, tick));
        tick += 1;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut count = 0;
    while rig.events.try_recv().is_ok() {
        count += 1;
    }
    assert!((1..=3).contains(&count), "{} events in 500ms", count);
    // Cooling-down frames are never decoded
    assert_eq!(rig.scanner.scans(), count);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_type_filter_reaches_scanner() {
    let mut rig = rig(50);
    let config = SessionConfiguration {
        barcode_types: vec![BarcodeFormat::Ean13],
        ..scanning()
    };
    rig.manager.start(config, target()).await.unwrap();

    rig.camera.push_frame(pattern_frame(64, 48, 0));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rig.scanner.scans() >= 1);
    assert!(rig.events.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_events_after_stop_or_disable() {
    let mut rig = rig(50);
    let view = target();
    rig.manager.start(scanning(), view.clone()).await.unwrap();
    rig.camera.push_frame(pattern_frame(64, 48, 0));
    assert!(next_event(&mut rig.events).await.is_some());

    // Reconfigure without detection
    rig.manager
        .start(SessionConfiguration::default(), view.clone())
        .await
        .unwrap();
    assert!(!rig.camera.has_output(OutputKind::Metadata));
    let scans = rig.scanner.scans();
    rig.camera.push_frame(pattern_frame(64, 48, 1));
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(rig.scanner.scans(), scans);
    assert!(rig.events.try_recv().is_err());

    rig.manager.start(scanning(), view).await.unwrap();
    rig.manager.stop().await.unwrap();
    assert!(!rig.camera.push_frame(pattern_frame(64, 48, 2)));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rig.events.try_recv().is_err());
}
