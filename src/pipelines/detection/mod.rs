// SPDX-License-Identifier: GPL-3.0-only

//! Barcode detection pipeline
//!
//! A worker task follows the live frame slot of a running session:
//!
//! ```text
//! FrameSink ─▶ throttle ─▶ scanner (blocking pool) ─▶ mapping ─▶ SessionDelegate
//! ```
//!
//! Only the newest frame is ever looked at. Frames that arrive while the
//! throttle is cooling down, or while a previous frame is being decoded,
//! are skipped rather than queued.

pub mod mapping;
pub mod scanner;
pub mod throttle;
pub mod types;

pub use mapping::DisplayMapping;
pub use scanner::{BarcodeScanner, RqrrScanner};
pub use throttle::DetectionThrottle;
pub use types::{BarcodeEvent, BarcodeFormat, FrameRegion, RawDetection};

use crate::backends::{CameraPosition, DeviceDescriptor, FrameReceiver};
use crate::pipelines::photo::orientation::capture_rotation;
use crate::render::RenderTarget;
use crate::session::SessionDelegate;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Per-session detection parameters
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSettings {
    /// Allow-list; empty scans every supported symbology
    pub formats: Vec<BarcodeFormat>,
    pub interval: Duration,
}

/// What the worker needs from the session it belongs to
pub struct DetectionContext {
    /// Session generation counter
    pub generation: Arc<AtomicU64>,
    /// Generation the worker was armed in; it exits once this is stale
    pub armed_generation: u64,
    /// Currently bound device (changes on flip and lens upgrade)
    pub device: watch::Receiver<Option<DeviceDescriptor>>,
    pub target: Arc<dyn RenderTarget>,
    pub delegate: Arc<dyn SessionDelegate>,
    pub scanner: Arc<dyn BarcodeScanner>,
}

impl DetectionContext {
    fn is_live(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.armed_generation
    }

    fn mapping(&self, frame_width: u32, frame_height: u32) -> Option<DisplayMapping> {
        let device = self.device.borrow().clone()?;
        let rotation = capture_rotation(
            device.position,
            device.sensor_orientation,
            self.target.display_rotation(),
        );
        Some(DisplayMapping {
            rotation,
            mirrored: device.position == CameraPosition::Front,
            frame_width,
            frame_height,
            bounds: self.target.bounds(),
            layout_offset: self.target.layout_offset(),
        })
    }
}

/// Start the detection worker on `runtime`
pub fn spawn_detection(
    runtime: &Handle,
    mut frames: FrameReceiver,
    settings: DetectionSettings,
    ctx: DetectionContext,
) -> JoinHandle<()> {
    let formats: Arc<[BarcodeFormat]> = Arc::from(settings.formats.clone());
    let unsupported: Vec<BarcodeFormat> = settings
        .formats
        .iter()
        .filter(|f| !ctx.scanner.supported_formats().contains(f))
        .copied()
        .collect();
    if !unsupported.is_empty() {
        warn!(?unsupported, "Requested barcode types are not supported by the scanner");
    }

    runtime.spawn(async move {
        let mut throttle = DetectionThrottle::new(settings.interval);
        info!(
            interval_ms = settings.interval.as_millis(),
            generation = ctx.armed_generation,
            "Barcode detection armed"
        );

        while frames.changed().await.is_ok() {
            if !ctx.is_live() {
                break;
            }
            if !throttle.ready(Instant::now()) {
                continue;
            }
            let Some(frame) = frames.borrow_and_update().clone() else {
                continue;
            };

            let scanner = Arc::clone(&ctx.scanner);
            let formats = Arc::clone(&formats);
            let scanned = Arc::clone(&frame);
            let result =
                tokio::task::spawn_blocking(move || scanner.scan(&scanned, &formats)).await;

            // Frames that arrived during analysis are dropped, not queued
            frames.borrow_and_update();

            let detection = match result {
                Ok(detection) => detection,
                Err(e) => {
                    warn!(error = %e, "Barcode scan task panicked");
                    continue;
                }
            };
            let Some(raw) = detection else {
                continue;
            };
            if !ctx.is_live() {
                break;
            }
            let Some(mapping) = ctx.mapping(frame.width, frame.height) else {
                continue;
            };

            let event = BarcodeEvent::new(raw.clone(), mapping.map(raw.region));
            throttle.record_emission(Instant::now());
            debug!(value = %event.value, format = ?event.format, "Barcode detected");
            ctx.delegate.barcode_detected(event);
        }

        debug!(generation = ctx.armed_generation, "Barcode detection stopped");
    })
}
