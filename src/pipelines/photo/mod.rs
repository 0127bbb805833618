// SPDX-License-Identifier: GPL-3.0-only

//! Async photo capture pipeline
//!
//! ```text
//! Photo output ─┐
//!               ├─▶ Orientation ─▶ Encoding ─▶ inline bytes | temp file
//! Live frame ───┘
//! ```
//!
//! The hardware step runs on the session queue; decoding, rotating and
//! writing run on the blocking pool so neither the queue nor the caller's
//! context is parked.

pub mod encoding;
pub mod orientation;

pub use encoding::{EncodedImage, PhotoEncoder};

use crate::errors::{CameraError, CameraResult};
use crate::storage::{TempFileKind, TempFileRegistry};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Where a captured image ended up
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImagePayload {
    /// Encoded JPEG bytes
    Bytes(Vec<u8>),
    /// Temp file the caller now owns
    File(PathBuf),
}

/// Result of `capture`/`captureSample`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedImage {
    pub width: u32,
    pub height: u32,
    pub payload: ImagePayload,
}

impl CapturedImage {
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            ImagePayload::Bytes(data) => Some(data),
            ImagePayload::File(_) => None,
        }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        match &self.payload {
            ImagePayload::File(path) => Some(path),
            ImagePayload::Bytes(_) => None,
        }
    }
}

/// Hand an encoded image to the caller, inline or through a tracked temp file
///
/// Nothing is written once the session that took the picture has stopped.
pub(crate) async fn deliver(
    encoded: EncodedImage,
    save_to_file: bool,
    kind: TempFileKind,
    registry: Arc<TempFileRegistry>,
    generation: Arc<AtomicU64>,
    captured_in: u64,
) -> CameraResult<CapturedImage> {
    if generation.load(Ordering::SeqCst) != captured_in {
        return Err(CameraError::SessionNotRunning);
    }

    let EncodedImage {
        data,
        width,
        height,
    } = encoded;

    if !save_to_file {
        return Ok(CapturedImage {
            width,
            height,
            payload: ImagePayload::Bytes(data),
        });
    }

    let path = tokio::task::spawn_blocking(move || {
        let path = registry.write_new(kind, captured_in, &data)?;
        registry.mark_handed_off(&path);
        Ok::<_, std::io::Error>(path)
    })
    .await
    .map_err(|e| CameraError::Storage(format!("Save task error: {}", e)))??;

    info!(path = %path.display(), "Capture saved");
    Ok(CapturedImage {
        width,
        height,
        payload: ImagePayload::File(path),
    })
}
