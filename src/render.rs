// SPDX-License-Identifier: GPL-3.0-only

//! Render target (preview host)
//!
//! The surface the session attaches its preview to. Calls arrive on the
//! session queue thread or a runtime task and must not block; UI-backed
//! implementations post the work to their main context.

use crate::backends::FrameReceiver;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Rectangle in display points
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Host view the preview is rendered into
pub trait RenderTarget: Send + Sync {
    /// Current bounds of the preview area
    fn bounds(&self) -> Rect;

    /// Offset of the host view inside the caller's coordinate space
    fn layout_offset(&self) -> (f64, f64) {
        (0.0, 0.0)
    }

    /// Current display rotation in degrees (0, 90, 180, 270)
    fn display_rotation(&self) -> u32 {
        0
    }

    /// Attach a preview layer fed by `frames`; fails if the host cannot host one
    fn attach_preview(&self, frames: FrameReceiver) -> Result<(), String>;

    /// Remove the preview layer; must tolerate being called when detached
    fn detach_preview(&self);

    /// Toggle the host background between transparent and opaque
    fn set_transparent(&self, transparent: bool);

    fn show_blur_overlay(&self);

    fn hide_blur_overlay(&self);
}

#[derive(Debug, Default)]
struct HeadlessState {
    attached: bool,
    transparent: bool,
    blur_visible: bool,
    blur_shown_count: usize,
    attach_count: usize,
}

/// Render target without a display
///
/// Records what the session asked of it, for hosts without a UI (the CLI)
/// and for tests.
pub struct HeadlessRenderTarget {
    bounds: Rect,
    offset: (f64, f64),
    rotation: u32,
    refuse_attach: bool,
    state: Mutex<HeadlessState>,
    frames: Mutex<Option<FrameReceiver>>,
}

impl HeadlessRenderTarget {
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds,
            offset: (0.0, 0.0),
            rotation: 0,
            refuse_attach: false,
            state: Mutex::new(HeadlessState::default()),
            frames: Mutex::new(None),
        }
    }

    pub fn shared(bounds: Rect) -> Arc<Self> {
        Arc::new(Self::new(bounds))
    }

    pub fn with_layout_offset(mut self, dx: f64, dy: f64) -> Self {
        self.offset = (dx, dy);
        self
    }

    pub fn with_display_rotation(mut self, degrees: u32) -> Self {
        self.rotation = degrees % 360;
        self
    }

    /// Behave like a host view that cannot take a preview layer
    pub fn refusing_preview(mut self) -> Self {
        self.refuse_attach = true;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_attached(&self) -> bool {
        self.state().attached
    }

    pub fn is_transparent(&self) -> bool {
        self.state().transparent
    }

    pub fn is_blur_visible(&self) -> bool {
        self.state().blur_visible
    }

    /// Number of times the blur overlay was shown
    pub fn blur_shown_count(&self) -> usize {
        self.state().blur_shown_count
    }

    pub fn attach_count(&self) -> usize {
        self.state().attach_count
    }

    /// Frames the attached preview would render
    pub fn preview_frames(&self) -> Option<FrameReceiver> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl RenderTarget for HeadlessRenderTarget {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn layout_offset(&self) -> (f64, f64) {
        self.offset
    }

    fn display_rotation(&self) -> u32 {
        self.rotation
    }

    fn attach_preview(&self, frames: FrameReceiver) -> Result<(), String> {
        if self.refuse_attach {
            return Err("host view does not support preview layers".to_string());
        }
        *self.frames.lock().unwrap_or_else(|e| e.into_inner()) = Some(frames);
        let mut state = self.state();
        state.attached = true;
        state.attach_count += 1;
        debug!(bounds = ?self.bounds, "Preview attached");
        Ok(())
    }

    fn detach_preview(&self) {
        *self.frames.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.state().attached = false;
    }

    fn set_transparent(&self, transparent: bool) {
        self.state().transparent = transparent;
    }

    fn show_blur_overlay(&self) {
        let mut state = self.state();
        state.blur_visible = true;
        state.blur_shown_count += 1;
    }

    fn hide_blur_overlay(&self) {
        self.state().blur_visible = false;
    }
}
