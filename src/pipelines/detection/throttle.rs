// SPDX-License-Identifier: GPL-3.0-only

//! Emission rate limiter for detection events

use std::time::{Duration, Instant};

/// Minimum interval between two emitted detections
///
/// Evaluated before decoding: a frame arriving inside the cooldown is
/// dropped without being analyzed. The cooldown starts at the last emission.
#[derive(Debug, Clone)]
pub struct DetectionThrottle {
    interval: Duration,
    last_emission: Option<Instant>,
}

impl DetectionThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emission: None,
        }
    }

    /// Whether a frame arriving at `now` may be analyzed
    pub fn ready(&self, now: Instant) -> bool {
        match self.last_emission {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        }
    }

    pub fn record_emission(&mut self, at: Instant) {
        self.last_emission = Some(at);
    }
}
