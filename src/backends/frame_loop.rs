// SPDX-License-Identifier: GPL-3.0-only
//! Paced frame-producer threads
//!
//! Backends that generate or pull frames themselves run a producer loop on
//! a dedicated thread. The controller paces the loop to a target interval
//! and guarantees the thread is joined when the hardware pipeline stops.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Action returned by the loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a producer loop running in a separate thread
pub struct FrameLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl FrameLoopController {
    /// Start a loop that calls `loop_fn` at most once per `interval`
    ///
    /// The callback receives the iteration number. The loop ends when the
    /// callback returns [`LoopAction::Stop`] or the controller is stopped.
    pub fn start<F>(name: &str, interval: Duration, mut loop_fn: F) -> Self
    where
        F: FnMut(u64) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_signal);
        let thread_name = name.to_string();

        info!(name = %name, interval_ms = interval.as_millis(), "Starting frame loop");

        let spawn_result = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let mut iteration = 0u64;
                while !stop.load(Ordering::SeqCst) {
                    let tick = Instant::now();
                    if loop_fn(iteration) == LoopAction::Stop {
                        debug!(name = %thread_name, "Loop requested stop");
                        break;
                    }
                    iteration += 1;

                    // Sleep in short slices so stop requests are honoured quickly
                    while let Some(remaining) = interval.checked_sub(tick.elapsed()) {
                        if stop.load(Ordering::SeqCst) || remaining.is_zero() {
                            break;
                        }
                        thread::sleep(remaining.min(Duration::from_millis(5)));
                    }
                }
                debug!(name = %thread_name, iterations = iteration, "Frame loop thread exiting");
            });

        let thread_handle = match spawn_result {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(name = %name, error = %e, "Failed to spawn frame loop thread");
                None
            }
        };

        Self {
            thread_handle,
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.thread().id() == thread::current().id() {
                // Stopped from inside the loop callback; the loop exits on its own
                return;
            }
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Frame loop thread panicked: {:?}", e);
            }
        }
    }
}

impl Drop for FrameLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "FrameLoopController dropped, stopping loop");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn test_loop_stops_itself() {
        let counter = Arc::new(AtomicU64::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller =
            FrameLoopController::start("test-loop", Duration::from_millis(1), move |i| {
                counter_clone.store(i, Ordering::SeqCst);
                if i >= 5 {
                    LoopAction::Stop
                } else {
                    LoopAction::Continue
                }
            });

        while controller.is_running() {
            thread::sleep(Duration::from_millis(2));
        }
        controller.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_loop_is_paced() {
        let counter = Arc::new(AtomicU64::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller =
            FrameLoopController::start("test-paced", Duration::from_millis(20), move |_| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                LoopAction::Continue
            });

        thread::sleep(Duration::from_millis(100));
        controller.stop();

        let count = counter.load(Ordering::SeqCst);
        assert!(count >= 1);
        assert!(count <= 7, "loop ran {} times in 100ms at 20ms pacing", count);
    }
}
