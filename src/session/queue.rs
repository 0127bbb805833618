// SPDX-License-Identifier: GPL-3.0-only

//! Serial session queue
//!
//! One dedicated thread owns the [`SessionCore`] and runs jobs against it in
//! submission order. Callers await results through oneshot channels, so no
//! public operation blocks the calling context while the queue works.

use super::state::SessionCore;
use crate::errors::{CameraError, CameraResult};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;
use tracing::{debug, warn};

pub(crate) type Job = Box<dyn FnOnce(&mut SessionCore) + Send>;

pub(crate) enum Message {
    Job(Job),
    Shutdown,
}

/// Submission side of the session queue
#[derive(Clone)]
pub(crate) struct QueueHandle {
    tx: mpsc::Sender<Message>,
}

impl QueueHandle {
    pub(crate) fn channel() -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    /// Enqueue a job; false once the queue has shut down
    pub(crate) fn submit(&self, job: impl FnOnce(&mut SessionCore) + Send + 'static) -> bool {
        self.tx.send(Message::Job(Box::new(job))).is_ok()
    }

    /// Run `f` on the queue and await its result
    pub(crate) async fn call<T, F>(&self, f: F) -> CameraResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SessionCore) -> T + Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        let submitted = self.submit(move |core| {
            let _ = reply.send(f(core));
        });
        if !submitted {
            return Err(CameraError::QueueClosed);
        }
        result.await.map_err(|_| CameraError::QueueClosed)
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.tx.send(Message::Shutdown);
    }
}

/// Start the queue thread that owns `core`
pub(crate) fn spawn(
    mut core: SessionCore,
    rx: mpsc::Receiver<Message>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("camera-session".to_string())
        .spawn(move || {
            debug!("Session queue started");
            while let Ok(message) = rx.recv() {
                match message {
                    Message::Job(job) => job(&mut core),
                    Message::Shutdown => break,
                }
            }
            if core.has_session() {
                warn!("Session queue shutting down with a live session, tearing down");
            }
            core.stop();
            debug!("Session queue exited");
        })
}
