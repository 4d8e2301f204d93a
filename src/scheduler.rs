// SPDX-License-Identifier: MIT
//
// Render request coalescing.
//
// Anything may ask for a frame: input dispatch, a resize, a spinner timer
// on another thread. Requests between two renders collapse into one. The
// signal is a channel with room for exactly one unit: the first request
// fills it, later ones find it full and are dropped. A forced request
// additionally sets a sticky flag that survives until the render consumes
// it, so a force arriving while a plain request is already queued still
// forces.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

/// Cloneable, thread-safe handle for requesting renders.
///
/// Widgets receive one of these instead of a reference to the runtime.
#[derive(Clone)]
pub struct RenderHandle {
    signal: SyncSender<()>,
    force: Arc<AtomicBool>,
}

impl RenderHandle {
    /// Ask for a frame. `force` discards the diff state so the frame is a
    /// full redraw.
    pub fn request_render(&self, force: bool) {
        if force {
            self.force.store(true, Ordering::Release);
        }
        match self.signal.try_send(()) {
            Ok(()) => tracing::trace!(target: "scheduler", force, "render_requested"),
            Err(TrySendError::Full(())) => {
                tracing::trace!(target: "scheduler", force, "render_coalesced");
            }
            Err(TrySendError::Disconnected(())) => {}
        }
    }
}

/// The receiving side, owned by the render loop.
pub struct RenderScheduler {
    signal: Receiver<()>,
    handle: RenderHandle,
}

impl RenderScheduler {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::sync_channel(1);
        Self {
            signal: rx,
            handle: RenderHandle {
                signal: tx,
                force: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    /// A handle feeding this scheduler.
    #[must_use]
    pub fn handle(&self) -> RenderHandle {
        self.handle.clone()
    }

    /// Consume a pending request. `Some(force)` when a render is due.
    pub fn take(&self) -> Option<bool> {
        self.signal.try_recv().ok()?;
        Some(self.handle.force.swap(false, Ordering::AcqRel))
    }
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
