//! External pause/cancel command channel.
//!
//! The one cross-thread surface of the session core: a [`CommandHandle`]
//! can be cloned into any thread and used to request a cancel (terminal)
//! or a pause (resumable). Requests are edge-triggered flags; the handle
//! also wakes the loop's readiness wait so an idle session reacts without
//! waiting for its next deadline.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mio::{Registry, Token, Waker};

struct Shared {
    cancel: AtomicBool,
    pause: AtomicBool,
    waker: Waker,
}

/// Loop-side receiver for external commands.
///
/// Owned by the session; polled non-blockingly once per iteration.
#[derive(Debug)]
pub struct CommandChannel {
    shared: Arc<Shared>,
}

/// Cloneable, thread-safe handle for issuing pause/cancel commands.
#[derive(Debug, Clone)]
pub struct CommandHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("cancel", &self.cancel.load(Ordering::Relaxed))
            .field("pause", &self.pause.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl CommandChannel {
    /// Create a command channel whose waker is registered on `registry`
    /// under `token`.
    ///
    /// # Errors
    /// Returns an error if the waker cannot be registered.
    pub fn new(registry: &Registry, token: Token) -> io::Result<(Self, CommandHandle)> {
        let shared = Arc::new(Shared {
            cancel: AtomicBool::new(false),
            pause: AtomicBool::new(false),
            waker: Waker::new(registry, token)?,
        });
        let channel = Self {
            shared: Arc::clone(&shared),
        };
        Ok((channel, CommandHandle { shared }))
    }

    /// Take the cancel flag, clearing it.
    pub fn take_cancel(&self) -> bool {
        self.shared.cancel.swap(false, Ordering::Acquire)
    }

    /// Take the pause flag, clearing it.
    pub fn take_pause(&self) -> bool {
        self.shared.pause.swap(false, Ordering::Acquire)
    }
}

impl CommandHandle {
    /// Request that the session stop with the "aborted locally" cause.
    ///
    /// Observed at the command-poll step of the next iteration; latency is
    /// bounded by one full iteration. Waking the loop is best-effort.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Release);
        let _ = self.shared.waker.wake();
    }

    /// Request that the session pause and return control to the caller.
    ///
    /// All transport resources are released but keepalive timing survives;
    /// the caller may run the session again to resume.
    pub fn pause(&self) {
        self.shared.pause.store(true, Ordering::Release);
        let _ = self.shared.waker.wake();
    }
}
