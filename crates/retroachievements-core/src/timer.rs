//! Single-slot delayed callback with cancellation.
//!
//! The timer holds at most one pending task. Arming again aborts whatever was
//! pending. Once the delay elapses the task releases the slot *before* it
//! runs, so a running callback can re-arm the timer and is never aborted by a
//! later `cancel()`.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::AbortHandle;

/// Opaque identifier of one armed callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle(u64);

#[derive(Default)]
struct Slot {
    generation: u64,
    pending: Option<(TimerHandle, AbortHandle)>,
}

#[derive(Default, Clone)]
pub struct CancellableTimer {
    slot: Arc<Mutex<Slot>>,
}

impl CancellableTimer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `task` after `delay`, replacing any pending callback.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&self, delay: Duration, task: F) -> TimerHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.lock();
        if let Some((_, previous)) = slot.pending.take() {
            previous.abort();
        }
        slot.generation += 1;
        let handle = TimerHandle(slot.generation);

        let shared = Arc::clone(&self.slot);
        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut slot = shared.lock().unwrap_or_else(|p| p.into_inner());
                let current = slot.pending.as_ref().map(|(h, _)| *h);
                // Superseded between wake-up and here.
                if current != Some(handle) {
                    return;
                }
                slot.pending = None;
            }
            task.await;
        });

        slot.pending = Some((handle, join.abort_handle()));
        handle
    }

    /// Abort the pending callback. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match self.lock().pending.take() {
            Some((_, abort)) => {
                abort.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.lock().pending.is_some()
    }

    pub fn pending(&self) -> Option<TimerHandle> {
        self.lock().pending.as_ref().map(|(handle, _)| *handle)
    }
}
