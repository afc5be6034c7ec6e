//! Calls marshalled onto the owner thread.

use std::sync::{Arc, Condvar, Mutex};

use tracing::debug;

use super::lock;

/// Result slot a blocked worker waits on.
pub(super) struct CallSlot<R> {
    value: Mutex<Option<R>>,
    ready: Condvar,
}

impl<R> CallSlot<R> {
    pub(super) const fn new() -> Self {
        Self {
            value: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn fill(&self, value: R) {
        *lock(&self.value) = Some(value);
        self.ready.notify_all();
    }

    /// Blocks until the owner thread has stored the result.
    pub(super) fn wait(&self) -> R {
        let mut value = lock(&self.value);
        loop {
            if let Some(result) = value.take() {
                return result;
            }
            value = self
                .ready
                .wait(value)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }
}

/// A queued call, tagged with its correlation id.
pub(super) struct OwnerCall {
    id: u64,
    call: Box<dyn FnOnce() + Send>,
}

impl OwnerCall {
    pub(super) fn new<R, F>(id: u64, slot: Arc<CallSlot<R>>, f: F) -> Self
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        Self {
            id,
            call: Box::new(move || slot.fill(f())),
        }
    }

    pub(super) fn run(self) {
        debug!(id = self.id, "Running owner-thread call");
        (self.call)();
    }
}
