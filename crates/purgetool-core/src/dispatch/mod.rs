//! Background tasks for a single-threaded presentation loop.
//!
//! Blocking work runs on worker threads as [`DeferredTask`]s. The thread that
//! created the [`Dispatcher`] owns it and calls [`Dispatcher::drain`] once per
//! loop tick; draining starts the continuations of finished tasks and runs
//! calls that workers queued with [`Dispatcher::on_owner`].
//!
//! The two queues are only locked while they are mutated, never while work runs.

mod owner;
mod task;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use tracing::{debug, warn};

pub use task::DeferredTask;

use owner::{CallSlot, OwnerCall};

type Completion = Box<dyn FnOnce() + Send>;

struct Shared {
    owner: ThreadId,
    completed: Mutex<Vec<Completion>>,
    owner_calls: Mutex<Vec<OwnerCall>>,
    next_call_id: AtomicU64,
    in_flight: AtomicUsize,
}

/// Owner-thread side of the task machinery. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Dispatcher {
    /// Creates a dispatcher owned by the calling thread.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                owner: thread::current().id(),
                completed: Mutex::new(Vec::new()),
                owner_calls: Mutex::new(Vec::new()),
                next_call_id: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Wraps `work` in a task. Nothing runs until [`DeferredTask::run`].
    pub fn task<T, F>(&self, work: F) -> DeferredTask<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        DeferredTask::new(self.clone(), work)
    }

    /// Returns true on the thread that created the dispatcher.
    #[must_use]
    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.shared.owner
    }

    /// Number of tasks currently running on worker threads.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Processes finished tasks and queued owner-thread calls.
    ///
    /// Must be called from the owner thread, once per loop tick. Returns how many
    /// items were processed.
    pub fn drain(&self) -> usize {
        if !self.is_owner_thread() {
            warn!("Dispatcher drained from a non-owner thread; ignoring");
            return 0;
        }

        let completed = std::mem::take(&mut *lock(&self.shared.completed));
        let calls = std::mem::take(&mut *lock(&self.shared.owner_calls));
        let processed = completed.len() + calls.len();

        for completion in completed {
            completion();
        }
        for call in calls {
            call.run();
        }
        processed
    }

    /// Runs `f` on the owner thread and returns its result.
    ///
    /// On the owner thread `f` runs inline. Anywhere else the call is queued and
    /// the caller blocks until the next [`drain`](Self::drain) has run it.
    pub fn on_owner<R, F>(&self, f: F) -> R
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.is_owner_thread() {
            return f();
        }

        let id = self.shared.next_call_id.fetch_add(1, Ordering::SeqCst);
        let slot = Arc::new(CallSlot::new());
        let call = OwnerCall::new(id, Arc::clone(&slot), f);
        lock(&self.shared.owner_calls).push(call);
        debug!(id, "Queued owner-thread call");

        slot.wait()
    }

    fn started(&self) {
        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    fn finished(&self, completion: Completion) {
        lock(&self.shared.completed).push(completion);
        self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("owner", &self.shared.owner)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}
