//! Deferred tasks with chainable continuations.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;

use tracing::{error, warn};

use super::{Dispatcher, lock};

type Work<T> = Box<dyn FnOnce() -> T + Send>;
type Continuation<T> = Box<dyn FnOnce(T) + Send>;

struct Inner<T> {
    work: Option<Work<T>>,
    result: Option<T>,
    continuations: Vec<Continuation<T>>,
}

struct TaskState<T> {
    inner: Mutex<Inner<T>>,
    resolved: Condvar,
}

/// A unit of background work with a result and continuations.
///
/// Continuations attached before the task resolves start on the owner thread's
/// next [`Dispatcher::drain`]. One attached after it resolved starts at once with
/// the stored result. Each continuation runs exactly once, on its own worker
/// thread.
pub struct DeferredTask<T> {
    dispatcher: Dispatcher,
    state: Arc<TaskState<T>>,
}

impl<T> Clone for DeferredTask<T> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone + Send + 'static> DeferredTask<T> {
    pub(super) fn new<F>(dispatcher: Dispatcher, work: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::with_work(dispatcher, Some(Box::new(work)))
    }

    fn with_work(dispatcher: Dispatcher, work: Option<Work<T>>) -> Self {
        Self {
            dispatcher,
            state: Arc::new(TaskState {
                inner: Mutex::new(Inner {
                    work,
                    result: None,
                    continuations: Vec::new(),
                }),
                resolved: Condvar::new(),
            }),
        }
    }

    /// Starts the work on a new worker thread.
    ///
    /// Running a task twice, or running a continuation handle, does nothing.
    pub fn run(&self) -> &Self {
        let work = lock(&self.state.inner).work.take();
        match work {
            Some(work) => self.spawn(work),
            None => warn!("Task was already started"),
        }
        self
    }

    fn spawn(&self, work: Work<T>) {
        let task = self.clone();
        self.dispatcher.started();
        let spawned = thread::Builder::new()
            .name("purgetool-task".into())
            .spawn(move || {
                let value = work();
                task.resolve(value);
            });
        if let Err(err) = spawned {
            error!("Could not start worker thread: {err}");
            self.dispatcher.finished(Box::new(|| {}));
        }
    }

    fn resolve(&self, value: T) {
        lock(&self.state.inner).result = Some(value);
        self.state.resolved.notify_all();

        let task = self.clone();
        self.dispatcher.finished(Box::new(move || task.complete()));
    }

    /// Starts the continuations queued before resolution. Runs during drain.
    fn complete(&self) {
        let (continuations, result) = {
            let mut inner = lock(&self.state.inner);
            (std::mem::take(&mut inner.continuations), inner.result.clone())
        };
        let Some(result) = result else {
            return;
        };
        for continuation in continuations {
            continuation(result.clone());
        }
    }

    /// Attaches a continuation that receives this task's result.
    ///
    /// Returns the continuation's task, so chains can be extended further.
    pub fn then<U, F>(&self, f: F) -> DeferredTask<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let child = DeferredTask::with_work(self.dispatcher.clone(), None);
        let start: Continuation<T> = {
            let child = child.clone();
            Box::new(move |value| child.spawn(Box::new(move || f(value))))
        };

        let mut inner = lock(&self.state.inner);
        let ready = inner.result.clone();
        match ready {
            Some(result) => {
                drop(inner);
                start(result);
            }
            None => inner.continuations.push(start),
        }
        child
    }

    /// Attaches a continuation that does not take this task's result.
    pub fn then_discard<U, F>(&self, f: F) -> DeferredTask<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce() -> U + Send + 'static,
    {
        self.then(move |_| f())
    }

    /// The result, if the task has resolved.
    #[must_use]
    pub fn result(&self) -> Option<T> {
        lock(&self.state.inner).result.clone()
    }

    /// Returns true once the work has finished.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        lock(&self.state.inner).result.is_some()
    }

    /// Blocks until the task resolves and returns its result.
    ///
    /// A continuation only starts during a drain, so waiting for one on the
    /// owner thread before its parent has been drained never returns.
    pub fn wait(&self) -> T {
        let mut inner = lock(&self.state.inner);
        loop {
            if let Some(result) = &inner.result {
                return result.clone();
            }
            inner = self
                .state
                .resolved
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl<T> std::fmt::Debug for DeferredTask<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let resolved = lock(&self.state.inner).result.is_some();
        f.debug_struct("DeferredTask")
            .field("resolved", &resolved)
            .finish_non_exhaustive()
    }
}
