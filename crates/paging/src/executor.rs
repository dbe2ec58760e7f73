use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::error::LoadError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A single background worker thread that runs load tasks in submission order.
///
/// The thread is detached: dropping the executor closes the queue and the
/// worker exits once it has drained what was already submitted.
pub struct TaskExecutor {
    jobs: Sender<Job>,
    name: String,
}

impl TaskExecutor {
    /// Spawn the worker thread.
    pub fn new(name: impl Into<String>) -> std::io::Result<Self> {
        let name = name.into();
        let (jobs, queue) = crossbeam_channel::unbounded::<Job>();
        std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                while let Ok(job) = queue.recv() {
                    job();
                }
                tracing::debug!("paging worker exiting");
            })?;
        tracing::debug!(worker = %name, "paging worker started");
        Ok(Self { jobs, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `task` and return a handle to poll for its result.
    ///
    /// A panic inside the task is caught and reported as
    /// [`LoadError::Panicked`]. A task cancelled before it starts never runs.
    pub fn submit<T, F>(&self, task: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, LoadError> + Send + 'static,
    {
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let job: Job = Box::new(move || {
            if flag.load(Ordering::Acquire) {
                return;
            }
            let result = match catch_unwind(AssertUnwindSafe(task)) {
                Ok(result) => result,
                Err(payload) => Err(LoadError::Panicked(panic_message(payload.as_ref()))),
            };
            // The handle may already be gone; nobody wants the result then.
            let _ = result_tx.send(result);
        });

        if self.jobs.send(job).is_err() {
            tracing::error!(worker = %self.name, "paging worker is gone; task dropped");
        }
        TaskHandle {
            result: result_rx,
            cancelled,
        }
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("name", &self.name)
            .field("queued", &self.jobs.len())
            .finish()
    }
}

/// Pollable, cancellable handle to a submitted task. Never blocks.
pub struct TaskHandle<T> {
    result: Receiver<Result<T, LoadError>>,
    cancelled: Arc<AtomicBool>,
}

impl<T> TaskHandle<T> {
    /// The task's result once it has finished, `None` while it is running.
    ///
    /// A cancelled handle reports [`LoadError::Cancelled`] and discards
    /// whatever the task produced. If the worker dropped the task without a
    /// result the handle reports [`LoadError::Aborted`].
    pub fn poll(&mut self) -> Option<Result<T, LoadError>> {
        if self.is_cancelled() {
            return Some(Err(LoadError::Cancelled));
        }
        match self.result.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(LoadError::Aborted)),
        }
    }

    /// Ask the task not to run. Work already started is not interrupted.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("cancelled", &self.is_cancelled())
            .field("ready", &!self.result.is_empty())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
