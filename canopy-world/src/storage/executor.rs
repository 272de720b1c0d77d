use std::{
    collections::VecDeque,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use futures::{future::BoxFuture, FutureExt};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::{
    sync::{oneshot, Notify, Semaphore},
    task::JoinHandle,
};

use super::StorageError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("The executor was shut down")]
    ShutDown,
    #[error("A storage task panicked")]
    Panicked,
}

/// A write that has been handed to the queue but not run yet.
pub struct PendingWrite {
    task: BoxFuture<'static, Result<(), StorageError>>,
    done: oneshot::Sender<Result<(), StorageError>>,
}

impl PendingWrite {
    fn new(
        task: BoxFuture<'static, Result<(), StorageError>>,
    ) -> (Self, oneshot::Receiver<Result<(), StorageError>>) {
        let (done, receiver) = oneshot::channel();
        (Self { task, done }, receiver)
    }

    /// Runs the write and reports the result to whoever is waiting on it.
    pub async fn run(self) {
        let result = match AssertUnwindSafe(self.task).catch_unwind().await {
            Ok(result) => result,
            Err(_) => Err(ExecutorError::Panicked.into()),
        };
        if let Err(err) = &result {
            log::error!("Storage write failed: {err}");
        }
        // The submitter may not care about the outcome
        let _ = self.done.send(result);
    }
}

/// Completion of a submitted write.
pub struct WriteHandle(oneshot::Receiver<Result<(), StorageError>>);

impl WriteHandle {
    /// Waits until the write ran. A write dropped without running reports `ShutDown`.
    pub async fn wait(self) -> Result<(), StorageError> {
        self.0
            .await
            .unwrap_or(Err(StorageError::Executor(ExecutorError::ShutDown)))
    }
}

struct QueueState {
    writes: VecDeque<PendingWrite>,
    shut_down: bool,
}

struct QueueShared {
    state: Mutex<QueueState>,
    wake_worker: Notify,
    // Queued plus running
    pending: AtomicUsize,
    idle: Notify,
}

impl QueueShared {
    fn finish(&self, count: usize) {
        if self.pending.fetch_sub(count, Ordering::AcqRel) == count {
            self.idle.notify_waiters();
        }
    }
}

/// Runs writes one at a time in submission order on a dedicated task.
pub struct WriteQueue {
    shared: Arc<QueueShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WriteQueue {
    /// Spawns the worker, must be called inside a tokio runtime.
    pub fn new() -> Self {
        let shared = Arc::new(QueueShared {
            state: Mutex::new(QueueState {
                writes: VecDeque::new(),
                shut_down: false,
            }),
            wake_worker: Notify::new(),
            pending: AtomicUsize::new(0),
            idle: Notify::new(),
        });
        let worker = tokio::spawn(Self::work(shared.clone()));
        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    async fn work(shared: Arc<QueueShared>) {
        loop {
            let next = {
                let mut state = shared.state.lock();
                match state.writes.pop_front() {
                    Some(write) => Some(write),
                    None if state.shut_down => break,
                    None => None,
                }
            };
            match next {
                Some(write) => {
                    write.run().await;
                    shared.finish(1);
                }
                None => shared.wake_worker.notified().await,
            }
        }
        log::debug!("Storage write worker stopped");
    }

    /// Queues `task`. Once the queue is shut down the task runs right here instead
    /// and the returned handle is already complete.
    pub async fn submit<F>(&self, task: F) -> WriteHandle
    where
        F: Future<Output = Result<(), StorageError>> + Send + 'static,
    {
        let (write, receiver) = PendingWrite::new(task.boxed());
        let rejected = {
            let mut state = self.shared.state.lock();
            if state.shut_down {
                Some(write)
            } else {
                self.shared.pending.fetch_add(1, Ordering::AcqRel);
                state.writes.push_back(write);
                None
            }
        };
        match rejected {
            Some(write) => {
                log::debug!("Write queue is shut down, running write inline");
                write.run().await;
            }
            None => self.shared.wake_worker.notify_one(),
        }
        WriteHandle(receiver)
    }

    /// Number of writes queued or running.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.state.lock().shut_down
    }

    /// Waits until every write submitted so far has run.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stops accepting writes and returns those that never started.
    ///
    /// A write already running is left to finish.
    pub fn shutdown_now(&self) -> Vec<PendingWrite> {
        let unstarted: Vec<PendingWrite> = {
            let mut state = self.shared.state.lock();
            state.shut_down = true;
            state.writes.drain(..).collect()
        };
        if !unstarted.is_empty() {
            self.shared.finish(unstarted.len());
        }
        self.shared.wake_worker.notify_one();
        unstarted
    }

    /// Shuts down after the queued writes ran and waits for the worker to stop.
    pub async fn close(&self) {
        self.wait_idle().await;
        for write in self.shutdown_now() {
            write.run().await;
        }
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                log::error!("Storage write worker failed: {err}");
            }
        }
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        // The worker drains what is queued, then stops
        self.shared.state.lock().shut_down = true;
        self.shared.wake_worker.notify_one();
    }
}

/// Runs reads in parallel, at most `permits` at a time.
pub struct ReadPool {
    permits: Arc<Semaphore>,
}

impl ReadPool {
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(permits)),
        }
    }

    pub async fn run<T, F>(&self, task: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, StorageError>> + Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ExecutorError::ShutDown)?;
        let handle = tokio::spawn(async move {
            let _permit = permit;
            task.await
        });
        match handle.await {
            Ok(result) => result,
            Err(err) => {
                log::error!("Storage read failed: {err}");
                Err(ExecutorError::Panicked.into())
            }
        }
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Rejects every read not holding a permit yet.
    pub fn shutdown(&self) {
        self.permits.close();
    }
}
