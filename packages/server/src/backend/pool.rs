//! Fixed-size pool of isolated task workers.
//!
//! Each worker is a dedicated OS thread owning its own runner instance, so
//! task bodies share no mutable state with the submitter or with each other;
//! inputs and outputs are owned values moved across the boundary. Tasks
//! queue FIFO on a shared channel and complete in whatever order workers
//! finish them.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A CPU-bound task body executed inside a pool worker.
///
/// Each worker owns one runner instance for its whole lifetime; `run` takes
/// `&mut self` so a runner may keep per-worker scratch state without any
/// cross-worker sharing.
pub trait TaskRunner: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn run(&mut self, input: Self::Input) -> Self::Output;
}

/// Failure of a submitted task, as seen by the submitter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// The task body panicked; the worker survived and moved on.
    #[error("task body panicked: {0}")]
    Panicked(String),

    /// The pool stopped accepting submissions before this task ran.
    #[error("worker pool is shut down")]
    ShutDown,

    /// The worker disappeared without delivering a result.
    #[error("task was canceled before completion")]
    Canceled,
}

struct Job<R: TaskRunner> {
    input: R::Input,
    reply: oneshot::Sender<Result<R::Output, TaskError>>,
}

/// Fixed-size worker pool with FIFO submission order and graceful drain.
///
/// The pool is owned by the back-end service and handed to connection
/// handlers by reference; nothing outside [`TaskPool::submit`] touches the
/// queue or the workers.
pub struct TaskPool<R: TaskRunner> {
    tx: Mutex<Option<mpsc::Sender<Job<R>>>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    size: usize,
}

impl<R: TaskRunner> TaskPool<R> {
    /// Starts `size` worker threads, constructing one runner per worker.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread cannot be spawned.
    pub fn start<F>(size: usize, make_runner: F) -> std::io::Result<Self>
    where
        F: Fn(usize) -> R,
    {
        let size = size.max(1);
        let (tx, rx) = mpsc::channel::<Job<R>>();
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let rx = Arc::clone(&rx);
            let runner = make_runner(id);
            let handle = thread::Builder::new()
                .name(format!("pagelens-worker-{id}"))
                .spawn(move || worker_loop(id, runner, &rx))?;
            workers.push(handle);
        }

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            size,
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Enqueues a task in submission order and returns a ticket for its
    /// result.
    ///
    /// Submission after [`TaskPool::shutdown`] yields a ticket that
    /// resolves to [`TaskError::ShutDown`].
    pub fn submit(&self, input: R::Input) -> TaskTicket<R::Output> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            input,
            reply: reply_tx,
        };

        let sender = self.tx.lock();
        match sender.as_ref() {
            Some(tx) => {
                if let Err(mpsc::SendError(job)) = tx.send(job) {
                    let _ = job.reply.send(Err(TaskError::ShutDown));
                }
            }
            None => {
                let _ = job.reply.send(Err(TaskError::ShutDown));
            }
        }

        TaskTicket { rx: reply_rx }
    }

    /// Stops accepting submissions, lets every queued task finish, and
    /// joins the worker threads. Nothing already accepted is discarded.
    ///
    /// Blocks the calling thread; call it from teardown code or through
    /// `spawn_blocking`.
    pub fn shutdown(&self) {
        // Dropping the sender closes the queue; workers drain what remains
        // and then exit their receive loop.
        drop(self.tx.lock().take());

        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if handle.join().is_err() {
                warn!("worker thread terminated abnormally during drain");
            }
        }
    }
}

impl<R: TaskRunner> Drop for TaskPool<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Pending result of one submitted task.
pub struct TaskTicket<T> {
    rx: oneshot::Receiver<Result<T, TaskError>>,
}

impl<T> TaskTicket<T> {
    /// Awaits the task result.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] if the task panicked, the pool was shut down
    /// before the task ran, or the worker vanished without replying.
    pub async fn wait(self) -> Result<T, TaskError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(TaskError::Canceled),
        }
    }

    /// Blocking variant of [`TaskTicket::wait`] for non-async callers.
    ///
    /// # Errors
    ///
    /// Same conditions as [`TaskTicket::wait`].
    pub fn wait_blocking(self) -> Result<T, TaskError> {
        match self.rx.blocking_recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(TaskError::Canceled),
        }
    }
}

fn worker_loop<R: TaskRunner>(id: usize, mut runner: R, rx: &Mutex<mpsc::Receiver<Job<R>>>) {
    loop {
        // Take the dequeue lock only long enough to pull one job; the task
        // body runs with the lock released so up to `size` bodies execute
        // concurrently.
        let job = {
            let queue = rx.lock();
            queue.recv()
        };
        let Ok(job) = job else {
            break;
        };

        let outcome = match catch_unwind(AssertUnwindSafe(|| runner.run(job.input))) {
            Ok(output) => Ok(output),
            Err(payload) => {
                let message = panic_message(&payload);
                warn!(worker = id, panic = %message, "task body panicked");
                Err(TaskError::Panicked(message))
            }
        };

        if job.reply.send(outcome).is_err() {
            debug!(worker = id, "submitter gave up before the task finished");
        }
    }
    debug!(worker = id, "worker thread exiting");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "opaque panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    struct DoublingRunner;

    impl TaskRunner for DoublingRunner {
        type Input = u64;
        type Output = u64;

        fn run(&mut self, input: u64) -> u64 {
            input * 2
        }
    }

    /// Tracks how many task bodies run at once and the high-water mark.
    struct InstrumentedRunner {
        active: Arc<AtomicUsize>,
        high_water: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
    }

    impl TaskRunner for InstrumentedRunner {
        type Input = Duration;
        type Output = ();

        fn run(&mut self, pause: Duration) {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.high_water.fetch_max(now, Ordering::SeqCst);
            thread::sleep(pause);
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn submit_returns_task_output() {
        let pool = TaskPool::start(2, |_| DoublingRunner).unwrap();
        let result = pool.submit(21).wait().await.unwrap();
        assert_eq!(result, 42);
    }

    #[test]
    fn concurrency_never_exceeds_pool_size() {
        let active = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        let pool = TaskPool::start(3, |_| InstrumentedRunner {
            active: Arc::clone(&active),
            high_water: Arc::clone(&high_water),
            calls: Arc::clone(&calls),
        })
        .unwrap();

        let tickets: Vec<_> = (0..12)
            .map(|_| pool.submit(Duration::from_millis(20)))
            .collect();
        for ticket in tickets {
            ticket.wait_blocking().unwrap();
        }

        assert!(high_water.load(Ordering::SeqCst) <= 3);
        assert_eq!(calls.load(Ordering::SeqCst), 12);
    }

    #[test]
    fn shutdown_drains_all_accepted_tasks() {
        let active = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        let pool = TaskPool::start(2, |_| InstrumentedRunner {
            active: Arc::clone(&active),
            high_water: Arc::clone(&high_water),
            calls: Arc::clone(&calls),
        })
        .unwrap();

        let tickets: Vec<_> = (0..8)
            .map(|_| pool.submit(Duration::from_millis(10)))
            .collect();

        // Returns only after every queued task has completed.
        pool.shutdown();
        assert_eq!(calls.load(Ordering::SeqCst), 8);

        for ticket in tickets {
            ticket.wait_blocking().unwrap();
        }
    }

    #[test]
    fn submit_after_shutdown_fails_without_running() {
        let pool = TaskPool::start(1, |_| DoublingRunner).unwrap();
        pool.shutdown();

        let err = pool.submit(1).wait_blocking().unwrap_err();
        assert_eq!(err, TaskError::ShutDown);
    }

    struct PanickyRunner;

    impl TaskRunner for PanickyRunner {
        type Input = bool;
        type Output = u64;

        fn run(&mut self, explode: bool) -> u64 {
            assert!(!explode, "boom");
            7
        }
    }

    #[tokio::test]
    async fn panicking_task_fails_its_ticket_but_not_the_pool() {
        let pool = TaskPool::start(1, |_| PanickyRunner).unwrap();

        let err = pool.submit(true).wait().await.unwrap_err();
        assert!(matches!(err, TaskError::Panicked(_)));

        // The single worker survived the panic and still serves tasks.
        let ok = pool.submit(false).wait().await.unwrap();
        assert_eq!(ok, 7);
    }

    #[test]
    fn tasks_dequeue_in_submission_order() {
        let order = Arc::new(Mutex::new(Vec::new()));

        struct RecordingRunner {
            order: Arc<Mutex<Vec<u64>>>,
        }

        impl TaskRunner for RecordingRunner {
            type Input = u64;
            type Output = ();

            fn run(&mut self, input: u64) {
                self.order.lock().push(input);
            }
        }

        // A single worker makes dequeue order observable as run order.
        let pool = TaskPool::start(1, |_| RecordingRunner {
            order: Arc::clone(&order),
        })
        .unwrap();

        let tickets: Vec<_> = (0..6).map(|n| pool.submit(n)).collect();
        for ticket in tickets {
            ticket.wait_blocking().unwrap();
        }

        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4, 5]);
    }
}
