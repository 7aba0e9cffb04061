use crate::scraping::ScraperError;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Fixed-size set of OS threads for one phase of one job. Each task runs on
/// its own worker; results are handed back over a channel as they finish.
pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(label: &str, workers: usize) -> Result<Self, ScraperError> {
        let workers = workers.max(1);
        let prefix = label.to_string();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("{prefix}-{i}"))
            .build()
            .map_err(|e| ScraperError::Pool(format!("{label}: {e}")))?;

        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queues `task` once per input. A panicking task is reported as a
    /// `TaskFailure` for its input instead of taking the worker down.
    ///
    /// Inputs still queued when the `Completions` is dropped (or
    /// `abandon` is called) are never started.
    pub fn dispatch<K, R, F>(&self, inputs: Vec<K>, task: F) -> Completions<K, R>
    where
        K: Clone + Send + 'static,
        R: Send + 'static,
        F: Fn(&K) -> R + Send + Sync + 'static,
    {
        let task = Arc::new(task);
        let ledger = Arc::new(Mutex::new(Ledger::default()));
        let (tx, rx) = mpsc::channel();
        let pending = inputs.len();

        for (id, input) in inputs.into_iter().enumerate() {
            lock(&ledger).queued.insert(id, input.clone());

            let tx = tx.clone();
            let task = Arc::clone(&task);
            let ledger = Arc::clone(&ledger);
            self.pool.spawn(move || {
                if !lock(&ledger).start(id) {
                    return;
                }
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(&input)))
                    .map_err(TaskFailure::from_panic);
                let late = lock(&ledger).finish(id);
                // The consumer may have stopped listening; the result is dropped then.
                let _ = tx.send(Done {
                    key: input,
                    outcome,
                    late,
                });
            });
        }

        Completions {
            rx,
            ledger,
            pending,
        }
    }
}

/// A task that panicked instead of returning.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFailure {
    pub message: String,
}

impl TaskFailure {
    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self {
            message: panic_message(payload.as_ref()),
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task panicked: {}", self.message)
    }
}

impl std::error::Error for TaskFailure {}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct Running<K> {
    key: K,
    started: Instant,
    overdue: bool,
}

/// Which inputs of one dispatch are waiting, running or given up on.
struct Ledger<K> {
    queued: HashMap<usize, K>,
    running: HashMap<usize, Running<K>>,
    closed: bool,
}

impl<K> Default for Ledger<K> {
    fn default() -> Self {
        Self {
            queued: HashMap::new(),
            running: HashMap::new(),
            closed: false,
        }
    }
}

impl<K> Ledger<K> {
    /// False when the input was abandoned before a worker reached it.
    fn start(&mut self, id: usize) -> bool {
        if self.closed {
            return false;
        }
        match self.queued.remove(&id) {
            Some(key) => {
                self.running.insert(
                    id,
                    Running {
                        key,
                        started: Instant::now(),
                        overdue: false,
                    },
                );
                true
            }
            None => false,
        }
    }

    /// True when the consumer already gave up on this task.
    fn finish(&mut self, id: usize) -> bool {
        self.running.remove(&id).map_or(false, |r| r.overdue)
    }
}

fn lock<K>(ledger: &Mutex<Ledger<K>>) -> MutexGuard<'_, Ledger<K>> {
    ledger.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Done<K, R> {
    key: K,
    outcome: Result<R, TaskFailure>,
    late: bool,
}

pub enum Received<K, R> {
    Finished(K, Result<R, TaskFailure>),
    /// Ran longer than the allowed time. Its result, if it ever comes, is
    /// dropped.
    Overdue(K),
    Drained,
}

/// Results of one `dispatch`, first finished first.
pub struct Completions<K, R> {
    rx: Receiver<Done<K, R>>,
    ledger: Arc<Mutex<Ledger<K>>>,
    pending: usize,
}

impl<K: Clone, R> Completions<K, R> {
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Blocks for the next finished task. With `limit`, each task is allowed
    /// that long from the moment a worker picked it up; a task past its
    /// deadline is reported as `Overdue` and the others keep going.
    pub fn next_within(&mut self, limit: Option<Duration>) -> Received<K, R> {
        loop {
            if self.pending == 0 {
                return Received::Drained;
            }

            let wait = match limit {
                Some(limit) => match self.take_overdue(limit) {
                    Ok(key) => {
                        self.pending -= 1;
                        return Received::Overdue(key);
                    }
                    Err(wait) => Some(wait),
                },
                None => None,
            };

            let received = match wait {
                Some(wait) => self.rx.recv_timeout(wait),
                None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(done) if done.late => continue,
                Ok(done) => {
                    self.pending -= 1;
                    return Received::Finished(done.key, done.outcome);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Received::Drained,
            }
        }
    }

    /// Marks the longest-running task past `limit` as overdue, or returns
    /// how long until the next deadline. Nothing running means nothing can
    /// expire yet, so the wait is one full `limit`.
    fn take_overdue(&self, limit: Duration) -> Result<K, Duration> {
        let mut ledger = lock(&self.ledger);
        let now = Instant::now();

        let oldest = ledger
            .running
            .iter_mut()
            .filter(|(_, r)| !r.overdue)
            .min_by_key(|(_, r)| r.started);

        match oldest {
            Some((_, running)) if now.duration_since(running.started) >= limit => {
                running.overdue = true;
                Ok(running.key.clone())
            }
            Some((_, running)) => Err(limit - now.duration_since(running.started)),
            None => Err(limit),
        }
    }
}

impl<K, R> Completions<K, R> {
    /// Stops every input that has not started yet. Running tasks finish on
    /// their own.
    pub fn abandon(&mut self) {
        let mut ledger = lock(&self.ledger);
        ledger.closed = true;
        ledger.queued.clear();
    }
}

impl<K, R> Drop for Completions<K, R> {
    fn drop(&mut self) {
        self.abandon();
    }
}

impl<K: Clone, R> Iterator for Completions<K, R> {
    type Item = (K, Result<R, TaskFailure>);

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_within(None) {
            Received::Finished(key, outcome) => Some((key, outcome)),
            Received::Overdue(_) | Received::Drained => None,
        }
    }
}
