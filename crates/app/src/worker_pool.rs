//! Fixed-size worker pool draining a single priority queue.
//!
//! Workers are plain OS threads. Jobs of higher [`JobPriority`] always start
//! before lower ones; jobs of equal priority start in submission order. A
//! job that panics is logged and discarded, and its worker moves on.
//!
//! Stopping uses a **full drain** policy: [`WorkerPool::stop`] lets the
//! workers finish every queued job, including follow-ups those jobs enqueue,
//! before the threads exit. Submissions are accepted while anything is still
//! queued or running and rejected once the pool has drained.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use homecore_domain::event::{
    EVENT_CALL_SERVICE, EVENT_SERVICE_EXECUTED, EVENT_STATE_CHANGED, EVENT_TIME_CHANGED,
};
use parking_lot::{Condvar, Mutex};

/// Backlog per worker above which the pool reports itself as busy.
const BUSY_JOBS_PER_WORKER: usize = 3;

/// Scheduling priority of a job, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobPriority {
    Callback,
    Service,
    State,
    Time,
    /// Best-effort work.
    Default,
}

impl JobPriority {
    /// Priority for work triggered by an event of the given type.
    #[must_use]
    pub fn from_event_type(event_type: &str) -> Self {
        match event_type {
            EVENT_SERVICE_EXECUTED => Self::Callback,
            EVENT_CALL_SERVICE => Self::Service,
            EVENT_STATE_CHANGED => Self::State,
            EVENT_TIME_CHANGED => Self::Time,
            _ => Self::Default,
        }
    }
}

/// A unit of work with a label used in diagnostics.
pub struct Job {
    label: String,
    run: Box<dyn FnOnce() + Send>,
}

impl Job {
    pub fn new(label: impl Into<String>, run: impl FnOnce() + Send + 'static) -> Self {
        Self {
            label: label.into(),
            run: Box::new(run),
        }
    }

    /// A job calling `run(arg)`.
    pub fn with_arg<A: Send + 'static>(
        label: impl Into<String>,
        run: impl FnOnce(A) + Send + 'static,
        arg: A,
    ) -> Self {
        Self::new(label, move || run(arg))
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("label", &self.label).finish()
    }
}

/// Lifecycle of a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    /// Built, no worker threads yet. Jobs are queued.
    Created,
    Running,
    /// Draining the queue before the workers exit.
    Stopping,
    Stopped,
}

/// Counters since the pool was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: u64,
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
}

struct Queued {
    priority: JobPriority,
    seq: u64,
    job: Job,
}

// BinaryHeap pops the greatest element: lowest priority rank, then lowest seq.
impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Queued {}

struct Inner {
    status: PoolStatus,
    queue: BinaryHeap<Queued>,
    next_seq: u64,
    /// Label of the job each busy worker is running.
    in_progress: HashMap<usize, String>,
    busy_warning_limit: usize,
    stats: PoolStats,
}

impl Inner {
    fn is_quiescent(&self) -> bool {
        self.queue.is_empty() && self.in_progress.is_empty()
    }
}

struct Shared {
    name: String,
    inner: Mutex<Inner>,
    work_ready: Condvar,
    quiescent: Condvar,
}

/// Bounded set of workers draining a priority queue.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a pool of `workers` threads (at least one). Nothing runs until
    /// [`start`](Self::start).
    #[must_use]
    pub fn new(name: impl Into<String>, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                inner: Mutex::new(Inner {
                    status: PoolStatus::Created,
                    queue: BinaryHeap::new(),
                    next_seq: 0,
                    in_progress: HashMap::new(),
                    busy_warning_limit: workers * BUSY_JOBS_PER_WORKER,
                    stats: PoolStats::default(),
                }),
                work_ready: Condvar::new(),
                quiescent: Condvar::new(),
            }),
            workers,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the worker threads. Jobs queued before this call start now.
    ///
    /// Starting a pool that is not in [`PoolStatus::Created`] does nothing.
    ///
    /// # Errors
    ///
    /// Returns the OS error if a worker thread cannot be spawned.
    pub fn start(&self) -> std::io::Result<()> {
        {
            let mut inner = self.shared.inner.lock();
            if inner.status != PoolStatus::Created {
                tracing::warn!(
                    pool = %self.shared.name,
                    status = ?inner.status,
                    "worker pool already started"
                );
                return Ok(());
            }
            inner.status = PoolStatus::Running;
        }

        let mut handles = self.handles.lock();
        for index in 0..self.workers {
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name(format!("{}-worker-{index}", self.shared.name))
                .spawn(move || worker_loop(&shared, index))?;
            handles.push(handle);
        }
        tracing::debug!(pool = %self.shared.name, workers = self.workers, "worker pool started");
        Ok(())
    }

    /// Queue a job. Never blocks.
    ///
    /// Returns `false` when the job was dropped: the pool is stopped, or it
    /// is stopping and has already drained.
    pub fn add_job(&self, priority: JobPriority, job: Job) -> bool {
        let mut inner = self.shared.inner.lock();
        let accepting = match inner.status {
            PoolStatus::Created | PoolStatus::Running => true,
            // Jobs still draining may queue follow-ups.
            PoolStatus::Stopping => !inner.is_quiescent(),
            PoolStatus::Stopped => false,
        };
        if !accepting {
            tracing::warn!(
                pool = %self.shared.name,
                job = %job.label,
                "worker pool stopped, dropping job"
            );
            return false;
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.stats.submitted += 1;
        inner.queue.push(Queued { priority, seq, job });

        if inner.queue.len() > inner.busy_warning_limit {
            let running: Vec<&str> = inner.in_progress.values().map(String::as_str).collect();
            tracing::warn!(
                pool = %self.shared.name,
                queued = inner.queue.len(),
                in_progress = ?running,
                "worker pool is busy"
            );
            inner.busy_warning_limit *= 2;
        }

        self.shared.work_ready.notify_one();
        true
    }

    /// Block until the queue is empty and no worker is running a job,
    /// including jobs enqueued by running jobs.
    ///
    /// Returns immediately when no workers are running, since nothing could
    /// drain the queue. Must not be called from inside a job: the calling
    /// worker counts as busy and the barrier would never be reached.
    pub fn block_till_done(&self) {
        let mut inner = self.shared.inner.lock();
        while !inner.is_quiescent() {
            if !matches!(inner.status, PoolStatus::Running | PoolStatus::Stopping) {
                tracing::warn!(
                    pool = %self.shared.name,
                    queued = inner.queue.len(),
                    "no running workers, not waiting for queued jobs"
                );
                return;
            }
            self.shared.quiescent.wait(&mut inner);
        }
    }

    /// Drain every queued job and its follow-ups, then stop and join the
    /// workers.
    ///
    /// A pool that was never started drops its queued jobs. Called from
    /// inside a job, this only starts the drain: the workers exit on their
    /// own once everything else has finished.
    pub fn stop(&self) {
        {
            let mut inner = self.shared.inner.lock();
            match inner.status {
                PoolStatus::Created => {
                    if !inner.queue.is_empty() {
                        tracing::warn!(
                            pool = %self.shared.name,
                            dropped = inner.queue.len(),
                            "worker pool stopped before it started"
                        );
                        inner.queue.clear();
                    }
                    inner.status = PoolStatus::Stopped;
                    return;
                }
                PoolStatus::Running => inner.status = PoolStatus::Stopping,
                PoolStatus::Stopping | PoolStatus::Stopped => {}
            }
            self.shared.work_ready.notify_all();
        }

        let handles = {
            let mut handles = self.handles.lock();
            let current = thread::current().id();
            if handles.iter().any(|handle| handle.thread().id() == current) {
                return;
            }
            std::mem::take(&mut *handles)
        };
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!(pool = %self.shared.name, "worker thread panicked");
            }
        }

        let mut inner = self.shared.inner.lock();
        inner.status = PoolStatus::Stopped;
        tracing::debug!(pool = %self.shared.name, stats = ?inner.stats, "worker pool stopped");
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        self.shared.inner.lock().status
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.shared.inner.lock().stats
    }

    /// Number of jobs waiting to start.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.inner.lock().queue.len()
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if matches!(self.status(), PoolStatus::Running | PoolStatus::Stopping) {
            self.stop();
        }
    }
}

fn worker_loop(shared: &Shared, index: usize) {
    loop {
        let Job { label, run } = {
            let mut inner = shared.inner.lock();
            loop {
                if let Some(next) = inner.queue.pop() {
                    inner.in_progress.insert(index, next.job.label.clone());
                    inner.stats.started += 1;
                    break next.job;
                }
                match inner.status {
                    PoolStatus::Running => {}
                    // Another worker may still enqueue follow-ups.
                    PoolStatus::Stopping if !inner.in_progress.is_empty() => {}
                    _ => {
                        inner.status = PoolStatus::Stopped;
                        shared.work_ready.notify_all();
                        return;
                    }
                }
                shared.work_ready.wait(&mut inner);
            }
        };

        let outcome = catch_unwind(AssertUnwindSafe(run));
        if let Err(payload) = &outcome {
            tracing::error!(
                pool = %shared.name,
                job = %label,
                panic = panic_message(payload.as_ref()),
                "job panicked"
            );
        }

        let mut inner = shared.inner.lock();
        inner.in_progress.remove(&index);
        if outcome.is_ok() {
            inner.stats.completed += 1;
        } else {
            inner.stats.failed += 1;
        }
        if inner.is_quiescent() {
            shared.quiescent.notify_all();
            if inner.status == PoolStatus::Stopping {
                shared.work_ready.notify_all();
            }
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
