//! Execution contexts for stream delivery
//!
//! The view context is a single queue drained by whoever owns the host loop;
//! everything a view renders arrives through it, in order. Computation work
//! (async diffing, repository calls) runs on a serial tokio task.

use std::sync::Arc;

use tokio::sync::mpsc;

/// A unit of work handed to a scheduler
pub type Job = Box<dyn FnOnce() + Send>;

pub trait Scheduler: Send + Sync {
    /// Queue `job` for execution. Jobs submitted from one thread run in
    /// submission order.
    fn schedule(&self, job: Job);

    fn name(&self) -> &'static str;
}

pub type SchedulerRef = Arc<dyn Scheduler>;

/// Runs every job inline on the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl Scheduler for Immediate {
    fn schedule(&self, job: Job) {
        job()
    }

    fn name(&self) -> &'static str {
        "immediate"
    }
}

pub fn immediate() -> SchedulerRef {
    Arc::new(Immediate)
}

// ─────────────────────────────────────────────────────────────────
// View queue
// ─────────────────────────────────────────────────────────────────

/// Submitting half of the view queue
#[derive(Debug, Clone)]
pub struct ViewScheduler {
    tx: mpsc::UnboundedSender<Job>,
}

impl Scheduler for ViewScheduler {
    fn schedule(&self, job: Job) {
        if self.tx.send(job).is_err() {
            tracing::trace!("view queue closed, dropping job");
        }
    }

    fn name(&self) -> &'static str {
        "view"
    }
}

/// Draining half of the view queue, owned by the host loop
#[derive(Debug)]
pub struct ViewReceiver {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl ViewReceiver {
    /// Wait for the next job
    pub async fn recv(&mut self) -> Option<Job> {
        self.rx.recv().await
    }

    /// Run everything currently queued, including jobs queued by the jobs
    /// themselves. Returns the number of jobs run.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }
}

/// Create the view queue pair
pub fn view_queue() -> (ViewScheduler, ViewReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ViewScheduler { tx }, ViewReceiver { rx })
}

// ─────────────────────────────────────────────────────────────────
// Serial executor
// ─────────────────────────────────────────────────────────────────

/// Runs jobs one at a time, in order, on a dedicated tokio task
#[derive(Debug, Clone)]
pub struct SerialExecutor {
    tx: mpsc::UnboundedSender<Job>,
}

impl SerialExecutor {
    pub fn spawn(handle: &tokio::runtime::Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        handle.spawn(async move {
            while let Some(job) = rx.recv().await {
                job();
            }
            tracing::debug!("serial executor stopped");
        });
        Self { tx }
    }
}

impl Scheduler for SerialExecutor {
    fn schedule(&self, job: Job) {
        if self.tx.send(job).is_err() {
            tracing::warn!("serial executor gone, dropping job");
        }
    }

    fn name(&self) -> &'static str {
        "computation"
    }
}
