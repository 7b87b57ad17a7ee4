//! Dispatch loop
//!
//! Moves commands from the producer through the byte-budgeted queue to
//! workers.
//!
//! ## Architecture
//!
//! ```text
//! PRODUCE ──push──▶ CommandQueue ──pop──▶ WORKER × N ──outcome──▶ COLLECT
//!    │  QueueFull: sleep + retry          │ serialize → JSON → decode
//!    ▼                                    ▼
//! [commands]                           CommandWorker
//! ```
//!
//! - **PRODUCE**: single thread; owns backoff when the queue is full and
//!   never drops a command. Stops early only when no worker is left to
//!   drain the queue; the rest are counted as abandoned.
//! - **WORKER**: N threads polling the queue. Each popped command is turned
//!   into its JSON payload before the worker sees it, so the document is
//!   the only thing that crosses the boundary.
//!   A panic inside one job is caught and reported as a failed job.
//! - **COLLECT**: the calling thread, tallying [`JobOutcome`]s.

pub mod worker;

pub use worker::{CommandWorker, JobOutcome, LoggingWorker, StdoutWorker, WorkerError, execute_payload};

use crate::Settings;
use crate::command::IndexerCommand;
use crate::queue::{CommandQueue, QueueError};
use crate::types::FilePath;
use crossbeam_channel::unbounded;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("{stage} thread panicked")]
    ThreadPanicked { stage: &'static str },
}

pub type DispatchResult<T> = Result<T, DispatchError>;

/// Threading and backoff for the dispatch loop.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Number of worker threads
    pub workers: usize,

    /// Sleep between polls of an empty queue
    pub idle_backoff: Duration,

    /// Sleep before retrying a push rejected with `QueueFull`
    pub push_retry: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().saturating_sub(1).max(1),
            idle_backoff: Duration::from_millis(5),
            push_retry: Duration::from_millis(5),
        }
    }
}

impl DispatchConfig {
    /// Read `[dispatch]` from settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            workers: settings.dispatch.workers.max(1),
            idle_backoff: Duration::from_millis(settings.dispatch.idle_backoff_ms),
            push_retry: Duration::from_millis(settings.dispatch.push_retry_ms),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

/// Counters from one dispatch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Commands accepted by the queue
    pub submitted: usize,
    /// Commands rejected because their path was already queued
    pub duplicates: usize,
    /// Pushes retried after `QueueFull`
    pub push_retries: usize,
    pub completed: usize,
    pub failed: usize,
    pub malformed: usize,
    /// Commands never handed to a worker because every worker had exited
    pub abandoned: usize,
    /// Highest byte usage observed after a push
    pub peak_byte_usage: usize,
    pub elapsed: Duration,
}

impl DispatchStats {
    /// Commands that reached a worker.
    pub fn dispatched(&self) -> usize {
        self.completed + self.failed + self.malformed
    }
}

#[derive(Debug, Default)]
struct ProducerStats {
    submitted: usize,
    duplicates: usize,
    push_retries: usize,
    abandoned: usize,
}

/// Counts a worker thread as alive until it exits, panicking or not.
struct AliveGuard(Arc<AtomicUsize>);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Runs commands through a [`CommandQueue`] to a worker pool.
pub struct Dispatcher {
    queue: Arc<CommandQueue>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(queue: Arc<CommandQueue>, config: DispatchConfig) -> Self {
        Self { queue, config }
    }

    pub fn with_settings(settings: &Settings) -> Self {
        Self::new(
            Arc::new(CommandQueue::with_settings(settings)),
            DispatchConfig::from_settings(settings),
        )
    }

    pub fn queue(&self) -> &Arc<CommandQueue> {
        &self.queue
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Dispatch every command and wait until all of them are handled.
    pub fn run<I, W>(&self, commands: I, worker: Arc<W>) -> DispatchResult<DispatchStats>
    where
        I: IntoIterator<Item = IndexerCommand>,
        I::IntoIter: Send + 'static,
        W: CommandWorker + 'static,
    {
        let start = Instant::now();
        let producer_done = Arc::new(AtomicBool::new(false));
        let peak = Arc::new(AtomicUsize::new(self.queue.byte_usage()));
        let workers_alive = Arc::new(AtomicUsize::new(self.config.workers));

        // Stage 1: PRODUCE
        let producer_handle = {
            let queue = Arc::clone(&self.queue);
            let producer_done = Arc::clone(&producer_done);
            let peak = Arc::clone(&peak);
            let workers_alive = Arc::clone(&workers_alive);
            let retry = self.config.push_retry;
            let commands = commands.into_iter();
            thread::spawn(move || {
                let stats = produce(&queue, commands, retry, &peak, &workers_alive);
                producer_done.store(true, Ordering::Release);
                stats
            })
        };

        // Stage 2: WORKERS
        let (outcome_tx, outcome_rx) = unbounded();
        let worker_handles: Vec<_> = (0..self.config.workers)
            .map(|_| {
                let queue = Arc::clone(&self.queue);
                let producer_done = Arc::clone(&producer_done);
                let worker = Arc::clone(&worker);
                let tx = outcome_tx.clone();
                let idle = self.config.idle_backoff;
                let alive = AliveGuard(Arc::clone(&workers_alive));
                thread::spawn(move || {
                    let _alive = alive;
                    loop {
                        match queue.pop() {
                            Some(command) => {
                                let path = command.source_file_path().clone();
                                // Only the payload travels on from here
                                let payload = command.serialize().to_json();
                                drop(command);
                                let outcome = run_job(&payload, worker.as_ref(), path);
                                if tx.send(outcome).is_err() {
                                    break;
                                }
                            }
                            None if producer_done.load(Ordering::Acquire) && queue.is_empty() => {
                                break;
                            }
                            None => thread::sleep(idle),
                        }
                    }
                })
            })
            .collect();
        drop(outcome_tx);

        // Stage 3: COLLECT
        let mut stats = DispatchStats::default();
        for outcome in outcome_rx {
            match outcome {
                JobOutcome::Completed { .. } => stats.completed += 1,
                JobOutcome::Failed { .. } => stats.failed += 1,
                JobOutcome::Malformed { .. } => stats.malformed += 1,
            }
        }

        let produced = producer_handle
            .join()
            .map_err(|_| DispatchError::ThreadPanicked { stage: "PRODUCE" })?;
        for handle in worker_handles {
            handle
                .join()
                .map_err(|_| DispatchError::ThreadPanicked { stage: "WORKER" })?;
        }

        stats.submitted = produced.submitted;
        stats.duplicates = produced.duplicates;
        stats.push_retries = produced.push_retries;
        // Left behind by workers that exited early
        stats.abandoned = produced.abandoned + self.queue.clear().len();
        stats.peak_byte_usage = peak.load(Ordering::Relaxed);
        stats.elapsed = start.elapsed();

        crate::log_event!(
            "dispatch",
            "finished",
            "{} dispatched ({} completed, {} failed, {} malformed) in {:?}",
            stats.dispatched(),
            stats.completed,
            stats.failed,
            stats.malformed,
            stats.elapsed
        );
        if stats.abandoned > 0 {
            tracing::warn!(
                "[dispatch] {} commands abandoned, no worker left",
                stats.abandoned
            );
        }
        Ok(stats)
    }
}

/// Execute one payload, turning a panic in the worker into a failed job.
fn run_job(payload: &str, worker: &dyn CommandWorker, path: FilePath) -> JobOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| execute_payload(payload, worker))) {
        Ok(outcome) => outcome,
        Err(cause) => {
            let reason = cause
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| cause.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::warn!("[dispatch] worker panicked on {path}: {reason}");
            JobOutcome::Failed {
                path,
                reason: format!("worker panicked: {reason}"),
            }
        }
    }
}

/// Push every command, sleeping and retrying while the queue is full.
///
/// Gives up once `workers_alive` drops to zero; whatever is still pending
/// is counted as abandoned.
fn produce(
    queue: &CommandQueue,
    mut commands: impl Iterator<Item = IndexerCommand>,
    retry: Duration,
    peak: &AtomicUsize,
    workers_alive: &AtomicUsize,
) -> ProducerStats {
    let mut stats = ProducerStats::default();

    while let Some(command) = commands.next() {
        let mut pending = command;
        loop {
            if workers_alive.load(Ordering::Acquire) == 0 {
                stats.abandoned += 1 + commands.by_ref().count();
                return stats;
            }
            match queue.push(pending) {
                Ok(()) => {
                    stats.submitted += 1;
                    peak.fetch_max(queue.byte_usage(), Ordering::Relaxed);
                    break;
                }
                Err(QueueError::QueueFull { command, .. }) => {
                    stats.push_retries += 1;
                    pending = *command;
                    thread::sleep(retry);
                }
                Err(err @ QueueError::DuplicateCommand { .. }) => {
                    tracing::warn!("[dispatch] {err}");
                    stats.duplicates += 1;
                    break;
                }
            }
        }
    }

    stats
}
