//! Run and Replay commands.
//!
//! Both feed a [`Dispatcher`] whose worker writes every dispatched document
//! to stdout, so an external analyzer can sit at the other end of a pipe.
//! Progress and statistics go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::command::IndexerCommand;
use crate::config::Settings;
use crate::dispatch::{DispatchConfig, DispatchStats, Dispatcher, StdoutWorker};
use crate::expansion::ProjectExpander;
use crate::queue::{CommandQueue, QueueConfig, load_snapshot, save_snapshot};

/// Arguments for the run command.
pub struct RunArgs {
    pub root: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
    pub workers: Option<usize>,
    pub max_bytes: Option<usize>,
}

/// Expand the project, snapshot the job list if asked, then dispatch.
pub fn run(args: RunArgs, settings: &Settings) -> Result<()> {
    let RunArgs {
        root,
        snapshot,
        workers,
        max_bytes,
    } = args;

    let root = root.unwrap_or_else(|| settings.project_root());
    let expander = ProjectExpander::new(settings, &root)
        .with_context(|| format!("Cannot expand {}", root.display()))?;
    let commands = expander.expand();
    crate::log_event!("run", "expanded", "{} commands from {}", commands.len(), root.display());

    if let Some(path) = snapshot.or_else(|| settings.queue.snapshot_path.clone()) {
        let documents: Vec<_> = commands.iter().map(IndexerCommand::serialize).collect();
        save_snapshot(&path, &documents)?;
        eprintln!("Saved {} commands to {}", documents.len(), path.display());
    }

    let mut queue_config = QueueConfig::from_settings(settings);
    if let Some(max_bytes) = max_bytes {
        queue_config = queue_config.with_max_bytes(max_bytes);
    }
    let stats = dispatch(commands, queue_config, workers, settings)?;
    report(&stats);
    Ok(())
}

/// Dispatch the commands stored in a snapshot file.
///
/// The snapshot is restored straight into the queue; whatever does not fit
/// is fed through the producer afterwards, keeping snapshot order.
pub fn replay(snapshot: PathBuf, workers: Option<usize>, settings: &Settings) -> Result<()> {
    let restored = load_snapshot(&snapshot)?;
    for skipped in &restored.skipped {
        eprintln!("Skipping entry {}: {}", skipped.position, skipped.error);
    }
    eprintln!(
        "Loaded {} commands from {}",
        restored.commands.len(),
        snapshot.display()
    );

    let queue = Arc::new(CommandQueue::new(QueueConfig::from_settings(settings)));
    let outcome = queue.restore(restored);
    for duplicate in &outcome.duplicates {
        eprintln!("Skipping duplicate entry for {}", duplicate.source_file_path());
    }

    let stats = dispatcher(queue, workers, settings).run(outcome.overflow, Arc::new(StdoutWorker))?;
    report(&stats);
    Ok(())
}

fn dispatch(
    commands: Vec<IndexerCommand>,
    queue_config: QueueConfig,
    workers: Option<usize>,
    settings: &Settings,
) -> Result<DispatchStats> {
    let queue = Arc::new(CommandQueue::new(queue_config));
    let stats = dispatcher(queue, workers, settings).run(commands, Arc::new(StdoutWorker))?;
    Ok(stats)
}

fn dispatcher(queue: Arc<CommandQueue>, workers: Option<usize>, settings: &Settings) -> Dispatcher {
    let mut config = DispatchConfig::from_settings(settings);
    if let Some(workers) = workers {
        config = config.with_workers(workers);
    }
    Dispatcher::new(queue, config)
}

fn report(stats: &DispatchStats) {
    eprintln!(
        "Dispatched {} commands in {:.2?} ({} completed, {} failed, {} malformed, {} duplicates)",
        stats.dispatched(),
        stats.elapsed,
        stats.completed,
        stats.failed,
        stats.malformed,
        stats.duplicates
    );
    if stats.abandoned > 0 {
        eprintln!("Abandoned {} commands: no worker left", stats.abandoned);
    }
    eprintln!(
        "Peak queue usage: {} bytes, {} push retries",
        stats.peak_byte_usage, stats.push_retries
    );
}
