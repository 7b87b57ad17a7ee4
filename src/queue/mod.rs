//! Byte-budgeted FIFO of pending indexer commands.
//!
//! The queue sits between project expansion (one producer) and worker
//! dispatch (one or more consumers). It bounds memory by the estimated
//! serialized size of the commands it holds rather than by their count,
//! since a single C++ command with a large flag list can outweigh hundreds
//! of small Python ones.
//!
//! ## Admission
//!
//! ```text
//! push(c): empty queue            -> accept (even if c alone exceeds max)
//!          used + size(c) <= max  -> accept
//!          otherwise              -> QueueFull, command handed back
//! ```
//!
//! Commands are handed out in submission order. The queue knows nothing
//! about languages; it only uses the base command contract.

pub mod error;
pub mod snapshot;

pub use error::{QueueError, QueueResult};
pub use snapshot::{RestoredCommands, SkippedDocument, SnapshotError, load_snapshot, save_snapshot};

use crate::Settings;
use crate::command::IndexerCommand;
use crate::document::Document;
use crate::types::FilePath;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};

/// Queue limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Ceiling on the summed estimates of queued commands.
    pub max_bytes: usize,

    /// Per-string overhead handed to the size estimator.
    pub string_overhead: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_bytes: 64 * 1024 * 1024,
            string_overhead: 24,
        }
    }
}

impl QueueConfig {
    /// Read `[queue]` from settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_bytes: settings.queue.max_bytes,
            string_overhead: settings.queue.string_overhead_bytes,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_string_overhead(mut self, overhead: usize) -> Self {
        self.string_overhead = overhead;
        self
    }
}

/// A command together with the estimate charged when it was admitted.
#[derive(Debug)]
struct QueuedCommand {
    command: IndexerCommand,
    byte_size: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    entries: VecDeque<QueuedCommand>,
    /// Sum of `byte_size` over `entries`.
    byte_usage: usize,
    /// Source paths of `entries`.
    paths: HashSet<FilePath>,
}

impl QueueState {
    fn take_at(&mut self, index: usize) -> Option<IndexerCommand> {
        let entry = self.entries.remove(index)?;
        self.byte_usage -= entry.byte_size;
        self.paths.remove(entry.command.source_file_path());
        Some(entry.command)
    }
}

/// Result of [`CommandQueue::restore`].
#[derive(Debug, Default)]
pub struct RestoreOutcome {
    /// Commands now queued
    pub admitted: usize,
    /// Commands that did not fit, in snapshot order
    pub overflow: Vec<IndexerCommand>,
    /// Commands whose path was already queued
    pub duplicates: Vec<IndexerCommand>,
}

/// Thread-safe, byte-budgeted command queue.
///
/// One lock guards the entries, the byte counter and the path index, so
/// `byte_usage()` always equals the sum of the stored estimates.
#[derive(Debug)]
pub struct CommandQueue {
    config: QueueConfig,
    state: Mutex<QueueState>,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl CommandQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            state: Mutex::new(QueueState::default()),
        }
    }

    pub fn with_settings(settings: &Settings) -> Self {
        Self::new(QueueConfig::from_settings(settings))
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn max_bytes(&self) -> usize {
        self.config.max_bytes
    }

    pub fn string_overhead(&self) -> usize {
        self.config.string_overhead
    }

    /// Admit a command.
    ///
    /// The estimate is computed once, before taking the lock, and stored
    /// with the command so `pop` and `remove` subtract exactly what was
    /// added.
    pub fn push(&self, command: IndexerCommand) -> QueueResult<()> {
        let byte_size = command.byte_size(self.config.string_overhead);
        let mut state = self.state.lock();

        if state.paths.contains(command.source_file_path()) {
            return Err(QueueError::DuplicateCommand {
                command: Box::new(command),
            });
        }

        let over_budget = state.byte_usage.saturating_add(byte_size) > self.config.max_bytes;
        if over_budget && !state.entries.is_empty() {
            return Err(QueueError::QueueFull {
                command: Box::new(command),
                requested: byte_size,
                used: state.byte_usage,
                max: self.config.max_bytes,
            });
        }

        if over_budget {
            crate::debug_event!(
                "queue",
                "oversized",
                "{} ({byte_size} bytes) admitted into empty queue",
                command.source_file_path()
            );
        }

        state.byte_usage += byte_size;
        state.paths.insert(command.source_file_path().clone());
        state.entries.push_back(QueuedCommand { command, byte_size });
        Ok(())
    }

    /// Take the oldest command. Never blocks.
    pub fn pop(&self) -> Option<IndexerCommand> {
        self.state.lock().take_at(0)
    }

    /// Cancel a command that has not been handed out yet.
    pub fn remove(&self, source_file_path: &FilePath) -> Option<IndexerCommand> {
        let mut state = self.state.lock();
        if !state.paths.contains(source_file_path) {
            return None;
        }
        let index = state
            .entries
            .iter()
            .position(|e| e.command.source_file_path() == source_file_path)?;
        state.take_at(index)
    }

    pub fn contains(&self, source_file_path: &FilePath) -> bool {
        self.state.lock().paths.contains(source_file_path)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Sum of the estimates of all queued commands.
    pub fn byte_usage(&self) -> usize {
        self.state.lock().byte_usage
    }

    /// Drop every queued command, returning them in queue order.
    pub fn clear(&self) -> Vec<IndexerCommand> {
        let mut state = self.state.lock();
        state.byte_usage = 0;
        state.paths.clear();
        state.entries.drain(..).map(|e| e.command).collect()
    }

    /// Serialize the queued commands in dispatch order.
    ///
    /// This is the crash-recovery form: see [`save_snapshot`].
    pub fn snapshot(&self) -> Vec<Document> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|e| e.command.serialize())
            .collect()
    }

    /// Re-admit restored commands in snapshot order.
    ///
    /// Commands go through the normal admission rules. At the first
    /// `QueueFull` admission stops, so the commands after it are returned in
    /// order as `overflow` instead of overtaking it; the caller pushes them
    /// later. Duplicates are handed back as well.
    pub fn restore(&self, restored: RestoredCommands) -> RestoreOutcome {
        let mut outcome = RestoreOutcome::default();
        let mut commands = restored.commands.into_iter();

        while let Some(command) = commands.next() {
            match self.push(command) {
                Ok(()) => outcome.admitted += 1,
                Err(QueueError::DuplicateCommand { command }) => outcome.duplicates.push(*command),
                Err(QueueError::QueueFull { command, .. }) => {
                    outcome.overflow.push(*command);
                    outcome.overflow.extend(commands.by_ref());
                }
            }
        }

        crate::debug_event!(
            "queue",
            "restored",
            "{} admitted, {} overflow, {} duplicates",
            outcome.admitted,
            outcome.overflow.len(),
            outcome.duplicates.len()
        );
        outcome
    }

    #[cfg(test)]
    fn stored_sizes(&self) -> Vec<usize> {
        self.state.lock().entries.iter().map(|e| e.byte_size).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CxxCommand, JavaCommand, PythonCommand};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn path(s: &str) -> FilePath {
        FilePath::new(s).unwrap()
    }

    fn python(file: &str) -> IndexerCommand {
        IndexerCommand::new(path(file), PythonCommand::new())
    }

    fn assert_usage_invariant(queue: &CommandQueue) {
        let sum: usize = queue.stored_sizes().iter().sum();
        assert_eq!(queue.byte_usage(), sum);
    }

    #[test]
    fn test_fifo_order() {
        let queue = CommandQueue::default();
        queue.push(python("/a.py")).unwrap();
        queue.push(python("/b.py")).unwrap();
        queue.push(python("/c.py")).unwrap();

        let order: Vec<String> = std::iter::from_fn(|| queue.pop())
            .map(|c| c.source_file_path().to_string())
            .collect();
        assert_eq!(order, vec!["/a.py", "/b.py", "/c.py"]);
        assert!(queue.pop().is_none());
        assert_eq!(queue.byte_usage(), 0);
    }

    #[test]
    fn test_push_tracks_estimate() {
        let queue = CommandQueue::new(QueueConfig::default().with_string_overhead(8));
        let command = python("/a.py");
        let expected = command.byte_size(8);

        queue.push(command).unwrap();
        assert_eq!(queue.byte_usage(), expected);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_oversized_command_admitted_into_empty_queue() {
        let queue = CommandQueue::new(QueueConfig::default().with_max_bytes(10));
        queue.push(python("/a/very/long/path/module.py")).unwrap();
        assert!(queue.byte_usage() > queue.max_bytes());

        let err = queue.push(python("/b.py")).unwrap_err();
        assert!(err.is_full());
        assert_eq!(err.into_command().source_file_path().as_str(), "/b.py");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_exact_fit_is_admitted() {
        let first = python("/a.py");
        let second = python("/b.py");
        let max = first.byte_size(8) + second.byte_size(8);
        let queue = CommandQueue::new(QueueConfig { max_bytes: max, string_overhead: 8 });

        queue.push(first).unwrap();
        queue.push(second).unwrap();
        assert_eq!(queue.byte_usage(), max);
        assert!(queue.push(python("/c.py")).unwrap_err().is_full());
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let queue = CommandQueue::default();
        queue.push(python("/a.py")).unwrap();

        let err = queue
            .push(IndexerCommand::new(path("/a.py"), JavaCommand::new("17")))
            .unwrap_err();
        assert!(matches!(err, QueueError::DuplicateCommand { .. }));
        assert_eq!(queue.len(), 1);

        // Once popped, the path may be queued again
        queue.pop().unwrap();
        queue.push(python("/a.py")).unwrap();
    }

    #[test]
    fn test_remove_decrements_usage() {
        let queue = CommandQueue::default();
        queue.push(python("/a.py")).unwrap();
        queue.push(python("/bb.py")).unwrap();
        queue.push(python("/ccc.py")).unwrap();

        let removed = queue.remove(&path("/bb.py")).unwrap();
        assert_eq!(removed.source_file_path().as_str(), "/bb.py");
        assert!(!queue.contains(&path("/bb.py")));
        assert!(queue.remove(&path("/bb.py")).is_none());
        assert_usage_invariant(&queue);

        assert_eq!(queue.pop().unwrap().source_file_path().as_str(), "/a.py");
        assert_eq!(queue.pop().unwrap().source_file_path().as_str(), "/ccc.py");
    }

    #[test]
    fn test_usage_invariant_over_mixed_operations() {
        let queue = CommandQueue::new(QueueConfig::default().with_max_bytes(4096));
        let cxx = |file: &str, flags: usize| {
            IndexerCommand::new(
                path(file),
                CxxCommand::new(path("/p")).with_compiler_flags((0..flags).map(|i| format!("-DF{i}"))),
            )
        };

        queue.push(cxx("/p/a.cpp", 3)).unwrap();
        assert_usage_invariant(&queue);
        queue.push(python("/p/b.py")).unwrap();
        queue.push(cxx("/p/c.cpp", 10)).unwrap();
        assert_usage_invariant(&queue);
        queue.pop();
        assert_usage_invariant(&queue);
        queue.remove(&path("/p/c.cpp"));
        assert_usage_invariant(&queue);
        let _ = queue.push(cxx("/p/d.cpp", 500));
        assert_usage_invariant(&queue);
        queue.clear();
        assert_eq!(queue.byte_usage(), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_snapshot_in_queue_order() {
        let queue = CommandQueue::default();
        queue.push(python("/b.py")).unwrap();
        queue.push(python("/a.py")).unwrap();

        let documents = queue.snapshot();
        let paths: Vec<&str> = documents
            .iter()
            .map(|d| d.text("source_file_path").unwrap())
            .collect();
        assert_eq!(paths, vec!["/b.py", "/a.py"]);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_concurrent_push_pop_keeps_invariant() {
        let queue = Arc::new(CommandQueue::new(QueueConfig::default().with_max_bytes(2048)));
        let producer_done = Arc::new(AtomicBool::new(false));
        let total = 400;

        let producer = {
            let queue = Arc::clone(&queue);
            let producer_done = Arc::clone(&producer_done);
            thread::spawn(move || {
                let mut pending: VecDeque<IndexerCommand> =
                    (0..total).map(|i| python(&format!("/p/m{i}.py"))).collect();
                while let Some(command) = pending.pop_front() {
                    if let Err(err) = queue.push(command) {
                        pending.push_front(err.into_command());
                        thread::yield_now();
                    }
                }
                producer_done.store(true, Ordering::Release);
            })
        };

        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let producer_done = Arc::clone(&producer_done);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    loop {
                        match queue.pop() {
                            Some(c) => seen.push(c.source_file_path().clone()),
                            None if producer_done.load(Ordering::Acquire) => break,
                            None => thread::yield_now(),
                        }
                    }
                    seen
                })
            })
            .collect();

        producer.join().unwrap();
        let mut seen: Vec<FilePath> = consumers
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        seen.extend(std::iter::from_fn(|| queue.pop()).map(|c| c.source_file_path().clone()));

        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), total);
        assert_eq!(queue.byte_usage(), 0);
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let source = CommandQueue::default();
        for name in ["/p/c.py", "/p/a.py", "/p/b.py"] {
            source
                .push(IndexerCommand::new(FilePath::new(name).unwrap(), PythonCommand::new()))
                .unwrap();
        }
        let values = source.snapshot().into_iter().map(Document::into_value).collect();

        let target = CommandQueue::default();
        let outcome = target.restore(RestoredCommands::from_values(values));
        assert_eq!(outcome.admitted, 3);
        assert!(outcome.overflow.is_empty());
        assert_eq!(target.byte_usage(), source.byte_usage());

        let order: Vec<String> = std::iter::from_fn(|| target.pop())
            .map(|c| c.source_file_path().to_string())
            .collect();
        assert_eq!(order, ["/p/c.py", "/p/a.py", "/p/b.py"]);
        assert_eq!(target.byte_usage(), 0);
    }

    #[test]
    fn test_restore_stops_at_first_overflow() {
        let small = |name: &str| IndexerCommand::new(FilePath::new(name).unwrap(), PythonCommand::new());
        // Room for exactly the queued command plus a.py
        let max = small("/p/queued.py").byte_size(24) + small("/p/a.py").byte_size(24);
        let queue = CommandQueue::new(QueueConfig::default().with_max_bytes(max));
        queue.push(small("/p/queued.py")).unwrap();

        let restored = RestoredCommands {
            commands: vec![small("/p/a.py"), small("/p/queued.py"), small("/p/bb.py"), small("/p/c.py")],
            skipped: Vec::new(),
        };
        let outcome = queue.restore(restored);

        assert_eq!(outcome.admitted, 1);
        assert_eq!(outcome.duplicates.len(), 1);
        let overflow: Vec<&str> = outcome
            .overflow
            .iter()
            .map(|c| c.source_file_path().as_str())
            .collect();
        assert_eq!(overflow, ["/p/bb.py", "/p/c.py"]);
        assert_eq!(queue.byte_usage(), queue.stored_sizes().iter().sum::<usize>());
    }
}
