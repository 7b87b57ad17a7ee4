//! Worker side of the dispatch boundary.
//!
//! Workers never see the dispatcher's command objects. They receive the
//! JSON text of a document, decode it, and analyze the result. The same
//! entry point serves in-process worker threads and external worker
//! processes reading payloads from a pipe.

use crate::command::IndexerCommand;
use crate::document::Document;
use crate::types::FilePath;
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Analysis of {path} failed: {reason}")]
    Failed { path: FilePath, reason: String },

    #[error("Worker output failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Executes one decoded command.
///
/// The command is owned by the worker for the duration of the call.
pub trait CommandWorker: Send + Sync {
    fn execute(&self, command: IndexerCommand) -> Result<(), WorkerError>;
}

/// What happened to one dispatched payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { path: FilePath },
    Failed { path: FilePath, reason: String },
    /// The payload did not decode; nothing was executed.
    Malformed { reason: String },
}

/// Decode a payload and run it.
///
/// A payload that fails to decode is reported as `Malformed` so the caller
/// can discard it and move on to the next job.
pub fn execute_payload(payload: &str, worker: &dyn CommandWorker) -> JobOutcome {
    let command = match Document::from_json(payload)
        .and_then(|document| IndexerCommand::from_document(&document))
    {
        Ok(command) => command,
        Err(e) => {
            tracing::warn!("[dispatch] discarding malformed payload: {e}");
            return JobOutcome::Malformed {
                reason: e.to_string(),
            };
        }
    };

    let path = command.source_file_path().clone();
    match worker.execute(command) {
        Ok(()) => JobOutcome::Completed { path },
        Err(e) => {
            tracing::warn!("[dispatch] {path} failed: {e}");
            JobOutcome::Failed {
                path,
                reason: e.to_string(),
            }
        }
    }
}

/// Writes each command's document to stdout as one JSON line.
///
/// Lets `indexq run` feed an external analyzer through a pipe.
#[derive(Debug, Default)]
pub struct StdoutWorker;

impl CommandWorker for StdoutWorker {
    fn execute(&self, command: IndexerCommand) -> Result<(), WorkerError> {
        let line = command.serialize().to_json();
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}")?;
        Ok(())
    }
}

/// Accepts every command and only logs it.
///
/// Used by `indexq work` to check a payload stream end to end.
#[derive(Debug, Default)]
pub struct LoggingWorker;

impl CommandWorker for LoggingWorker {
    fn execute(&self, command: IndexerCommand) -> Result<(), WorkerError> {
        crate::debug_event!(
            "worker",
            "received",
            "{} {}",
            command.kind(),
            command.source_file_path()
        );
        Ok(())
    }
}
