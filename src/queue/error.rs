//! Error types for the command queue.

use crate::command::IndexerCommand;
use thiserror::Error;

/// Rejected pushes.
///
/// Both variants hand the command back so the producer can retry it; the
/// queue never drops a command silently.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue full: command needs {requested} bytes, {used} of {max} bytes in use")]
    QueueFull {
        command: Box<IndexerCommand>,
        requested: usize,
        used: usize,
        max: usize,
    },

    #[error("A command for {} is already queued", .command.source_file_path())]
    DuplicateCommand { command: Box<IndexerCommand> },
}

impl QueueError {
    /// Take back the command that could not be queued.
    pub fn into_command(self) -> IndexerCommand {
        match self {
            Self::QueueFull { command, .. } | Self::DuplicateCommand { command } => *command,
        }
    }

    pub fn command(&self) -> &IndexerCommand {
        match self {
            Self::QueueFull { command, .. } | Self::DuplicateCommand { command } => command,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Self::QueueFull { .. })
    }
}

pub type QueueResult<T> = Result<T, QueueError>;
