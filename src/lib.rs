//! Byte-budgeted job queue for per-file source indexing commands.
//!
//! A producer expands a project into one [`IndexerCommand`] per source file,
//! pushes them onto a [`CommandQueue`] bounded by estimated memory, and a
//! [`Dispatcher`] hands each command to workers as a JSON [`Document`].

pub mod cli;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod document;
pub mod expansion;
pub mod logging;
pub mod queue;
pub mod types;

pub use command::{
    CommandKind, CommandPayload, CxxCommand, IndexerCommand, JavaCommand, LanguageCommand,
    PythonCommand, SizeEstimator,
};
pub use config::Settings;
pub use dispatch::{
    CommandWorker, DispatchConfig, DispatchStats, Dispatcher, JobOutcome, WorkerError,
};
pub use document::{DeserializationError, Document, DocumentResult};
pub use expansion::{ExpansionError, ProjectExpander};
pub use queue::{CommandQueue, QueueConfig, QueueError, QueueResult, RestoreOutcome};
pub use types::{FilePath, FilePathFilter, PathError};
