//! Crash-recovery snapshots.
//!
//! A snapshot is a JSON array of command documents in dispatch order.
//! Loading is lenient per entry: a document that no longer decodes is
//! reported and skipped, the rest of the snapshot still loads.

use crate::command::IndexerCommand;
use crate::document::{DeserializationError, Document};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Snapshot {path} is not a JSON array of documents: {reason}")]
    Format { path: PathBuf, reason: String },
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// A snapshot entry that could not be turned back into a command.
#[derive(Debug)]
pub struct SkippedDocument {
    /// Zero-based position in the snapshot.
    pub position: usize,
    pub error: DeserializationError,
}

/// Result of loading a snapshot.
#[derive(Debug, Default)]
pub struct RestoredCommands {
    /// Decoded commands in snapshot order.
    pub commands: Vec<IndexerCommand>,
    pub skipped: Vec<SkippedDocument>,
}

impl RestoredCommands {
    /// Decode documents, isolating failures to the entry that caused them.
    pub fn from_values(values: Vec<Value>) -> Self {
        let mut restored = Self::default();
        for (position, value) in values.into_iter().enumerate() {
            let decoded = Document::from_value(value)
                .and_then(|document| IndexerCommand::from_document(&document));
            match decoded {
                Ok(command) => restored.commands.push(command),
                Err(error) => {
                    tracing::warn!("[snapshot] skipping entry {position}: {error}");
                    restored.skipped.push(SkippedDocument { position, error });
                }
            }
        }
        restored
    }
}

/// Write documents to `path` as a pretty-printed JSON array.
///
/// The file is written to a uniquely named temporary file in the same
/// directory and persisted over `path`, so a crash mid-write leaves the
/// previous snapshot intact.
pub fn save_snapshot(path: &Path, documents: &[Document]) -> SnapshotResult<()> {
    let write_err = |source| SnapshotError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }

    let json = serde_json::to_string_pretty(documents).map_err(|e| SnapshotError::Format {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(json.as_bytes()).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    crate::debug_event!(
        "snapshot",
        "saved",
        "{} documents to {}",
        documents.len(),
        path.display()
    );
    Ok(())
}

/// Load a snapshot written by [`save_snapshot`].
pub fn load_snapshot(path: &Path) -> SnapshotResult<RestoredCommands> {
    let content = std::fs::read_to_string(path).map_err(|source| SnapshotError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let values: Vec<Value> =
        serde_json::from_str(&content).map_err(|e| SnapshotError::Format {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let restored = RestoredCommands::from_values(values);
    crate::log_event!(
        "snapshot",
        "loaded",
        "{} commands ({} skipped) from {}",
        restored.commands.len(),
        restored.skipped.len(),
        path.display()
    );
    Ok(restored)
}
