//! Path value types shared by every indexer command.
//!
//! `FilePath` is a validated, UTF-8 path string. `FilePathFilter` is a glob
//! pattern used to include or skip transitively referenced files.
//!
//! Both are plain values: they compare, hash and order by their textual
//! form so that sets of them iterate in a stable order.

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors produced when a path or filter string is not usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Path is empty")]
    Empty,

    #[error("Path contains a NUL byte: {value:?}")]
    NulByte { value: String },

    #[error("Path is not valid UTF-8: {}", path.display())]
    NonUtf8 { path: PathBuf },

    #[error("Invalid filter pattern '{pattern}': {reason}")]
    InvalidFilter { pattern: String, reason: String },
}

pub type PathResult<T> = Result<T, PathError>;

/// An immutable filesystem path.
///
/// Always non-empty, valid UTF-8 and free of NUL bytes, so it can be written
/// into a command document and read back without loss.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FilePath(String);

impl FilePath {
    pub fn new(value: impl Into<String>) -> PathResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(PathError::Empty);
        }
        if value.contains('\0') {
            return Err(PathError::NulByte { value });
        }
        Ok(Self(value))
    }

    /// Convert a native path, failing for non UTF-8 paths.
    pub fn from_path(path: &Path) -> PathResult<Self> {
        match path.to_str() {
            Some(s) => Self::new(s),
            None => Err(PathError::NonUtf8 {
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Number of bytes in the UTF-8 encoding.
    pub fn byte_len(&self) -> usize {
        self.0.len()
    }

    pub fn is_absolute(&self) -> bool {
        self.as_path().is_absolute()
    }

    pub fn extension(&self) -> Option<&str> {
        self.as_path().extension().and_then(|ext| ext.to_str())
    }

    /// Join a relative component onto this path.
    pub fn join(&self, component: impl AsRef<Path>) -> PathResult<Self> {
        Self::from_path(&self.as_path().join(component))
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<Path> for FilePath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl TryFrom<String> for FilePath {
    type Error = PathError;

    fn try_from(value: String) -> PathResult<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for FilePath {
    type Error = PathError;

    fn try_from(value: &str) -> PathResult<Self> {
        Self::new(value)
    }
}

impl From<FilePath> for String {
    fn from(path: FilePath) -> Self {
        path.0
    }
}

/// A glob-style path filter.
///
/// `*` and `?` stay within one path component, `**` spans directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FilePathFilter {
    pattern: String,
    compiled: Pattern,
}

const FILTER_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl FilePathFilter {
    pub fn new(pattern: impl Into<String>) -> PathResult<Self> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(PathError::Empty);
        }
        if pattern.contains('\0') {
            return Err(PathError::NulByte { value: pattern });
        }
        let compiled = Pattern::new(&pattern).map_err(|e| PathError::InvalidFilter {
            pattern: pattern.clone(),
            reason: e.msg.to_string(),
        })?;
        Ok(Self { pattern, compiled })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn byte_len(&self) -> usize {
        self.pattern.len()
    }

    pub fn is_match(&self, path: &FilePath) -> bool {
        self.is_match_path(path.as_path())
    }

    pub fn is_match_path(&self, path: &Path) -> bool {
        self.compiled.matches_path_with(path, FILTER_OPTIONS)
    }
}

impl PartialEq for FilePathFilter {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for FilePathFilter {}

impl PartialOrd for FilePathFilter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FilePathFilter {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pattern.cmp(&other.pattern)
    }
}

impl Hash for FilePathFilter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pattern.hash(state);
    }
}

impl fmt::Display for FilePathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

impl TryFrom<String> for FilePathFilter {
    type Error = PathError;

    fn try_from(value: String) -> PathResult<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for FilePathFilter {
    type Error = PathError;

    fn try_from(value: &str) -> PathResult<Self> {
        Self::new(value)
    }
}

impl From<FilePathFilter> for String {
    fn from(filter: FilePathFilter) -> Self {
        filter.pattern
    }
}

/// True when any filter in the set matches the path.
pub fn matches_any<'a>(
    filters: impl IntoIterator<Item = &'a FilePathFilter>,
    path: &Path,
) -> bool {
    filters.into_iter().any(|f| f.is_match_path(path))
}
