//! Serialized command documents.
//!
//! A [`Document`] is the only representation of a command that leaves the
//! process: it is what workers receive and what queue snapshots store.
//! Every value is either a string or an ordered list of strings. Keys are
//! kept in sorted order so the JSON text of a document is deterministic.
//!
//! Readers are strict about shape but ignore keys they do not know, so
//! documents written by newer versions still load.

use crate::command::CommandKind;
use crate::types::{FilePath, FilePathFilter, PathError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised while turning a document back into a command.
#[derive(Error, Debug)]
pub enum DeserializationError {
    #[error("Missing required key '{key}'")]
    MissingKey { key: String },

    #[error("Key '{key}' has the wrong shape: expected {expected}")]
    WrongShape { key: String, expected: &'static str },

    #[error("Key '{key}' holds an unusable path: {source}")]
    InvalidPath {
        key: String,
        #[source]
        source: PathError,
    },

    #[error("Document describes a '{found}' command, expected '{expected}'")]
    KindMismatch { expected: CommandKind, found: String },

    #[error("Unknown command type '{kind}'")]
    UnknownKind { kind: String },

    #[error("Malformed document: {0}")]
    Malformed(String),
}

pub type DocumentResult<T> = Result<T, DeserializationError>;

/// Structured key/value form of an indexer command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    // ─── writers ────────────────────────────────────────────────────────

    pub fn insert_text(&mut self, key: &str, value: impl Into<String>) {
        self.fields
            .insert(key.to_string(), Value::String(value.into()));
    }

    pub fn insert_list<I, S>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = values
            .into_iter()
            .map(|v| Value::String(v.into()))
            .collect();
        self.fields.insert(key.to_string(), Value::Array(list));
    }

    pub fn insert_path(&mut self, key: &str, path: &FilePath) {
        self.insert_text(key, path.as_str());
    }

    pub fn insert_paths<'a>(&mut self, key: &str, paths: impl IntoIterator<Item = &'a FilePath>) {
        self.insert_list(key, paths.into_iter().map(FilePath::as_str));
    }

    pub fn insert_filters<'a>(
        &mut self,
        key: &str,
        filters: impl IntoIterator<Item = &'a FilePathFilter>,
    ) {
        self.insert_list(key, filters.into_iter().map(FilePathFilter::as_str));
    }

    /// Insert a raw JSON value. Only used to carry keys this version does
    /// not understand.
    pub fn insert_raw(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    // ─── readers ────────────────────────────────────────────────────────

    pub fn text(&self, key: &str) -> DocumentResult<&str> {
        self.optional_text(key)?
            .ok_or_else(|| DeserializationError::MissingKey {
                key: key.to_string(),
            })
    }

    pub fn optional_text(&self, key: &str) -> DocumentResult<Option<&str>> {
        match self.fields.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(wrong_shape(key, "a string")),
        }
    }

    pub fn list(&self, key: &str) -> DocumentResult<Vec<&str>> {
        let Some(value) = self.fields.get(key) else {
            return Err(DeserializationError::MissingKey {
                key: key.to_string(),
            });
        };
        let Value::Array(items) = value else {
            return Err(wrong_shape(key, "a list of strings"));
        };
        items
            .iter()
            .map(|item| item.as_str().ok_or_else(|| wrong_shape(key, "a list of strings")))
            .collect()
    }

    pub fn path(&self, key: &str) -> DocumentResult<FilePath> {
        FilePath::new(self.text(key)?).map_err(|source| invalid_path(key, source))
    }

    pub fn optional_path(&self, key: &str) -> DocumentResult<Option<FilePath>> {
        self.optional_text(key)?
            .map(|s| FilePath::new(s).map_err(|source| invalid_path(key, source)))
            .transpose()
    }

    pub fn path_list(&self, key: &str) -> DocumentResult<Vec<FilePath>> {
        self.list(key)?
            .into_iter()
            .map(|s| FilePath::new(s).map_err(|source| invalid_path(key, source)))
            .collect()
    }

    pub fn path_set(&self, key: &str) -> DocumentResult<BTreeSet<FilePath>> {
        Ok(self.path_list(key)?.into_iter().collect())
    }

    pub fn filter_set(&self, key: &str) -> DocumentResult<BTreeSet<FilePathFilter>> {
        self.list(key)?
            .into_iter()
            .map(|s| FilePathFilter::new(s).map_err(|source| invalid_path(key, source)))
            .collect()
    }

    pub fn string_list(&self, key: &str) -> DocumentResult<Vec<String>> {
        Ok(self.list(key)?.into_iter().map(str::to_string).collect())
    }

    // ─── JSON payload ───────────────────────────────────────────────────

    /// Compact JSON text, one line. This is the payload handed to workers.
    pub fn to_json(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }

    pub fn from_json(text: &str) -> DocumentResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| DeserializationError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> DocumentResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(DeserializationError::Malformed(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

fn wrong_shape(key: &str, expected: &'static str) -> DeserializationError {
    DeserializationError::WrongShape {
        key: key.to_string(),
        expected,
    }
}

fn invalid_path(key: &str, source: PathError) -> DeserializationError {
    DeserializationError::InvalidPath {
        key: key.to_string(),
        source,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_and_list_access() {
        let mut doc = Document::new();
        doc.insert_text("working_directory", "/project");
        doc.insert_list("compiler_flags", ["-O2", "-DNDEBUG"]);

        assert_eq!(doc.text("working_directory").unwrap(), "/project");
        assert_eq!(doc.list("compiler_flags").unwrap(), vec!["-O2", "-DNDEBUG"]);
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_missing_key() {
        let doc = Document::new();
        let err = doc.text("source_file_path").unwrap_err();
        assert!(matches!(err, DeserializationError::MissingKey { ref key } if key == "source_file_path"));
    }

    #[test]
    fn test_wrong_shape() {
        let mut doc = Document::new();
        doc.insert_list("working_directory", ["/a"]);
        doc.insert_text("compiler_flags", "-O2");
        doc.insert_raw("class_path", json!(["/a", 3]));

        assert!(matches!(
            doc.text("working_directory"),
            Err(DeserializationError::WrongShape { .. })
        ));
        assert!(matches!(
            doc.list("compiler_flags"),
            Err(DeserializationError::WrongShape { .. })
        ));
        assert!(matches!(
            doc.list("class_path"),
            Err(DeserializationError::WrongShape { .. })
        ));
    }

    #[test]
    fn test_invalid_path() {
        let mut doc = Document::new();
        doc.insert_text("source_file_path", "");
        assert!(matches!(
            doc.path("source_file_path"),
            Err(DeserializationError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_json_is_deterministic() {
        let mut a = Document::new();
        a.insert_text("zeta", "1");
        a.insert_text("alpha", "2");

        let mut b = Document::new();
        b.insert_text("alpha", "2");
        b.insert_text("zeta", "1");

        assert_eq!(a.to_json(), b.to_json());
        assert_eq!(a.to_json(), r#"{"alpha":"2","zeta":"1"}"#);
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(matches!(
            Document::from_json("[1, 2]"),
            Err(DeserializationError::Malformed(_))
        ));
        assert!(matches!(
            Document::from_json("{\"source_file_path\": "),
            Err(DeserializationError::Malformed(_))
        ));
    }

    #[test]
    fn test_from_json_keeps_unknown_shapes() {
        let doc = Document::from_json(r#"{"source_file_path": "/a.py", "future_field": {"x": 1}}"#)
            .unwrap();
        assert_eq!(doc.text("source_file_path").unwrap(), "/a.py");
        assert!(doc.contains_key("future_field"));
    }
}
