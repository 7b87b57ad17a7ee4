//! Indexer commands.
//!
//! An [`IndexerCommand`] describes one file-analysis job: the source file
//! plus every input the language analyzer needs, so that a worker can run
//! it in isolation (possibly in another process).
//!
//! ## Layout
//!
//! ```text
//! IndexerCommand
//!   ├── source_file_path        (shared by every language)
//!   └── CommandPayload
//!         ├── Cxx(CxxCommand)   search paths, filters, compiler flags
//!         ├── Java(JavaCommand) language standard, class path
//!         └── Python(PythonCommand) environment, module search paths
//! ```
//!
//! Each payload implements [`LanguageCommand`], which is the seam a new
//! language backend plugs into.

pub mod cxx;
pub mod java;
pub mod python;
pub mod size;

pub use cxx::CxxCommand;
pub use java::JavaCommand;
pub use python::PythonCommand;
pub use size::SizeEstimator;

use crate::document::{DeserializationError, Document, DocumentResult};
use crate::types::FilePath;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Document key holding the analyzed file.
pub const KEY_SOURCE_FILE_PATH: &str = "source_file_path";

/// Document key holding the variant tag.
pub const KEY_COMMAND_TYPE: &str = "command_type";

/// Discriminant of the language-specific payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Cxx,
    Java,
    Python,
}

impl CommandKind {
    pub const ALL: [CommandKind; 3] = [CommandKind::Cxx, CommandKind::Java, CommandKind::Python];

    /// Stable tag used in documents and settings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cxx => "cxx",
            Self::Java => "java",
            Self::Python => "python",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = DeserializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| DeserializationError::UnknownKind {
            kind: s.to_string(),
        })
    }
}

/// Contract implemented by every language payload.
///
/// Implementations charge every string they own to the estimator and write
/// their own keys after the base keys. Set-valued fields must be written in
/// sorted order so documents are deterministic.
pub trait LanguageCommand: Sized {
    const KIND: CommandKind;

    /// Add the payload's strings to the running estimate.
    fn estimate(&self, estimator: &mut SizeEstimator);

    fn write_fields(&self, document: &mut Document);

    fn read_fields(document: &Document) -> DocumentResult<Self>;
}

/// Language-specific inputs of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandPayload {
    Cxx(CxxCommand),
    Java(JavaCommand),
    Python(PythonCommand),
}

impl CommandPayload {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Cxx(_) => CxxCommand::KIND,
            Self::Java(_) => JavaCommand::KIND,
            Self::Python(_) => PythonCommand::KIND,
        }
    }

    fn estimate(&self, estimator: &mut SizeEstimator) {
        match self {
            Self::Cxx(c) => c.estimate(estimator),
            Self::Java(c) => c.estimate(estimator),
            Self::Python(c) => c.estimate(estimator),
        }
    }

    fn write_fields(&self, document: &mut Document) {
        match self {
            Self::Cxx(c) => c.write_fields(document),
            Self::Java(c) => c.write_fields(document),
            Self::Python(c) => c.write_fields(document),
        }
    }

    fn read_fields(kind: CommandKind, document: &Document) -> DocumentResult<Self> {
        Ok(match kind {
            CommandKind::Cxx => Self::Cxx(CxxCommand::read_fields(document)?),
            CommandKind::Java => Self::Java(JavaCommand::read_fields(document)?),
            CommandKind::Python => Self::Python(PythonCommand::read_fields(document)?),
        })
    }
}

impl From<CxxCommand> for CommandPayload {
    fn from(command: CxxCommand) -> Self {
        Self::Cxx(command)
    }
}

impl From<JavaCommand> for CommandPayload {
    fn from(command: JavaCommand) -> Self {
        Self::Java(command)
    }
}

impl From<PythonCommand> for CommandPayload {
    fn from(command: PythonCommand) -> Self {
        Self::Python(command)
    }
}

/// A self-contained description of one file-analysis job.
///
/// Two commands describe the same logical job iff their source paths are
/// equal; `PartialEq` compares every field and is what round-trips check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerCommand {
    source_file_path: FilePath,
    payload: CommandPayload,
}

impl IndexerCommand {
    pub fn new(source_file_path: FilePath, payload: impl Into<CommandPayload>) -> Self {
        Self {
            source_file_path,
            payload: payload.into(),
        }
    }

    pub fn source_file_path(&self) -> &FilePath {
        &self.source_file_path
    }

    pub fn kind(&self) -> CommandKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &CommandPayload {
        &self.payload
    }

    pub fn into_parts(self) -> (FilePath, CommandPayload) {
        (self.source_file_path, self.payload)
    }

    /// Estimated serialized size in bytes.
    ///
    /// `string_overhead` is charged once per string value on top of its
    /// UTF-8 length. The estimate errs on the large side and never fails.
    pub fn byte_size(&self, string_overhead: usize) -> usize {
        let mut estimator = SizeEstimator::new(string_overhead);
        estimator.add(self.source_file_path.as_str());
        self.payload.estimate(&mut estimator);
        estimator.total()
    }

    /// Build the transport/persistence document for this command.
    pub fn serialize(&self) -> Document {
        let mut document = Document::new();
        document.insert_path(KEY_SOURCE_FILE_PATH, &self.source_file_path);
        document.insert_text(KEY_COMMAND_TYPE, self.kind().as_str());
        self.payload.write_fields(&mut document);
        document
    }

    /// Rebuild a command of the expected kind.
    ///
    /// A document without a `command_type` key is read as `expected`; one
    /// naming a different kind is rejected. Unknown keys are ignored.
    pub fn deserialize(document: &Document, expected: CommandKind) -> DocumentResult<Self> {
        if let Some(found) = document.optional_text(KEY_COMMAND_TYPE)? {
            if found != expected.as_str() {
                return Err(DeserializationError::KindMismatch {
                    expected,
                    found: found.to_string(),
                });
            }
        }

        let source_file_path = document.path(KEY_SOURCE_FILE_PATH)?;
        let payload = CommandPayload::read_fields(expected, document)?;
        Ok(Self {
            source_file_path,
            payload,
        })
    }

    /// Rebuild a command, taking its kind from the `command_type` key.
    pub fn from_document(document: &Document) -> DocumentResult<Self> {
        let kind: CommandKind = document.text(KEY_COMMAND_TYPE)?.parse()?;
        Self::deserialize(document, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FilePathFilter;

    fn path(s: &str) -> FilePath {
        FilePath::new(s).unwrap()
    }

    fn sample_cxx() -> IndexerCommand {
        IndexerCommand::new(
            path("/project/src/main.cpp"),
            CxxCommand::new(path("/project"))
                .with_indexed_path(path("/project/src"))
                .with_exclude_filter(FilePathFilter::new("/project/build/**").unwrap())
                .with_system_header_search_path(path("/usr/include"))
                .with_compiler_flag("-std=c++17"),
        )
    }

    #[test]
    fn test_kind_tags() {
        for kind in CommandKind::ALL {
            assert_eq!(CommandKind::parse(kind.as_str()), Some(kind));
        }
        assert!("rust".parse::<CommandKind>().is_err());
    }

    #[test]
    fn test_base_keys_written() {
        let doc = sample_cxx().serialize();
        assert_eq!(doc.text(KEY_SOURCE_FILE_PATH).unwrap(), "/project/src/main.cpp");
        assert_eq!(doc.text(KEY_COMMAND_TYPE).unwrap(), "cxx");
    }

    #[test]
    fn test_round_trip_with_expected_kind() {
        let command = sample_cxx();
        let restored = IndexerCommand::deserialize(&command.serialize(), CommandKind::Cxx).unwrap();
        assert_eq!(restored, command);
    }

    #[test]
    fn test_round_trip_from_tag() {
        let command = sample_cxx();
        let restored = IndexerCommand::from_document(&command.serialize()).unwrap();
        assert_eq!(restored, command);
    }

    #[test]
    fn test_kind_mismatch() {
        let doc = sample_cxx().serialize();
        let err = IndexerCommand::deserialize(&doc, CommandKind::Java).unwrap_err();
        assert!(matches!(
            err,
            DeserializationError::KindMismatch {
                expected: CommandKind::Java,
                ..
            }
        ));
    }

    #[test]
    fn test_untagged_document_uses_expected_kind() {
        let mut doc = Document::new();
        doc.insert_text(KEY_SOURCE_FILE_PATH, "/project/app.py");
        doc.insert_list("module_search_paths", ["/project"]);

        let command = IndexerCommand::deserialize(&doc, CommandKind::Python).unwrap();
        assert_eq!(command.kind(), CommandKind::Python);
        assert!(IndexerCommand::from_document(&doc).is_err());
    }

    #[test]
    fn test_byte_size_includes_source_path() {
        let command = IndexerCommand::new(path("a.py"), PythonCommand::new());
        assert_eq!(command.byte_size(8), 8 + 4);
    }

    #[test]
    fn test_serialize_is_deterministic() {
        let command = sample_cxx();
        assert_eq!(command.serialize().to_json(), command.serialize().to_json());
    }
}
