//! Java indexer command.

use super::{CommandKind, LanguageCommand, SizeEstimator};
use crate::document::{Document, DocumentResult};
use crate::types::FilePath;

pub const KEY_LANGUAGE_STANDARD: &str = "language_standard";
pub const KEY_CLASS_PATH: &str = "class_path";

/// Inputs for analyzing one Java compilation unit.
///
/// `class_path` is a search order: jars and directories are consulted
/// front to back when resolving types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaCommand {
    language_standard: String,
    class_path: Vec<FilePath>,
}

impl JavaCommand {
    pub fn new(language_standard: impl Into<String>) -> Self {
        Self {
            language_standard: language_standard.into(),
            class_path: Vec::new(),
        }
    }

    pub fn with_class_path_entry(mut self, entry: FilePath) -> Self {
        self.class_path.push(entry);
        self
    }

    pub fn with_class_path(mut self, entries: impl IntoIterator<Item = FilePath>) -> Self {
        self.class_path.extend(entries);
        self
    }

    pub fn language_standard(&self) -> &str {
        &self.language_standard
    }

    pub fn class_path(&self) -> &[FilePath] {
        &self.class_path
    }
}

impl LanguageCommand for JavaCommand {
    const KIND: CommandKind = CommandKind::Java;

    fn estimate(&self, estimator: &mut SizeEstimator) {
        estimator
            .add(&self.language_standard)
            .add_all(self.class_path.iter().map(FilePath::as_str));
    }

    fn write_fields(&self, document: &mut Document) {
        document.insert_text(KEY_LANGUAGE_STANDARD, self.language_standard.as_str());
        document.insert_paths(KEY_CLASS_PATH, &self.class_path);
    }

    fn read_fields(document: &Document) -> DocumentResult<Self> {
        Ok(Self {
            language_standard: document.text(KEY_LANGUAGE_STANDARD)?.to_string(),
            class_path: document.path_list(KEY_CLASS_PATH)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::IndexerCommand;

    fn path(s: &str) -> FilePath {
        FilePath::new(s).unwrap()
    }

    #[test]
    fn test_round_trip_preserves_class_path_order() {
        let command = IndexerCommand::new(
            path("/project/src/App.java"),
            JavaCommand::new("17").with_class_path([
                path("/project/lib/z.jar"),
                path("/project/lib/a.jar"),
                path("/project/lib/z.jar"),
            ]),
        );

        let doc = command.serialize();
        assert_eq!(
            doc.list(KEY_CLASS_PATH).unwrap(),
            vec!["/project/lib/z.jar", "/project/lib/a.jar", "/project/lib/z.jar"]
        );

        let restored = IndexerCommand::deserialize(&doc, CommandKind::Java).unwrap();
        assert_eq!(restored, command);
    }

    #[test]
    fn test_class_path_growth_increases_estimate() {
        let base = JavaCommand::new("11");
        let grown = base.clone().with_class_path_entry(path("/lib/x.jar"));

        let before = IndexerCommand::new(path("/A.java"), base).byte_size(16);
        let after = IndexerCommand::new(path("/A.java"), grown).byte_size(16);
        assert_eq!(after, before + 16 + "/lib/x.jar".len());
    }
}
