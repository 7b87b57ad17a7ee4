//! C and C++ indexer command.

use super::{CommandKind, LanguageCommand, SizeEstimator};
use crate::document::{Document, DocumentResult};
use crate::types::{FilePath, FilePathFilter};
use std::collections::BTreeSet;

pub const KEY_INDEXED_PATHS: &str = "indexed_paths";
pub const KEY_EXCLUDE_FILTERS: &str = "exclude_filters";
pub const KEY_INCLUDE_FILTERS: &str = "include_filters";
pub const KEY_WORKING_DIRECTORY: &str = "working_directory";
pub const KEY_SYSTEM_HEADER_SEARCH_PATHS: &str = "system_header_search_paths";
pub const KEY_FRAMEWORK_SEARCH_PATHS: &str = "framework_search_paths";
pub const KEY_COMPILER_FLAGS: &str = "compiler_flags";

/// Inputs for analyzing one C/C++ translation unit.
///
/// - `indexed_paths`: files under these paths are project-owned; symbols
///   from other headers are recorded as external.
/// - `exclude_filters` / `include_filters`: decide which transitively
///   included headers are analyzed.
/// - search paths and flags are ordered; the first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CxxCommand {
    indexed_paths: BTreeSet<FilePath>,
    exclude_filters: BTreeSet<FilePathFilter>,
    include_filters: BTreeSet<FilePathFilter>,
    working_directory: FilePath,
    system_header_search_paths: Vec<FilePath>,
    framework_search_paths: Vec<FilePath>,
    compiler_flags: Vec<String>,
}

impl CxxCommand {
    pub fn new(working_directory: FilePath) -> Self {
        Self {
            indexed_paths: BTreeSet::new(),
            exclude_filters: BTreeSet::new(),
            include_filters: BTreeSet::new(),
            working_directory,
            system_header_search_paths: Vec::new(),
            framework_search_paths: Vec::new(),
            compiler_flags: Vec::new(),
        }
    }

    pub fn with_indexed_path(mut self, path: FilePath) -> Self {
        self.indexed_paths.insert(path);
        self
    }

    pub fn with_indexed_paths(mut self, paths: impl IntoIterator<Item = FilePath>) -> Self {
        self.indexed_paths.extend(paths);
        self
    }

    pub fn with_exclude_filter(mut self, filter: FilePathFilter) -> Self {
        self.exclude_filters.insert(filter);
        self
    }

    pub fn with_exclude_filters(
        mut self,
        filters: impl IntoIterator<Item = FilePathFilter>,
    ) -> Self {
        self.exclude_filters.extend(filters);
        self
    }

    pub fn with_include_filter(mut self, filter: FilePathFilter) -> Self {
        self.include_filters.insert(filter);
        self
    }

    pub fn with_include_filters(
        mut self,
        filters: impl IntoIterator<Item = FilePathFilter>,
    ) -> Self {
        self.include_filters.extend(filters);
        self
    }

    pub fn with_system_header_search_path(mut self, path: FilePath) -> Self {
        self.system_header_search_paths.push(path);
        self
    }

    pub fn with_system_header_search_paths(
        mut self,
        paths: impl IntoIterator<Item = FilePath>,
    ) -> Self {
        self.system_header_search_paths.extend(paths);
        self
    }

    pub fn with_framework_search_path(mut self, path: FilePath) -> Self {
        self.framework_search_paths.push(path);
        self
    }

    pub fn with_framework_search_paths(
        mut self,
        paths: impl IntoIterator<Item = FilePath>,
    ) -> Self {
        self.framework_search_paths.extend(paths);
        self
    }

    pub fn with_compiler_flag(mut self, flag: impl Into<String>) -> Self {
        self.compiler_flags.push(flag.into());
        self
    }

    pub fn with_compiler_flags<S: Into<String>>(
        mut self,
        flags: impl IntoIterator<Item = S>,
    ) -> Self {
        self.compiler_flags.extend(flags.into_iter().map(Into::into));
        self
    }

    pub fn indexed_paths(&self) -> &BTreeSet<FilePath> {
        &self.indexed_paths
    }

    pub fn exclude_filters(&self) -> &BTreeSet<FilePathFilter> {
        &self.exclude_filters
    }

    pub fn include_filters(&self) -> &BTreeSet<FilePathFilter> {
        &self.include_filters
    }

    pub fn working_directory(&self) -> &FilePath {
        &self.working_directory
    }

    pub fn system_header_search_paths(&self) -> &[FilePath] {
        &self.system_header_search_paths
    }

    pub fn framework_search_paths(&self) -> &[FilePath] {
        &self.framework_search_paths
    }

    pub fn compiler_flags(&self) -> &[String] {
        &self.compiler_flags
    }
}

impl LanguageCommand for CxxCommand {
    const KIND: CommandKind = CommandKind::Cxx;

    fn estimate(&self, estimator: &mut SizeEstimator) {
        estimator
            .add_all(self.indexed_paths.iter().map(FilePath::as_str))
            .add_all(self.exclude_filters.iter().map(FilePathFilter::as_str))
            .add_all(self.include_filters.iter().map(FilePathFilter::as_str))
            .add(self.working_directory.as_str())
            .add_all(self.system_header_search_paths.iter().map(FilePath::as_str))
            .add_all(self.framework_search_paths.iter().map(FilePath::as_str))
            .add_all(self.compiler_flags.iter().map(String::as_str));
    }

    fn write_fields(&self, document: &mut Document) {
        document.insert_paths(KEY_INDEXED_PATHS, &self.indexed_paths);
        document.insert_filters(KEY_EXCLUDE_FILTERS, &self.exclude_filters);
        document.insert_filters(KEY_INCLUDE_FILTERS, &self.include_filters);
        document.insert_path(KEY_WORKING_DIRECTORY, &self.working_directory);
        document.insert_paths(
            KEY_SYSTEM_HEADER_SEARCH_PATHS,
            &self.system_header_search_paths,
        );
        document.insert_paths(KEY_FRAMEWORK_SEARCH_PATHS, &self.framework_search_paths);
        document.insert_list(KEY_COMPILER_FLAGS, self.compiler_flags.iter().cloned());
    }

    fn read_fields(document: &Document) -> DocumentResult<Self> {
        Ok(Self {
            indexed_paths: document.path_set(KEY_INDEXED_PATHS)?,
            exclude_filters: document.filter_set(KEY_EXCLUDE_FILTERS)?,
            include_filters: document.filter_set(KEY_INCLUDE_FILTERS)?,
            working_directory: document.path(KEY_WORKING_DIRECTORY)?,
            system_header_search_paths: document.path_list(KEY_SYSTEM_HEADER_SEARCH_PATHS)?,
            framework_search_paths: document.path_list(KEY_FRAMEWORK_SEARCH_PATHS)?,
            compiler_flags: document.string_list(KEY_COMPILER_FLAGS)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::IndexerCommand;
    use crate::document::DeserializationError;

    fn path(s: &str) -> FilePath {
        FilePath::new(s).unwrap()
    }

    fn filter(s: &str) -> FilePathFilter {
        FilePathFilter::new(s).unwrap()
    }

    fn full_command() -> CxxCommand {
        CxxCommand::new(path("/project"))
            .with_indexed_paths([path("/project/src"), path("/project/include")])
            .with_exclude_filters([filter("/project/build/**"), filter("**/*.gen.h")])
            .with_include_filter(filter("/project/include/**"))
            .with_system_header_search_paths([path("/usr/local/include"), path("/usr/include")])
            .with_framework_search_path(path("/Library/Frameworks"))
            .with_compiler_flags(["-std=c++17", "-DDEBUG", "-DDEBUG"])
    }

    #[test]
    fn test_document_schema() {
        let command = IndexerCommand::new(path("/project/src/a.cpp"), full_command());
        let doc = command.serialize();

        assert_eq!(
            doc.list(KEY_INDEXED_PATHS).unwrap(),
            vec!["/project/include", "/project/src"]
        );
        assert_eq!(
            doc.list(KEY_EXCLUDE_FILTERS).unwrap(),
            vec!["**/*.gen.h", "/project/build/**"]
        );
        assert_eq!(doc.list(KEY_INCLUDE_FILTERS).unwrap(), vec!["/project/include/**"]);
        assert_eq!(doc.text(KEY_WORKING_DIRECTORY).unwrap(), "/project");
        assert_eq!(
            doc.list(KEY_SYSTEM_HEADER_SEARCH_PATHS).unwrap(),
            vec!["/usr/local/include", "/usr/include"]
        );
        assert_eq!(
            doc.list(KEY_FRAMEWORK_SEARCH_PATHS).unwrap(),
            vec!["/Library/Frameworks"]
        );
        assert_eq!(
            doc.list(KEY_COMPILER_FLAGS).unwrap(),
            vec!["-std=c++17", "-DDEBUG", "-DDEBUG"]
        );
    }

    #[test]
    fn test_sets_dedupe_sequences_keep_duplicates() {
        let command = CxxCommand::new(path("/w"))
            .with_indexed_path(path("/a"))
            .with_indexed_path(path("/a"))
            .with_compiler_flag("-I.")
            .with_compiler_flag("-I.");

        assert_eq!(command.indexed_paths().len(), 1);
        assert_eq!(command.compiler_flags().len(), 2);
    }

    #[test]
    fn test_byte_size_matches_formula() {
        let command = IndexerCommand::new(
            path("/p/a.cpp"),
            CxxCommand::new(path("/p"))
                .with_indexed_path(path("/p/src"))
                .with_compiler_flag("-O2"),
        );
        // source + working dir + one indexed path + one flag
        let expected = (8 + 8) + (8 + 2) + (8 + 6) + (8 + 3);
        assert_eq!(command.byte_size(8), expected);
    }

    #[test]
    fn test_flags_measured_in_utf8_bytes() {
        let ascii = CxxCommand::new(path("/p")).with_compiler_flag("-DNAME=a");
        let accented = CxxCommand::new(path("/p")).with_compiler_flag("-DNAME=ä");

        let a = IndexerCommand::new(path("/p/x.cpp"), ascii).byte_size(8);
        let b = IndexerCommand::new(path("/p/x.cpp"), accented).byte_size(8);
        assert_eq!(b, a + 1);
    }

    #[test]
    fn test_each_container_is_monotonic() {
        let base = full_command();
        let size = |c: &CxxCommand| IndexerCommand::new(path("/p/x.cpp"), c.clone()).byte_size(8);
        let before = size(&base);

        let grown = [
            base.clone().with_indexed_path(path("/project/extra")),
            base.clone().with_exclude_filter(filter("/tmp/**")),
            base.clone().with_include_filter(filter("/opt/**")),
            base.clone().with_system_header_search_path(path("/usr/include")),
            base.clone().with_framework_search_path(path("/System/Library/Frameworks")),
            base.clone().with_compiler_flag(""),
        ];
        for command in &grown {
            assert!(size(command) > before, "estimate must grow: {command:?}");
        }
    }

    #[test]
    fn test_missing_working_directory() {
        let command = IndexerCommand::new(path("/p/a.cpp"), full_command());
        let mut value = command.serialize().into_value();
        value.as_object_mut().unwrap().remove(KEY_WORKING_DIRECTORY);
        let doc = Document::from_value(value).unwrap();

        let err = IndexerCommand::deserialize(&doc, CommandKind::Cxx).unwrap_err();
        assert!(matches!(err, DeserializationError::MissingKey { ref key } if key == KEY_WORKING_DIRECTORY));
    }

    #[test]
    fn test_invalid_filter_in_document() {
        let command = IndexerCommand::new(path("/p/a.cpp"), full_command());
        let mut doc = command.serialize();
        doc.insert_list(KEY_EXCLUDE_FILTERS, ["[unclosed"]);

        let err = IndexerCommand::deserialize(&doc, CommandKind::Cxx).unwrap_err();
        assert!(matches!(err, DeserializationError::InvalidPath { .. }));
    }
}
