//! Python indexer command.

use super::{CommandKind, LanguageCommand, SizeEstimator};
use crate::document::{Document, DocumentResult};
use crate::types::FilePath;

pub const KEY_ENVIRONMENT_PATH: &str = "environment_path";
pub const KEY_MODULE_SEARCH_PATHS: &str = "module_search_paths";

/// Inputs for analyzing one Python module.
///
/// `environment_path` points at an interpreter or virtualenv whose
/// site-packages are searched after `module_search_paths`. It is omitted
/// from the document when not set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PythonCommand {
    environment_path: Option<FilePath>,
    module_search_paths: Vec<FilePath>,
}

impl PythonCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environment_path(mut self, path: FilePath) -> Self {
        self.environment_path = Some(path);
        self
    }

    pub fn with_module_search_path(mut self, path: FilePath) -> Self {
        self.module_search_paths.push(path);
        self
    }

    pub fn with_module_search_paths(mut self, paths: impl IntoIterator<Item = FilePath>) -> Self {
        self.module_search_paths.extend(paths);
        self
    }

    pub fn environment_path(&self) -> Option<&FilePath> {
        self.environment_path.as_ref()
    }

    pub fn module_search_paths(&self) -> &[FilePath] {
        &self.module_search_paths
    }
}

impl LanguageCommand for PythonCommand {
    const KIND: CommandKind = CommandKind::Python;

    fn estimate(&self, estimator: &mut SizeEstimator) {
        if let Some(env) = &self.environment_path {
            estimator.add(env.as_str());
        }
        estimator.add_all(self.module_search_paths.iter().map(FilePath::as_str));
    }

    fn write_fields(&self, document: &mut Document) {
        if let Some(env) = &self.environment_path {
            document.insert_path(KEY_ENVIRONMENT_PATH, env);
        }
        document.insert_paths(KEY_MODULE_SEARCH_PATHS, &self.module_search_paths);
    }

    fn read_fields(document: &Document) -> DocumentResult<Self> {
        Ok(Self {
            environment_path: document.optional_path(KEY_ENVIRONMENT_PATH)?,
            module_search_paths: document.path_list(KEY_MODULE_SEARCH_PATHS)?,
        })
    }
}
