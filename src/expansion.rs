//! Project expansion - one indexer command per source file.
//!
//! Walks the project root with the `ignore` crate's parallel walker, maps
//! each file to a language by extension and builds the command from the
//! `[languages.*]` settings. Every command of a language shares the same
//! inputs apart from the source path, so per-language templates are built
//! once and cloned per file.

use crate::Settings;
use crate::command::{CommandKind, CxxCommand, IndexerCommand, JavaCommand, PythonCommand};
use crate::config::LanguageSettings;
use crate::types::{FilePath, FilePathFilter, PathError, matches_any};
use crossbeam_channel::{Sender, unbounded};
use ignore::WalkBuilder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExpansionError {
    #[error("Cannot use project root {path}: {source}")]
    Root {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid path in project settings: {0}")]
    Path(#[from] PathError),

    #[error("No language is enabled")]
    NoLanguages,
}

pub type ExpansionResult<T> = Result<T, ExpansionError>;

/// Pre-built per-language inputs, cloned for each file.
#[derive(Debug, Clone)]
struct Templates {
    cxx: Option<CxxCommand>,
    java: Option<JavaCommand>,
    python: Option<PythonCommand>,
}

impl Templates {
    fn build(languages: &LanguageSettings, root: &FilePath) -> Self {
        let cxx = languages.cxx.enabled.then(|| {
            let settings = &languages.cxx;
            let working_directory = settings
                .working_directory
                .clone()
                .unwrap_or_else(|| root.clone());
            let indexed_paths = if settings.indexed_paths.is_empty() {
                vec![root.clone()]
            } else {
                settings.indexed_paths.clone()
            };
            CxxCommand::new(working_directory)
                .with_indexed_paths(indexed_paths)
                .with_exclude_filters(settings.exclude_filters.iter().cloned())
                .with_include_filters(settings.include_filters.iter().cloned())
                .with_system_header_search_paths(settings.system_header_search_paths.iter().cloned())
                .with_framework_search_paths(settings.framework_search_paths.iter().cloned())
                .with_compiler_flags(settings.compiler_flags.iter().cloned())
        });

        let java = languages.java.enabled.then(|| {
            JavaCommand::new(languages.java.language_standard.clone())
                .with_class_path(languages.java.class_path.iter().cloned())
        });

        let python = languages.python.enabled.then(|| {
            let settings = &languages.python;
            let command = match &settings.environment_path {
                Some(env) => PythonCommand::new().with_environment_path(env.clone()),
                None => PythonCommand::new(),
            };
            command.with_module_search_paths(settings.module_search_paths.iter().cloned())
        });

        Self { cxx, java, python }
    }
}

/// Turns a project root into per-file indexer commands.
#[derive(Debug, Clone)]
pub struct ProjectExpander {
    root: PathBuf,
    exclude_filters: Vec<FilePathFilter>,
    respect_gitignore: bool,
    walker_threads: usize,
    /// Lower-cased extension -> language
    extensions: HashMap<String, CommandKind>,
    templates: Templates,
}

impl ProjectExpander {
    /// Create an expander for `root`.
    ///
    /// The root is canonicalized so every source path is absolute.
    pub fn new(settings: &Settings, root: impl AsRef<Path>) -> ExpansionResult<Self> {
        let root_input = root.as_ref();
        let root = std::fs::canonicalize(root_input).map_err(|source| ExpansionError::Root {
            path: root_input.to_path_buf(),
            source,
        })?;
        let root_path = FilePath::from_path(&root)?;

        let languages = &settings.languages;
        let mut extensions = HashMap::new();
        let enabled = [
            (CommandKind::Cxx, languages.cxx.enabled, &languages.cxx.extensions),
            (CommandKind::Java, languages.java.enabled, &languages.java.extensions),
            (CommandKind::Python, languages.python.enabled, &languages.python.extensions),
        ];
        for (kind, is_enabled, exts) in enabled {
            if !is_enabled {
                continue;
            }
            for ext in exts {
                // First language to claim an extension keeps it
                extensions
                    .entry(ext.trim_start_matches('.').to_lowercase())
                    .or_insert(kind);
            }
        }
        if extensions.is_empty() {
            return Err(ExpansionError::NoLanguages);
        }

        Ok(Self {
            templates: Templates::build(languages, &root_path),
            root,
            exclude_filters: settings.project.exclude_filters.clone(),
            respect_gitignore: settings.project.respect_gitignore,
            walker_threads: 4,
            extensions,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn with_walker_threads(mut self, threads: usize) -> Self {
        self.walker_threads = threads.max(1);
        self
    }

    /// Language responsible for `path`, if any.
    pub fn kind_for(&self, path: &Path) -> Option<CommandKind> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        self.extensions.get(&ext).copied()
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        matches_any(&self.exclude_filters, path)
    }

    /// Build the command for one source file.
    ///
    /// Returns `None` for files no enabled language claims.
    pub fn command_for(&self, source_file_path: FilePath) -> Option<IndexerCommand> {
        let kind = self.kind_for(source_file_path.as_path())?;
        let command = match kind {
            CommandKind::Cxx => IndexerCommand::new(source_file_path, self.templates.cxx.clone()?),
            CommandKind::Java => {
                IndexerCommand::new(source_file_path, self.templates.java.clone()?)
            }
            CommandKind::Python => {
                IndexerCommand::new(source_file_path, self.templates.python.clone()?)
            }
        };
        Some(command)
    }

    /// Walk the project and stream commands to `sender`.
    ///
    /// Returns the number of commands sent. Walk order is not stable; use
    /// [`expand`](Self::expand) when order matters.
    pub fn run(&self, sender: Sender<IndexerCommand>) -> usize {
        let count = Arc::new(AtomicUsize::new(0));
        let skipped = Arc::new(AtomicUsize::new(0));

        let walker = WalkBuilder::new(&self.root)
            .git_ignore(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .threads(self.walker_threads)
            .build_parallel();

        walker.run(|| {
            let sender = sender.clone();
            let count = Arc::clone(&count);
            let skipped = Arc::clone(&skipped);

            Box::new(move |entry| {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => return skip_walk_error(&e, &skipped),
                };

                if entry.file_type().is_some_and(|ft| ft.is_dir()) {
                    return ignore::WalkState::Continue;
                }

                let path = entry.path();
                if self.kind_for(path).is_none() || self.is_excluded(path) {
                    return ignore::WalkState::Continue;
                }

                let source_file_path = match FilePath::from_path(path) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!("[expansion] skipping {}: {e}", path.display());
                        skipped.fetch_add(1, Ordering::Relaxed);
                        return ignore::WalkState::Continue;
                    }
                };

                let Some(command) = self.command_for(source_file_path) else {
                    return ignore::WalkState::Continue;
                };

                count.fetch_add(1, Ordering::Relaxed);
                if sender.send(command).is_err() {
                    // Receiver gone, stop walking
                    return ignore::WalkState::Quit;
                }

                ignore::WalkState::Continue
            })
        });

        let count = count.load(Ordering::Relaxed);
        crate::log_event!(
            "expansion",
            "walked",
            "{count} commands from {} ({} unusable paths)",
            self.root.display(),
            skipped.load(Ordering::Relaxed)
        );
        count
    }

    /// Expand the whole project, sorted by source path.
    pub fn expand(&self) -> Vec<IndexerCommand> {
        let (sender, receiver) = unbounded();
        self.run(sender);

        let mut commands: Vec<IndexerCommand> = receiver.into_iter().collect();
        commands.sort_by(|a, b| a.source_file_path().cmp(b.source_file_path()));
        commands
    }
}

/// Record an entry the walker could not read and keep walking.
fn skip_walk_error(error: &ignore::Error, skipped: &AtomicUsize) -> ignore::WalkState {
    tracing::warn!("[expansion] skipping unreadable entry: {error}");
    skipped.fetch_add(1, Ordering::Relaxed);
    ignore::WalkState::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("generated")).unwrap();
        fs::write(root.join("src/main.cpp"), "int main() {}").unwrap();
        fs::write(root.join("src/util.h"), "#pragma once").unwrap();
        fs::write(root.join("src/App.java"), "class App {}").unwrap();
        fs::write(root.join("src/tool.py"), "print()").unwrap();
        fs::write(root.join("src/README.md"), "# readme").unwrap();
        fs::write(root.join("generated/out.cpp"), "").unwrap();
        temp_dir
    }

    fn names(commands: &[IndexerCommand]) -> Vec<String> {
        commands
            .iter()
            .map(|c| {
                c.source_file_path()
                    .as_path()
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    #[test]
    fn test_expand_maps_extensions_to_languages() {
        let temp_dir = project();
        let expander = ProjectExpander::new(&Settings::default(), temp_dir.path()).unwrap();

        let commands = expander.expand();
        assert_eq!(names(&commands), vec!["out.cpp", "App.java", "main.cpp", "tool.py"]);

        let kinds: Vec<CommandKind> = commands.iter().map(IndexerCommand::kind).collect();
        assert_eq!(
            kinds,
            vec![CommandKind::Cxx, CommandKind::Java, CommandKind::Cxx, CommandKind::Python]
        );
        assert!(commands.iter().all(|c| c.source_file_path().is_absolute()));
    }

    #[test]
    fn test_exclude_filters_and_disabled_languages() {
        let temp_dir = project();
        let mut settings = Settings::default();
        settings
            .project
            .exclude_filters
            .push(FilePathFilter::new("**/generated/**").unwrap());
        settings.languages.java.enabled = false;

        let expander = ProjectExpander::new(&settings, temp_dir.path()).unwrap();
        let commands = expander.expand();
        assert_eq!(names(&commands), vec!["main.cpp", "tool.py"]);
    }

    #[test]
    fn test_cxx_template_defaults_to_project_root() {
        let temp_dir = project();
        let mut settings = Settings::default();
        settings.languages.cxx.compiler_flags = vec!["-std=c++20".to_string()];

        let expander = ProjectExpander::new(&settings, temp_dir.path()).unwrap();
        let source = FilePath::from_path(&expander.root().join("src/main.cpp")).unwrap();
        let command = expander.command_for(source).unwrap();

        let crate::command::CommandPayload::Cxx(cxx) = command.payload() else {
            panic!("expected a C++ command");
        };
        assert_eq!(cxx.working_directory().as_path(), expander.root());
        assert_eq!(cxx.indexed_paths().len(), 1);
        assert_eq!(cxx.compiler_flags(), ["-std=c++20".to_string()]);
    }

    #[test]
    fn test_unknown_extension() {
        let temp_dir = project();
        let expander = ProjectExpander::new(&Settings::default(), temp_dir.path()).unwrap();
        assert_eq!(expander.kind_for(Path::new("notes.txt")), None);
        assert_eq!(expander.kind_for(Path::new("Main.CPP")), Some(CommandKind::Cxx));
    }

    #[test]
    fn test_walk_errors_are_counted() {
        let skipped = AtomicUsize::new(0);
        let denied = ignore::Error::WithPath {
            path: std::path::PathBuf::from("/p/private"),
            err: Box::new(ignore::Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied",
            ))),
        };

        let state = skip_walk_error(&denied, &skipped);
        assert!(matches!(state, ignore::WalkState::Continue));
        let state = skip_walk_error(&denied, &skipped);
        assert!(matches!(state, ignore::WalkState::Continue));
        assert_eq!(skipped.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let result = ProjectExpander::new(&Settings::default(), temp_dir.path().join("nope"));
        assert!(matches!(result, Err(ExpansionError::Root { .. })));
    }

    #[test]
    fn test_no_languages() {
        let temp_dir = project();
        let mut settings = Settings::default();
        settings.languages.cxx.enabled = false;
        settings.languages.java.enabled = false;
        settings.languages.python.enabled = false;

        assert!(matches!(
            ProjectExpander::new(&settings, temp_dir.path()),
            Err(ExpansionError::NoLanguages)
        ));
    }
}
