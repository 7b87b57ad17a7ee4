//! Configuration module for the indexer queue.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`.indexq/settings.toml`)
//! - Environment variable overrides
//! - CLI argument overrides (applied by the binary)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `INDEXQ_` and use double
//! underscores to separate nested levels:
//! - `INDEXQ_QUEUE__MAX_BYTES=1048576` sets `queue.max_bytes`
//! - `INDEXQ_DISPATCH__WORKERS=4` sets `dispatch.workers`
//! - `INDEXQ_LANGUAGES__JAVA__ENABLED=false` sets `languages.java.enabled`

use crate::types::{FilePath, FilePathFilter};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Directory holding local configuration and snapshots.
pub const LOCAL_DIR: &str = ".indexq";

const ENV_PREFIX: &str = "INDEXQ_";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace root directory (where .indexq is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Queue admission settings
    #[serde(default)]
    pub queue: QueueSettings,

    /// Worker dispatch settings
    #[serde(default)]
    pub dispatch: DispatchSettings,

    /// Project enumeration settings
    #[serde(default)]
    pub project: ProjectSettings,

    /// Per-language analyzer inputs
    #[serde(default)]
    pub languages: LanguageSettings,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QueueSettings {
    /// Ceiling on the estimated bytes of queued commands
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Per-string overhead charged by the size estimator
    #[serde(default = "default_string_overhead")]
    pub string_overhead_bytes: usize,

    /// Where `run` persists the expanded job list before dispatching
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DispatchSettings {
    /// Number of consumer threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Sleep between polls of an empty queue
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    /// Sleep before retrying a push rejected with `QueueFull`
    #[serde(default = "default_push_retry_ms")]
    pub push_retry_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProjectSettings {
    /// Project root (defaults to the workspace root, then the current directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Files matching any of these globs are never indexed
    #[serde(default)]
    pub exclude_filters: Vec<FilePathFilter>,

    /// Respect .gitignore files while walking
    #[serde(default = "default_true")]
    pub respect_gitignore: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct LanguageSettings {
    #[serde(default)]
    pub cxx: CxxSettings,

    #[serde(default)]
    pub java: JavaSettings,

    #[serde(default)]
    pub python: PythonSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CxxSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cxx_extensions")]
    pub extensions: Vec<String>,

    /// Defaults to the project root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<FilePath>,

    /// Project-owned paths; defaults to the project root when empty
    #[serde(default)]
    pub indexed_paths: Vec<FilePath>,

    #[serde(default)]
    pub exclude_filters: Vec<FilePathFilter>,

    #[serde(default)]
    pub include_filters: Vec<FilePathFilter>,

    #[serde(default)]
    pub system_header_search_paths: Vec<FilePath>,

    #[serde(default)]
    pub framework_search_paths: Vec<FilePath>,

    #[serde(default)]
    pub compiler_flags: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JavaSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_java_extensions")]
    pub extensions: Vec<String>,

    #[serde(default = "default_java_standard")]
    pub language_standard: String,

    #[serde(default)]
    pub class_path: Vec<FilePath>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PythonSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_python_extensions")]
    pub extensions: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_path: Option<FilePath>,

    #[serde(default)]
    pub module_search_paths: Vec<FilePath>,
}

/// Logging levels: a default plus per-target overrides.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub default: String,

    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_max_bytes() -> usize {
    64 * 1024 * 1024
}
fn default_string_overhead() -> usize {
    24
}
fn default_workers() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}
fn default_idle_backoff_ms() -> u64 {
    5
}
fn default_push_retry_ms() -> u64 {
    5
}
fn default_true() -> bool {
    true
}
fn default_cxx_extensions() -> Vec<String> {
    ["c", "cc", "cpp", "cxx", "c++", "m", "mm"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_java_extensions() -> Vec<String> {
    vec!["java".to_string()]
}
fn default_java_standard() -> String {
    "17".to_string()
}
fn default_python_extensions() -> Vec<String> {
    vec!["py".to_string(), "pyi".to_string()]
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            queue: QueueSettings::default(),
            dispatch: DispatchSettings::default(),
            project: ProjectSettings::default(),
            languages: LanguageSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            string_overhead_bytes: default_string_overhead(),
            snapshot_path: None,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            idle_backoff_ms: default_idle_backoff_ms(),
            push_retry_ms: default_push_retry_ms(),
        }
    }
}

impl Default for ProjectSettings {
    fn default() -> Self {
        let exclude_filters = ["**/.git/**", "**/build/**", "**/target/**", "**/node_modules/**"]
            .iter()
            .filter_map(|p| FilePathFilter::new(*p).ok())
            .collect();
        Self {
            root: None,
            exclude_filters,
            respect_gitignore: true,
        }
    }
}

impl Default for CxxSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            extensions: default_cxx_extensions(),
            working_directory: None,
            indexed_paths: Vec::new(),
            exclude_filters: Vec::new(),
            include_filters: Vec::new(),
            system_header_search_paths: Vec::new(),
            framework_search_paths: Vec::new(),
            compiler_flags: Vec::new(),
        }
    }
}

impl Default for JavaSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            extensions: default_java_extensions(),
            language_standard: default_java_standard(),
            class_path: Vec::new(),
        }
    }
}

impl Default for PythonSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            extensions: default_python_extensions(),
            environment_path: None,
            module_search_paths: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(LOCAL_DIR).join("settings.toml"));

        Self::figment(&config_path)
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings
            })
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref()).extract().map_err(Box::new)
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            // Double underscore separates nested levels; single underscores
            // stay inside field names
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
    }

    /// Find the workspace config by looking for a .indexq directory
    /// from the current directory up to the root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(LOCAL_DIR).join("settings.toml"))
    }

    /// Get the workspace root directory (where .indexq is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        current
            .ancestors()
            .find(|ancestor| ancestor.join(LOCAL_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Check if configuration is properly initialized
    pub fn check_init() -> Result<(), String> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(LOCAL_DIR).join("settings.toml"));

        if !config_path.exists() {
            return Err("No configuration file found".to_string());
        }

        match std::fs::read_to_string(&config_path) {
            Ok(content) => {
                if let Err(e) = toml::from_str::<Settings>(&content) {
                    return Err(format!(
                        "Configuration file is corrupted: {e}\nRun 'indexq init --force' to regenerate."
                    ));
                }
            }
            Err(e) => {
                return Err(format!("Cannot read configuration file: {e}"));
            }
        }

        Ok(())
    }

    /// The directory to enumerate: `[project].root`, then the workspace
    /// root, then the current directory.
    pub fn project_root(&self) -> PathBuf {
        self.project
            .root
            .clone()
            .or_else(|| self.workspace_root.clone())
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file under `dir/.indexq/settings.toml`
    pub fn init_config_file(
        dir: impl AsRef<Path>,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = dir.as_ref().join(LOCAL_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        let settings = Settings {
            workspace_root: Some(dir.as_ref().to_path_buf()),
            ..Settings::default()
        };
        settings.save(&config_path)?;

        Ok(config_path)
    }
}
