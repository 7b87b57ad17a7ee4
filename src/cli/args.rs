//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser)]
#[command(
    name = "indexq",
    version = env!("CARGO_PKG_VERSION"),
    about = "Byte-budgeted job queue for source indexing commands",
    long_about = "Expand a project into per-file indexer commands and dispatch them to workers \
                  through a queue bounded by estimated memory.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize project
    #[command(about = "Set up .indexq directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,

    /// Print one command document per source file
    #[command(
        about = "Expand a project into indexer commands (JSON lines)",
        after_help = "Examples:\n  indexq expand\n  indexq expand ../service --summary"
    )]
    Expand {
        /// Project root (defaults to [project].root, then the workspace root)
        #[arg(value_name = "ROOT")]
        root: Option<PathBuf>,

        /// Only print per-language counts
        #[arg(long)]
        summary: bool,
    },

    /// Expand a project and dispatch its commands through the queue
    #[command(
        about = "Dispatch a project's commands to workers",
        long_about = "Expand the project, optionally snapshot the job list, then push every \
                      command through the byte-budgeted queue. Each dispatched document is \
                      written to stdout as one JSON line.",
        after_help = "Examples:\n  indexq run\n  indexq run src --workers 2 --max-bytes 1048576\n  indexq run --snapshot .indexq/snapshot.json | analyzer"
    )]
    Run {
        /// Project root (defaults to [project].root, then the workspace root)
        #[arg(value_name = "ROOT")]
        root: Option<PathBuf>,

        /// Write the expanded job list here before dispatching (overrides config)
        #[arg(long, value_name = "PATH")]
        snapshot: Option<PathBuf>,

        /// Number of worker threads (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Queue ceiling in bytes (overrides config)
        #[arg(long)]
        max_bytes: Option<usize>,
    },

    /// Dispatch the commands stored in a snapshot
    #[command(about = "Re-dispatch commands from a snapshot file")]
    Replay {
        /// Snapshot written by `indexq run --snapshot`
        #[arg(value_name = "SNAPSHOT")]
        snapshot: PathBuf,

        /// Number of worker threads (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Act as a worker process
    #[command(
        about = "Decode command documents from stdin, one JSON object per line",
        after_help = "Examples:\n  indexq run | indexq work"
    )]
    Work,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "indexq",
            "--config",
            "custom.toml",
            "run",
            "src",
            "--workers",
            "3",
            "--max-bytes",
            "4096",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Commands::Run {
                root,
                snapshot,
                workers,
                max_bytes,
            } => {
                assert_eq!(root, Some(PathBuf::from("src")));
                assert_eq!(snapshot, None);
                assert_eq!(workers, Some(3));
                assert_eq!(max_bytes, Some(4096));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_replay_requires_snapshot() {
        assert!(Cli::try_parse_from(["indexq", "replay"]).is_err());
    }
}
