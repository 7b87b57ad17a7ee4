//! Expand command - print the commands a project would produce.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::expansion::ProjectExpander;

/// Expand `root` (or the configured project root) and print each command
/// document as a JSON line, or per-language counts with `summary`.
pub fn run(root: Option<PathBuf>, summary: bool, settings: &Settings) -> Result<()> {
    let root = root.unwrap_or_else(|| settings.project_root());
    let expander = ProjectExpander::new(settings, &root)
        .with_context(|| format!("Cannot expand {}", root.display()))?;
    let commands = expander.expand();

    let mut stdout = std::io::stdout().lock();
    if summary {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for command in &commands {
            *counts.entry(command.kind().as_str()).or_default() += 1;
        }
        for (kind, count) in counts {
            writeln!(stdout, "{kind:<8} {count}")?;
        }
        writeln!(stdout, "{:<8} {}", "total", commands.len())?;
    } else {
        for command in &commands {
            writeln!(stdout, "{}", command.serialize().to_json())?;
        }
    }
    Ok(())
}
