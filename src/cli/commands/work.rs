//! Work command - the worker end of `indexq run | indexq work`.

use std::io::BufRead;

use anyhow::{Context, Result};

use crate::dispatch::{JobOutcome, LoggingWorker, execute_payload};

/// Per-stream tallies.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct WorkSummary {
    pub completed: usize,
    pub failed: usize,
    pub malformed: usize,
}

/// Read one payload per line from stdin and execute each.
pub fn run() -> Result<()> {
    let summary = process(std::io::stdin().lock())?;
    eprintln!(
        "Processed {} commands ({} failed, {} malformed)",
        summary.completed, summary.failed, summary.malformed
    );
    Ok(())
}

/// Execute every line of `input`.
///
/// A line that is not UTF-8 or does not decode is reported and skipped; it
/// never stops the stream. Only a failing read aborts.
pub fn process(mut input: impl BufRead) -> Result<WorkSummary> {
    let worker = LoggingWorker;
    let mut summary = WorkSummary::default();
    let mut buf = Vec::new();
    let mut line_no = 0usize;

    loop {
        buf.clear();
        let read = input
            .read_until(b'\n', &mut buf)
            .context("Failed to read payload from stdin")?;
        if read == 0 {
            break;
        }
        line_no += 1;

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                eprintln!("line {line_no}: malformed payload: not UTF-8 ({e})");
                summary.malformed += 1;
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        match execute_payload(line, &worker) {
            JobOutcome::Completed { .. } => summary.completed += 1,
            JobOutcome::Failed { path, reason } => {
                eprintln!("line {line_no}: {path}: {reason}");
                summary.failed += 1;
            }
            JobOutcome::Malformed { reason } => {
                eprintln!("line {line_no}: malformed payload: {reason}");
                summary.malformed += 1;
            }
        }
    }

    Ok(summary)
}
