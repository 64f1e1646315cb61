//! Cross-run aggregation over sibling experiment folders.

use anyhow::{Context, Result};
use log::warn;
use std::path::PathBuf;

use dbre::summary::compile_runs;

/// Concatenate per-folder summaries under `root` into one master table.
pub fn run(root: PathBuf, summary: String, output: Option<PathBuf>) -> Result<()> {
    if !root.is_dir() {
        anyhow::bail!("Not a directory: {}", root.display());
    }
    let output = output.unwrap_or_else(|| root.join("summary_all.csv"));

    let count = compile_runs(&root, &summary, &output)
        .with_context(|| format!("Failed to compile summaries under {}", root.display()))?;
    if count == 0 {
        warn!(
            "no {:?} tables found in the subfolders of {}",
            summary,
            root.display()
        );
    }

    println!(
        "Compiled {} record(s) into {}",
        count,
        output.display()
    );
    Ok(())
}
