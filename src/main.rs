//! # dbre
//!
//! Command-line driver for plateau analysis of discharge reference
//! electrode (DBRE) recordings.
//!
//! ## Usage
//!
//! ```bash
//! # Generate a synthetic experiment folder
//! dbre demo demo_run
//!
//! # Follow it, producing summary.csv and per-file trace tables
//! dbre -v watch demo_run --horizon 150
//!
//! # Analyze a single file
//! dbre analyze demo_run/A_DBRE_#1.DTA --horizon 150
//!
//! # Merge completed runs from sibling folders
//! dbre compile experiments/
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
