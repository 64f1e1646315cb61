use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod analyze;
mod compile;
mod config;
mod demo;
mod watch;

use config::{AnalysisArgs, RunArgs};

/// dbre - Plateau analysis for discharge reference electrode recordings
#[derive(Parser)]
#[command(name = "dbre")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single measurement file
    Analyze {
        /// Input DTA file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Override the charging time from the file header, in seconds
        #[arg(long, value_name = "SECONDS")]
        charging_time: Option<f64>,

        /// Write the preprocessed trace with derived columns to this CSV
        #[arg(long, value_name = "FILE")]
        trace_table: Option<PathBuf>,
    },

    /// Follow an experiment folder, processing measurements as they appear
    Watch {
        /// Experiment folder containing the DTA sequence
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Expected number of measurements (default: count matching files)
        #[arg(long)]
        count: Option<usize>,

        #[command(flatten)]
        analysis: AnalysisArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Concatenate per-folder run summaries into one master table
    Compile {
        /// Root folder whose subfolders hold completed runs
        #[arg(value_name = "ROOT")]
        root: PathBuf,

        /// Summary table filename to look for in each subfolder
        #[arg(long, default_value = "summary.csv")]
        summary: String,

        /// Output path (defaults to ROOT/summary_all.csv)
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Generate a synthetic experiment folder for testing
    Demo {
        /// Output folder for the synthetic DTA files
        #[arg(value_name = "DIR", default_value = "demo_run")]
        dir: PathBuf,

        /// Number of measurements to generate
        #[arg(long, default_value = "12")]
        count: usize,

        /// Minutes between measurement stamps
        #[arg(long, default_value = "10")]
        interval_minutes: f64,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Analyze {
            file,
            config,
            analysis,
            charging_time,
            trace_table,
        } => analyze::run(file, config, analysis, charging_time, trace_table),
        Commands::Watch {
            dir,
            config,
            count,
            analysis,
            run,
        } => watch::run(dir, config, count, analysis, run),
        Commands::Compile {
            root,
            summary,
            output,
        } => compile::run(root, summary, output),
        Commands::Demo {
            dir,
            count,
            interval_minutes,
        } => demo::run(dir, count, interval_minutes),
    }
}
